// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Live playback: MIDI in through midir, audio out through cpal.

use std::error::Error;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, TrySendError};
use midir::MidiInput;
use tracing::{debug, error, info, warn};

use crate::audio::AudioBuffer;
use crate::config::KitConfig;
use crate::event::TriggerEvent;
use crate::sampler::{AudioSettings, DrumSampler};

/// Most trigger events queued between two audio callbacks.
const EVENT_QUEUE_SIZE: usize = 1024;

/// How often the control loop checks for learned notes.
const CONTROL_INTERVAL: Duration = Duration::from_millis(100);

/// Lists audio output devices as `host: name (channels)`.
pub fn list_audio_devices() -> Result<Vec<String>, Box<dyn Error>> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(output_configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = output_configs
                .map(|config| config.channels())
                .max()
                .unwrap_or(0);
            if max_channels > 0 {
                devices.push(format!(
                    "{}: {} ({} channels)",
                    host_id.name(),
                    device.name()?,
                    max_channels
                ));
            }
        }
    }
    Ok(devices)
}

/// Lists MIDI input ports.
pub fn list_midi_devices() -> Result<Vec<String>, Box<dyn Error>> {
    let input = MidiInput::new("drumsampler input listing")?;
    let mut names = Vec::new();
    for port in input.ports() {
        names.push(input.port_name(&port)?);
    }
    Ok(names)
}

/// Finds an output device by name, or the default output device.
fn output_device(name: Option<&str>) -> Result<cpal::Device, Box<dyn Error>> {
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let Some(name) = name else {
        return cpal::default_host()
            .default_output_device()
            .ok_or_else(|| "No default audio output device".into());
    };

    for host_id in cpal::available_hosts() {
        let Ok(devices) = cpal::host_from_id(host_id)?.devices() else {
            continue;
        };
        for device in devices {
            if device.name().map(|n| n == name).unwrap_or(false) {
                return Ok(device);
            }
        }
    }
    Err(format!("Audio device {} not found", name).into())
}

/// Returns an audio callback that drains pending triggers and renders the sampler into the
/// interleaved device buffer.
fn output_callback(
    mut sampler: DrumSampler,
    receiver: Receiver<TriggerEvent>,
    device_channels: usize,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    let settings = sampler.settings();
    let mut block = AudioBuffer::new(settings.channels, settings.max_block_size);
    let mut events = Vec::with_capacity(EVENT_QUEUE_SIZE);

    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        events.clear();
        while events.len() < events.capacity() {
            match receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(_) => break,
            }
        }

        let total_frames = data.len() / device_channels.max(1);
        let mut start = 0;
        loop {
            let frames = block.capacity().min(total_frames - start);
            block.set_num_frames(frames);
            block.clear();
            // Triggers land at the start of the first piece.
            sampler.render(&events, &mut block);
            events.clear();

            let rendered = block.num_channels();
            for frame in 0..frames {
                let out = &mut data[(start + frame) * device_channels..][..device_channels];
                for (channel, sample) in out.iter_mut().enumerate() {
                    *sample = match (channel < rendered, rendered) {
                        (true, _) => block.channel(channel)[frame],
                        (false, 1) => block.channel(0)[frame],
                        (false, _) => 0.0,
                    };
                }
            }

            start += frames;
            if frames == 0 || start >= total_frames {
                break;
            }
        }
    }
}

/// Plays the kit live until the process is stopped.
pub fn play(
    kit: &KitConfig,
    device: Option<&str>,
    midi_device: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let device = output_device(device)?;
    info!(device = device.name()?, "Using audio output");

    let sampler = DrumSampler::new(
        kit,
        AudioSettings {
            sample_rate: kit.sample_rate(),
            max_block_size: kit.block_size(),
            channels: 2,
        },
    )?;
    let controls = sampler.controls().clone();

    let (sender, receiver) = crossbeam_channel::bounded::<TriggerEvent>(EVENT_QUEUE_SIZE);

    let input = MidiInput::new("drumsampler input")?;
    let ports = input.ports();
    let port = match midi_device {
        Some(name) => ports
            .iter()
            .find(|port| input.port_name(port).map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| format!("MIDI device {} not found", name))?,
        None => ports.first().ok_or("No MIDI input devices")?,
    };
    info!(device = input.port_name(port)?, "Using MIDI input");

    let _connection = input.connect(
        port,
        "drumsampler trigger input",
        move |_, raw_event, _| {
            let Some(event) = TriggerEvent::parse(0, raw_event) else {
                return;
            };
            debug!(event = ?event, "Received MIDI event.");
            match sender.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!("Trigger queue full, dropping event"),
                Err(TrySendError::Disconnected(_)) => {}
            }
        },
        (),
    )?;

    let config = cpal::StreamConfig {
        channels: 2,
        sample_rate: kit.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    let stream = device.build_output_stream(
        &config,
        output_callback(sampler, receiver, usize::from(config.channels)),
        |err| error!("CPAL output stream error: {}", err),
        None,
    )?;
    stream.play()?;
    info!("Playing. Stop with Ctrl-C.");

    loop {
        thread::sleep(CONTROL_INTERVAL);
        for params in controls.channels() {
            if let Some(note) = params.take_learned_note() {
                info!(channel = params.name(), note, "Learned note");
            }
        }
    }
}
