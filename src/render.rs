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
//! Offline rendering of Standard MIDI Files through the sampler.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};
use midly::{Format, Smf, Timing};
use nodi::{Event, Sheet};
use tracing::{debug, info};

use crate::audio::AudioBuffer;
use crate::config::KitConfig;
use crate::event::TriggerEvent;
use crate::sampler::{AudioSettings, DrumSampler, SamplerError};

/// How long offline rendering waits for loaders to make their first attempt.
const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Standard MIDI File tempo before any tempo event, in microseconds per beat.
const DEFAULT_TEMPO: u32 = 500_000;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Invalid MIDI file: {0}")]
    Midi(#[from] midly::Error),

    #[error("Unsupported MIDI timing (only metrical timing is supported)")]
    UnsupportedTiming,

    #[error("Unable to write WAV file: {0}")]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Sampler(#[from] SamplerError),
}

/// A trigger at an absolute frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    pub frame: u64,
    pub event: TriggerEvent,
}

/// Settings for an offline render.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub sample_rate: u32,
    pub block_size: usize,
    /// Extra time rendered after the last event.
    pub tail: Duration,
    /// Also render one file per channel.
    pub stems: bool,
}

/// The result of an offline render.
pub struct RenderOutput {
    pub master: AudioBuffer,
    /// One buffer per channel, in kit order, when stems were requested.
    pub stems: Vec<AudioBuffer>,
}

/// Converts the channel messages of a MIDI file into frame-stamped triggers, following the
/// file's tempo map. Until the first tempo event the file plays at 120 bpm.
pub fn smf_events(smf: &Smf, sample_rate: u32) -> Result<Vec<TimedEvent>, RenderError> {
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(ticks) if u16::from(ticks) > 0 => f64::from(u16::from(ticks)),
        _ => return Err(RenderError::UnsupportedTiming),
    };
    let sheet = match smf.header.format {
        Format::SingleTrack | Format::Sequential => Sheet::sequential(&smf.tracks),
        Format::Parallel => Sheet::parallel(&smf.tracks),
    };

    // Exact elapsed time in microseconds, so frame stamps don't drift with rounding.
    let mut micros_per_tick = f64::from(DEFAULT_TEMPO) / ticks_per_beat;
    let mut micros = 0.0f64;
    let mut pending_ticks = 0u32;
    let mut events = Vec::new();
    for moment in sheet.iter() {
        if !moment.is_empty() {
            micros += f64::from(pending_ticks) * micros_per_tick;
            pending_ticks = 0;
            let frame = (micros * f64::from(sample_rate) / 1_000_000.0).round() as u64;

            for event in moment.events.iter() {
                match event {
                    Event::Tempo(tempo) => micros_per_tick = f64::from(*tempo) / ticks_per_beat,
                    Event::Midi(midi) => events.push(TimedEvent {
                        frame,
                        event: TriggerEvent::from_midi(0, midi.channel, &midi.message),
                    }),
                    _ => {}
                }
            }
        }
        pending_ticks += 1;
    }

    Ok(events)
}

/// Reads a MIDI file and converts it with [`smf_events`].
pub fn midi_file_events(path: &Path, sample_rate: u32) -> Result<Vec<TimedEvent>, RenderError> {
    let buf = fs::read(path).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let smf = Smf::parse(&buf)?;
    smf_events(&smf, sample_rate)
}

/// Renders `events` through the sampler, `total_frames` long, one block at a time.
pub fn render_events(
    sampler: &mut DrumSampler,
    events: &[TimedEvent],
    total_frames: usize,
    stems: bool,
) -> RenderOutput {
    let block_size = sampler.settings().max_block_size.max(1);
    let num_channels = sampler.settings().channels;
    let mut master = AudioBuffer::new(num_channels, total_frames);
    let mut stems = if stems {
        vec![AudioBuffer::new(num_channels, total_frames); sampler.channel_count()]
    } else {
        Vec::new()
    };

    let mut block = AudioBuffer::new(num_channels, block_size);
    let mut block_events = Vec::new();
    let mut next_event = 0;
    let mut start = 0;
    while start < total_frames {
        let frames = block_size.min(total_frames - start);
        let end = start + frames;

        block_events.clear();
        while let Some(timed) = events.get(next_event) {
            if timed.frame >= end as u64 {
                break;
            }
            let offset = (timed.frame as usize).saturating_sub(start);
            block_events.push(timed.event.with_offset(offset));
            next_event += 1;
        }

        block.set_num_frames(frames);
        block.clear();
        sampler.render(&block_events, &mut block);

        for channel in 0..num_channels {
            master.channel_mut(channel)[start..end].copy_from_slice(block.channel(channel));
        }
        for (index, stem) in stems.iter_mut().enumerate() {
            if let Some(output) = sampler.channel_output(index) {
                for channel in 0..num_channels {
                    stem.channel_mut(channel)[start..end].copy_from_slice(output.channel(channel));
                }
            }
        }
        start = end;
    }

    RenderOutput { master, stems }
}

/// Writes a buffer as a 32 bit float WAV file.
pub fn write_wav(path: &Path, buffer: &AudioBuffer, sample_rate: u32) -> Result<(), RenderError> {
    let file = File::create(path).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = WavWriter::new(
        BufWriter::new(file),
        WavSpec {
            channels: u16::try_from(buffer.num_channels()).unwrap_or(u16::MAX),
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;
    for sample in buffer.to_interleaved() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Path of the stem for `channel` next to `output`: `song.wav` becomes `song-Kick.wav`.
pub fn stem_path(output: &Path, channel: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    output.with_file_name(format!("{}-{}.wav", stem, channel))
}

/// Renders a MIDI file through a kit into `output`, plus one stem per channel if requested.
pub fn render_file(
    kit: &KitConfig,
    midi: &Path,
    output: &Path,
    options: RenderOptions,
) -> Result<(), RenderError> {
    let events = midi_file_events(midi, options.sample_rate)?;
    let mut sampler = DrumSampler::new(
        kit,
        AudioSettings {
            sample_rate: options.sample_rate,
            max_block_size: options.block_size,
            channels: 2,
        },
    )?;
    if !sampler.wait_until_settled(LOAD_TIMEOUT) {
        debug!("Not every loader finished its first attempt");
    }
    info!(
        loaded = sampler.loaded_sound_count(),
        events = events.len(),
        "Rendering"
    );

    let last_frame = events.last().map(|timed| timed.frame).unwrap_or(0) as usize;
    let tail = (options.tail.as_secs_f64() * f64::from(options.sample_rate)).ceil() as usize;
    let rendered = render_events(&mut sampler, &events, last_frame + tail, options.stems);

    write_wav(output, &rendered.master, options.sample_rate)?;
    info!(path = ?output, peak = rendered.master.peak(), "Wrote render");
    for (channel, stem) in kit.channels().iter().zip(rendered.stems.iter()) {
        let path = stem_path(output, channel.name());
        write_wav(&path, stem, options.sample_rate)?;
        debug!(path = ?path, "Wrote stem");
    }
    Ok(())
}
