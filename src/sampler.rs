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
//! The sampler as a whole: engines, loaders and buses built from a kit configuration.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::audio::{add_from, AudioBuffer};
use crate::config::{ConfigError, KitConfig};
use crate::event::TriggerEvent;
use crate::instrument::{
    velocity_layers, EngineSettings, InstrumentEngine, VelocityRange, VoiceActivity,
};
use crate::mixbus::MixBus;
use crate::params::Controls;
use crate::sample::{sample_path, AssetSlot, LoadError, LoaderThread, SampleLoader};

/// Errors creating a sampler.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("Invalid kit: {0}")]
    Config(#[from] ConfigError),

    #[error("Unable to start sample loader: {0}")]
    Loader(#[from] io::Error),
}

/// The output format the host renders at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSettings {
    pub sample_rate: u32,
    /// Largest block a single render call processes at once. Larger calls are split.
    pub max_block_size: usize,
    /// 1 or 2.
    pub channels: usize,
}

/// Where one sound of the kit comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundFile {
    pub channel: String,
    /// 0-based.
    pub layer: usize,
    /// 1-based.
    pub round_robin: usize,
    pub velocity: VelocityRange,
    pub path: PathBuf,
}

/// Lists every sound of the kit in engine order (channel, then layer, then round-robin slot).
pub fn sound_files(kit: &KitConfig) -> Vec<SoundFile> {
    let layers = velocity_layers(kit.velocity_layers());
    let mut files = Vec::new();
    for channel in kit.channels() {
        for (layer, velocity) in layers.iter().enumerate() {
            for round_robin in 1..=kit.round_robin_slots() {
                files.push(SoundFile {
                    channel: channel.name().to_string(),
                    layer,
                    round_robin,
                    velocity: *velocity,
                    path: sample_path(
                        kit.sample_dir(),
                        channel.name(),
                        round_robin,
                        velocity.start(),
                        kit.extension(),
                    ),
                });
            }
        }
    }
    files
}

/// A multi-output drum sampler.
pub struct DrumSampler {
    controls: Controls,
    mix: MixBus,
    /// One loader per sound, grouped by channel.
    loaders: Vec<Vec<LoaderThread>>,
    settings: AudioSettings,
}

impl DrumSampler {
    /// Builds the sampler and starts one loader thread per sound.
    pub fn new(kit: &KitConfig, settings: AudioSettings) -> Result<DrumSampler, SamplerError> {
        kit.validate()?;
        let max_length = kit.max_sample_length()?;
        let poll_interval = kit.poll_interval()?;
        let engine_settings = EngineSettings {
            velocity_layers: kit.velocity_layers(),
            round_robin_slots: kit.round_robin_slots(),
            max_voices: kit.max_voices(),
            voice_stealing: kit.voice_stealing(),
            note_off: kit.note_off(),
        };

        let controls = Controls::new(kit);
        let files = sound_files(kit);
        let sounds_per_channel = kit.velocity_layers() * kit.round_robin_slots();

        let mut engines = Vec::with_capacity(kit.channels().len());
        let mut loaders = Vec::with_capacity(kit.channels().len());
        for (index, (params, files)) in controls
            .channels()
            .iter()
            .zip(files.chunks(sounds_per_channel))
            .enumerate()
        {
            let slots: Vec<Arc<AssetSlot>> = files
                .iter()
                .map(|_| Arc::new(AssetSlot::empty()))
                .collect();

            let mut channel_loaders = Vec::with_capacity(files.len());
            for (file, slot) in files.iter().zip(slots.iter()) {
                debug!(channel = params.name(), path = ?file.path, "Starting loader");
                channel_loaders.push(LoaderThread::spawn(
                    SampleLoader::new(file.path.clone(), slot.clone(), max_length),
                    poll_interval,
                )?);
            }

            let slots_per_layer = kit.round_robin_slots();
            engines.push(InstrumentEngine::new(
                index,
                params.clone(),
                engine_settings,
                settings.sample_rate,
                |layer, round_robin| slots[layer * slots_per_layer + round_robin - 1].clone(),
            ));
            loaders.push(channel_loaders);
        }

        info!(
            channels = engines.len(),
            sounds = files.len(),
            sample_rate = settings.sample_rate,
            "Drum sampler created"
        );

        let channels = settings.channels.clamp(1, 2);
        Ok(DrumSampler {
            mix: MixBus::new(engines, controls.clone(), channels, settings.max_block_size.max(1)),
            controls,
            loaders,
            settings: AudioSettings {
                channels,
                ..settings
            },
        })
    }

    /// Reallocates the scratch buffers for a new rate or block size. Call from the control side,
    /// never from the render callback.
    pub fn prepare(&mut self, sample_rate: u32, max_block_size: usize) {
        self.settings.sample_rate = sample_rate;
        self.settings.max_block_size = max_block_size.max(1);
        self.mix
            .prepare(self.settings.channels, self.settings.max_block_size, sample_rate);
    }

    pub fn settings(&self) -> AudioSettings {
        self.settings
    }

    /// Renders the events into `output`, adding the master bus to what's already there. Event
    /// offsets are frames from the start of `output`. Blocks longer than the prepared block size
    /// are processed in pieces.
    pub fn render(&mut self, events: &[TriggerEvent], output: &mut AudioBuffer) {
        let total = output.num_frames();
        if total == 0 {
            self.mix.process_block(events.iter().copied(), 0);
            return;
        }

        let block = self.mix.max_frames().max(1);
        let mut start = 0;
        while start < total {
            let frames = block.min(total - start);
            let end = start + frames;
            let last = end == total;
            let block_events = events
                .iter()
                .filter(move |event| event.offset >= start && (event.offset < end || last))
                .map(move |event| event.with_offset(event.offset - start));
            self.mix.process_block(block_events, frames);

            let master = self.mix.master().buffer();
            for channel in 0..output.num_channels().min(master.num_channels()) {
                add_from(&mut output.channel_mut(channel)[start..end], master.channel(channel));
            }
            start = end;
        }
    }

    /// The output of one instrument channel for the most recently processed block.
    pub fn channel_output(&self, index: usize) -> Option<&AudioBuffer> {
        self.mix.channel_bus(index).map(|bus| bus.buffer())
    }

    /// Handle to every live parameter.
    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn channel_count(&self) -> usize {
        self.controls.channels().len()
    }

    /// Takes the note learned on `channel` since the last call.
    pub fn take_learned_note(&self, channel: usize) -> Option<u8> {
        self.controls
            .channel(channel)
            .and_then(|params| params.take_learned_note())
    }

    pub fn active_voice_count(&self) -> usize {
        self.mix
            .engines()
            .iter()
            .map(InstrumentEngine::active_voice_count)
            .sum()
    }

    /// Describes every sounding voice of every channel.
    pub fn active_voices(&self) -> impl Iterator<Item = VoiceActivity> + '_ {
        self.mix
            .engines()
            .iter()
            .flat_map(|engine| engine.active_voices())
    }

    /// Makes every loader of a channel read its files again. Returns false for an unknown channel.
    pub fn reload_channel(&self, channel: usize) -> bool {
        match self.loaders.get(channel) {
            Some(loaders) => {
                loaders.iter().for_each(LoaderThread::reset);
                true
            }
            None => false,
        }
    }

    pub fn reload_all(&self) {
        self.loaders.iter().flatten().for_each(LoaderThread::reset);
    }

    /// Loads every sound on the calling thread and returns what couldn't be loaded.
    pub fn load_all_now(&self) -> Vec<LoadError> {
        self.loaders
            .iter()
            .flatten()
            .filter_map(|loader| loader.load_now().err())
            .collect()
    }

    /// Waits until every loader has made at least one attempt. Returns false on timeout.
    pub fn wait_until_settled(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.loaders.iter().flatten().all(|loader| {
            loader.wait_for_attempt(deadline.saturating_duration_since(Instant::now()))
        })
    }

    /// Number of sounds with a loaded sample.
    pub fn loaded_sound_count(&self) -> usize {
        self.mix
            .engines()
            .iter()
            .flat_map(|engine| engine.sounds().iter())
            .filter(|sound| sound.has_asset())
            .count()
    }
}

impl Drop for DrumSampler {
    fn drop(&mut self) {
        // Signal every loader before the fields are dropped and joined one by one.
        self.loaders.iter().flatten().for_each(LoaderThread::shutdown);
    }
}
