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
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

const DEFAULT_EXTENSION: &str = "wav";
const DEFAULT_VELOCITY_LAYERS: usize = 2;
const DEFAULT_ROUND_ROBIN_SLOTS: usize = 1;
const DEFAULT_MAX_VOICES: usize = 10;
const DEFAULT_MAX_SAMPLE_LENGTH: &str = "30s";
const DEFAULT_POLL_INTERVAL: &str = "500ms";
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_BLOCK_SIZE: usize = 512;

/// What an instrument does with a note-off for a sounding voice.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoteOffBehavior {
    /// One-shot playback: note-off is ignored.
    #[default]
    PlayToCompletion,
    /// Move the voice into its release ramp.
    Release,
    /// Silence the voice at the start of the next block.
    Stop,
}

/// Initial settings for the master bus.
#[derive(Deserialize, Clone, Serialize, Debug, Default)]
pub struct MasterConfig {
    level: Option<f32>,
    pan: Option<f32>,
    mute: Option<bool>,
}

impl MasterConfig {
    /// Initial master level. Defaults to unity.
    pub fn level(&self) -> f32 {
        self.level.unwrap_or(1.0)
    }

    /// Initial master pan. Defaults to center.
    pub fn pan(&self) -> f32 {
        self.pan.unwrap_or(0.0)
    }

    /// Whether the master bus starts muted.
    pub fn mute(&self) -> bool {
        self.mute.unwrap_or(false)
    }
}

/// A single instrument channel in the kit.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct ChannelConfig {
    /// Instrument name. Also the prefix of every sample file for the channel.
    name: String,
    /// MIDI note the channel responds to before any learn.
    note: u8,
    level: Option<f32>,
    pan: Option<f32>,
    /// Coarse tuning in semitones.
    coarse: Option<f32>,
    /// Fine tuning in cents.
    fine: Option<f32>,
    /// Attack ramp in seconds. Zero starts voices at full level.
    attack: Option<f32>,
    /// Release ramp in seconds.
    release: Option<f32>,
    mute: Option<bool>,
    solo: Option<bool>,
}

impl ChannelConfig {
    /// Creates a channel with default parameters.
    pub fn new(name: &str, note: u8) -> ChannelConfig {
        ChannelConfig {
            name: name.to_string(),
            note,
            level: None,
            pan: None,
            coarse: None,
            fine: None,
            attack: None,
            release: None,
            mute: None,
            solo: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn level(&self) -> f32 {
        self.level.unwrap_or(1.0)
    }

    pub fn pan(&self) -> f32 {
        self.pan.unwrap_or(0.0)
    }

    pub fn coarse(&self) -> f32 {
        self.coarse.unwrap_or(0.0)
    }

    pub fn fine(&self) -> f32 {
        self.fine.unwrap_or(0.0)
    }

    pub fn attack(&self) -> f32 {
        self.attack.unwrap_or(0.0)
    }

    pub fn release(&self) -> f32 {
        self.release.unwrap_or(0.0)
    }

    pub fn mute(&self) -> bool {
        self.mute.unwrap_or(false)
    }

    pub fn solo(&self) -> bool {
        self.solo.unwrap_or(false)
    }

    #[cfg(test)]
    pub fn with_level(mut self, level: f32) -> Self {
        self.level = Some(level);
        self
    }

    #[cfg(test)]
    pub fn with_pan(mut self, pan: f32) -> Self {
        self.pan = Some(pan);
        self
    }

    #[cfg(test)]
    pub fn with_solo(mut self, solo: bool) -> Self {
        self.solo = Some(solo);
        self
    }

    #[cfg(test)]
    pub fn with_release(mut self, release: f32) -> Self {
        self.release = Some(release);
        self
    }
}

/// The full kit: where the samples live, how they are organized and how the engine plays them.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct KitConfig {
    /// Directory holding the sample files.
    sample_dir: PathBuf,
    /// Sample file extension without the dot.
    extension: Option<String>,
    velocity_layers: Option<usize>,
    round_robin_slots: Option<usize>,
    max_voices: Option<usize>,
    voice_stealing: Option<bool>,
    #[serde(default)]
    note_off: NoteOffBehavior,
    /// Longest accepted sample, e.g. "30s".
    max_sample_length: Option<String>,
    /// How often loaders look for missing files, e.g. "500ms".
    poll_interval: Option<String>,
    /// Output rate used by the live and render commands.
    sample_rate: Option<u32>,
    /// Largest block the host will request.
    block_size: Option<usize>,
    #[serde(default)]
    master: MasterConfig,
    channels: Vec<ChannelConfig>,
}

impl KitConfig {
    /// Creates a kit with default engine settings.
    pub fn new(sample_dir: &Path, channels: Vec<ChannelConfig>) -> KitConfig {
        KitConfig {
            sample_dir: sample_dir.to_path_buf(),
            extension: None,
            velocity_layers: None,
            round_robin_slots: None,
            max_voices: None,
            voice_stealing: None,
            note_off: NoteOffBehavior::default(),
            max_sample_length: None,
            poll_interval: None,
            sample_rate: None,
            block_size: None,
            master: MasterConfig::default(),
            channels,
        }
    }

    pub fn sample_dir(&self) -> &Path {
        &self.sample_dir
    }

    pub(super) fn set_sample_dir(&mut self, sample_dir: PathBuf) {
        self.sample_dir = sample_dir;
    }

    pub fn extension(&self) -> &str {
        self.extension
            .as_deref()
            .unwrap_or(DEFAULT_EXTENSION)
            .trim_start_matches('.')
    }

    pub fn velocity_layers(&self) -> usize {
        self.velocity_layers.unwrap_or(DEFAULT_VELOCITY_LAYERS)
    }

    pub fn round_robin_slots(&self) -> usize {
        self.round_robin_slots.unwrap_or(DEFAULT_ROUND_ROBIN_SLOTS)
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices.unwrap_or(DEFAULT_MAX_VOICES)
    }

    pub fn voice_stealing(&self) -> bool {
        self.voice_stealing.unwrap_or(true)
    }

    pub fn note_off(&self) -> NoteOffBehavior {
        self.note_off
    }

    pub fn max_sample_length(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "max_sample_length",
            self.max_sample_length
                .as_deref()
                .unwrap_or(DEFAULT_MAX_SAMPLE_LENGTH),
        )
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "poll_interval",
            self.poll_interval.as_deref().unwrap_or(DEFAULT_POLL_INTERVAL),
        )
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn block_size(&self) -> usize {
        self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE)
    }

    pub fn master(&self) -> &MasterConfig {
        &self.master
    }

    pub fn channels(&self) -> &[ChannelConfig] {
        &self.channels
    }

    /// Checks everything serde can't: counts, note ranges, unique channel names and durations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        for (field, count) in [
            ("velocity_layers", self.velocity_layers()),
            ("round_robin_slots", self.round_robin_slots()),
            ("max_voices", self.max_voices()),
            ("block_size", self.block_size()),
            ("sample_rate", self.sample_rate() as usize),
        ] {
            if count == 0 {
                return Err(ConfigError::ZeroCount(field));
            }
        }

        let mut names = HashSet::new();
        for channel in &self.channels {
            if channel.note > 127 {
                return Err(ConfigError::InvalidNote {
                    channel: channel.name.clone(),
                    note: channel.note,
                });
            }
            if !names.insert(channel.name.as_str()) {
                return Err(ConfigError::DuplicateChannel(channel.name.clone()));
            }
        }

        self.max_sample_length()?;
        self.poll_interval()?;
        Ok(())
    }

    #[cfg(test)]
    pub fn with_velocity_layers(mut self, layers: usize) -> Self {
        self.velocity_layers = Some(layers);
        self
    }

    #[cfg(test)]
    pub fn with_round_robin_slots(mut self, slots: usize) -> Self {
        self.round_robin_slots = Some(slots);
        self
    }

    #[cfg(test)]
    pub fn with_max_voices(mut self, max_voices: usize) -> Self {
        self.max_voices = Some(max_voices);
        self
    }

    #[cfg(test)]
    pub fn with_voice_stealing(mut self, voice_stealing: bool) -> Self {
        self.voice_stealing = Some(voice_stealing);
        self
    }

    #[cfg(test)]
    pub fn with_note_off(mut self, note_off: NoteOffBehavior) -> Self {
        self.note_off = note_off;
        self
    }

    #[cfg(test)]
    pub fn with_poll_interval(mut self, poll_interval: &str) -> Self {
        self.poll_interval = Some(poll_interval.to_string());
        self
    }
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(Into::into)
        .map_err(|e| ConfigError::InvalidDuration {
            field,
            value: value.to_string(),
            reason: e.to_string(),
        })
}
