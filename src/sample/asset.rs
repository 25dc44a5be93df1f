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
use std::fmt;
use std::time::Duration;

use arc_swap::ArcSwapOption;

/// Sources with more channels than this keep only the first ones.
pub const MAX_CHANNELS: usize = 2;

/// The slot a loader publishes into and the render path reads from.
pub type AssetSlot = ArcSwapOption<SampleAsset>;

/// A decoded sample. Immutable once constructed; a reload creates a new asset.
pub struct SampleAsset {
    name: String,
    /// Planar sample data, one vector per channel, all the same length.
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SampleAsset {
    /// Creates an asset from planar channel data. Channels beyond [`MAX_CHANNELS`] are dropped
    /// and every channel is truncated to the shortest one.
    pub fn new(name: &str, mut channels: Vec<Vec<f32>>, sample_rate: u32) -> SampleAsset {
        channels.truncate(MAX_CHANNELS);
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for channel in channels.iter_mut() {
            channel.truncate(frames);
        }

        SampleAsset {
            name: name.to_string(),
            channels,
            sample_rate,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of channels, 1 or 2.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// The source sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Gets the samples of one channel.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / f64::from(self.sample_rate))
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.channels.iter().map(Vec::len).sum::<usize>() * std::mem::size_of::<f32>()
    }
}

impl fmt::Debug for SampleAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleAsset")
            .field("name", &self.name)
            .field("channels", &self.channel_count())
            .field("frames", &self.frame_count())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
