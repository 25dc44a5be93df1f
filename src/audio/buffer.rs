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
/// A planar audio buffer (one `Vec` per channel).
///
/// The buffer has a fixed frame capacity decided when it is created or resized, and a logical
/// frame count that can be shrunk and grown inside that capacity without touching the allocator.
/// Only `resize` allocates, so the render path sticks to `set_num_frames`.
#[derive(Clone, Debug, Default)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    num_frames: usize,
}

impl AudioBuffer {
    /// Creates a zeroed buffer.
    pub fn new(num_channels: usize, num_frames: usize) -> Self {
        Self {
            channels: vec![vec![0.0; num_frames]; num_channels],
            num_frames,
        }
    }

    /// Creates a buffer from planar channel data. Channels shorter than the longest one are
    /// padded with silence.
    pub fn from_channels(mut channels: Vec<Vec<f32>>) -> Self {
        let num_frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        for channel in channels.iter_mut() {
            channel.resize(num_frames, 0.0);
        }
        Self {
            channels,
            num_frames,
        }
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Logical number of frames.
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Number of frames the buffer can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Reallocates the buffer. Not for use on the render path.
    pub fn resize(&mut self, num_channels: usize, num_frames: usize) {
        self.channels.resize_with(num_channels, Vec::new);
        for channel in self.channels.iter_mut() {
            channel.clear();
            channel.resize(num_frames, 0.0);
        }
        self.num_frames = num_frames;
    }

    /// Sets the logical frame count, clamped to the capacity.
    pub fn set_num_frames(&mut self, num_frames: usize) {
        self.num_frames = num_frames.min(self.capacity());
    }

    /// Zeroes the logical frames of every channel.
    pub fn clear(&mut self) {
        let num_frames = self.num_frames;
        for channel in self.channels.iter_mut() {
            channel[..num_frames].fill(0.0);
        }
    }

    /// Returns the logical frames of a channel.
    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.channels[channel][..self.num_frames]
    }

    /// Returns the logical frames of a channel, mutably.
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        let num_frames = self.num_frames;
        &mut self.channels[channel][..num_frames]
    }

    /// Returns the first channel and, for multi-channel buffers, the second one.
    pub fn stereo_mut(&mut self) -> (&mut [f32], Option<&mut [f32]>) {
        let num_frames = self.num_frames;
        match self.channels.as_mut_slice() {
            [left, right, ..] => (&mut left[..num_frames], Some(&mut right[..num_frames])),
            [left] => (&mut left[..num_frames], None),
            [] => (&mut [], None),
        }
    }

    /// Interleaves the logical frames, mostly for writing files and device output.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.num_frames * self.channels.len());
        for frame in 0..self.num_frames {
            for channel in self.channels.iter() {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    /// Returns true if every logical sample is exactly zero.
    pub fn is_silent(&self) -> bool {
        (0..self.num_channels()).all(|channel| self.channel(channel).iter().all(|s| *s == 0.0))
    }

    /// Largest absolute sample value across all channels.
    pub fn peak(&self) -> f32 {
        (0..self.num_channels())
            .flat_map(|channel| self.channel(channel).iter())
            .fold(0.0f32, |peak, sample| peak.max(sample.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_frames_stay_inside_capacity() {
        let mut buffer = AudioBuffer::new(2, 64);
        buffer.set_num_frames(16);
        assert_eq!(buffer.num_frames(), 16);
        assert_eq!(buffer.channel(0).len(), 16);

        buffer.set_num_frames(1000);
        assert_eq!(buffer.num_frames(), 64);
        assert_eq!(buffer.capacity(), 64);
    }

    #[test]
    fn test_clear_only_touches_logical_frames() {
        let mut buffer = AudioBuffer::from_channels(vec![vec![1.0; 8]]);
        buffer.set_num_frames(4);
        buffer.clear();
        buffer.set_num_frames(8);
        assert_eq!(buffer.channel(0), &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_stereo_mut() {
        let mut mono = AudioBuffer::new(1, 4);
        let (left, right) = mono.stereo_mut();
        assert_eq!(left.len(), 4);
        assert!(right.is_none());

        let mut stereo = AudioBuffer::new(2, 4);
        let (left, right) = stereo.stereo_mut();
        left[0] = 1.0;
        right.expect("right channel")[0] = -1.0;
        assert_eq!(stereo.to_interleaved()[..2], [1.0, -1.0]);
    }

    #[test]
    fn test_from_channels_pads_short_channels() {
        let buffer = AudioBuffer::from_channels(vec![vec![0.5; 3], vec![0.25]]);
        assert_eq!(buffer.num_frames(), 3);
        assert_eq!(buffer.channel(1), &[0.25, 0.0, 0.0]);
        assert_eq!(buffer.peak(), 0.5);
    }
}
