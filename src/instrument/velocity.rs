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
/// The lowest velocity a note-on can carry (1/128).
pub const MIN_VELOCITY: f32 = 1.0 / 128.0;

/// A half-open slice [start, end) of the normalized velocity range. The topmost slice of a
/// layering also contains its end so that a full-scale hit is matched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityRange {
    start: f32,
    end: f32,
    inclusive_end: bool,
}

impl VelocityRange {
    pub fn new(start: f32, end: f32) -> VelocityRange {
        VelocityRange {
            start,
            end,
            inclusive_end: false,
        }
    }

    pub fn start(&self) -> f32 {
        self.start
    }

    pub fn end(&self) -> f32 {
        self.end
    }

    pub fn contains(&self, velocity: f32) -> bool {
        velocity >= self.start
            && (velocity < self.end || (self.inclusive_end && velocity == self.end))
    }
}

/// Divides [1/128, 1.0] into `count` equal, contiguous ranges in ascending order.
pub fn velocity_layers(count: usize) -> Vec<VelocityRange> {
    let width = (1.0 - MIN_VELOCITY) / count as f32;
    let boundary = |i: usize| {
        if i == count {
            1.0
        } else {
            MIN_VELOCITY + width * i as f32
        }
    };

    (0..count)
        .map(|i| VelocityRange {
            start: boundary(i),
            end: boundary(i + 1),
            inclusive_end: i + 1 == count,
        })
        .collect()
}

/// Maps a MIDI velocity (0-127) onto [0, 1].
#[inline]
pub fn normalize_velocity(velocity: u8) -> f32 {
    f32::from(velocity.min(127)) / 127.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layers_partition_the_range() {
        for count in 1..=16 {
            let layers = velocity_layers(count);
            assert_eq!(layers.len(), count);
            assert_eq!(layers[0].start(), MIN_VELOCITY);
            assert_eq!(layers[count - 1].end(), 1.0);
            for pair in layers.windows(2) {
                assert_eq!(pair[0].end(), pair[1].start());
                assert!(pair[0].start() < pair[1].start());
            }
        }
    }

    #[test]
    fn test_every_velocity_has_exactly_one_layer() {
        for count in 1..=16 {
            let layers = velocity_layers(count);
            for velocity in 1..=127u8 {
                let v = normalize_velocity(velocity);
                let matches = layers.iter().filter(|l| l.contains(v)).count();
                assert_eq!(matches, 1, "velocity {} with {} layers", velocity, count);
            }
            assert!(!layers.iter().any(|l| l.contains(0.0)));
        }
    }

    #[test]
    fn test_two_layers() {
        let layers = velocity_layers(2);
        assert!(layers[1].contains(0.9));
        assert!(!layers[0].contains(0.9));
        assert!(layers[0].contains(normalize_velocity(1)));
        assert!(layers[1].contains(1.0));
    }
}
