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
/// Multiplies every sample by a constant gain.
#[inline]
pub fn apply_gain(samples: &mut [f32], gain: f32) {
    if gain == 1.0 {
        return;
    }
    if gain == 0.0 {
        samples.fill(0.0);
        return;
    }
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
}

/// Applies a linear gain ramp across the slice. The first sample is scaled by `start` and each
/// following sample by one step more, where a step is `(end - start) / len`. The sample after the
/// slice would be the first to reach `end`, so a block rendered at a flat `end` afterwards
/// continues the ramp without a jump larger than one step.
#[inline]
pub fn apply_gain_ramp(samples: &mut [f32], start: f32, end: f32) {
    if samples.is_empty() {
        return;
    }
    if start == end {
        apply_gain(samples, end);
        return;
    }

    let step = (end - start) / samples.len() as f32;
    let mut gain = start;
    for sample in samples.iter_mut() {
        *sample *= gain;
        gain += step;
    }
}

/// Adds `src` into `dst` sample by sample. Extra samples on either side are ignored.
#[inline]
pub fn add_from(dst: &mut [f32], src: &[f32]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d += *s;
    }
}

/// Linear pan law: returns the left and right multipliers for `pan` in [-1, 1].
///
/// Centre leaves both sides at unity and a hard pan only attenuates the opposite side. This is not
/// an equal-power law and the output level changes with it accordingly.
#[inline]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    ((1.0 - pan).min(1.0), (1.0 + pan).min(1.0))
}
