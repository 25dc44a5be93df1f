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
use std::sync::Arc;

use crate::sample::{AssetSlot, SampleAsset};

use super::velocity::VelocityRange;

/// Something a voice can play.
pub trait Sound {
    /// Returns true if the sound is bound to `note`.
    fn applies_to_note(&self, note: u8) -> bool;

    /// Returns true if the sound is bound to `note` and `velocity` (normalized) is in its range.
    fn applies_to(&self, note: u8, velocity: f32) -> bool;
}

/// One velocity layer × round-robin slot of an instrument.
#[derive(Debug)]
pub struct InstrumentVoiceSound {
    note: u8,
    velocity: VelocityRange,
    layer: usize,
    /// 1-based.
    round_robin: usize,
    slot: Arc<AssetSlot>,
}

impl InstrumentVoiceSound {
    pub fn new(
        note: u8,
        velocity: VelocityRange,
        layer: usize,
        round_robin: usize,
        slot: Arc<AssetSlot>,
    ) -> InstrumentVoiceSound {
        InstrumentVoiceSound {
            note,
            velocity,
            layer,
            round_robin,
            slot,
        }
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub(crate) fn set_note(&mut self, note: u8) {
        self.note = note;
    }

    pub fn velocity(&self) -> VelocityRange {
        self.velocity
    }

    pub fn layer(&self) -> usize {
        self.layer
    }

    pub fn round_robin(&self) -> usize {
        self.round_robin
    }

    /// The slot the sound's loader publishes into.
    pub fn slot(&self) -> &Arc<AssetSlot> {
        &self.slot
    }

    /// Takes a counted reference to the current asset.
    pub fn asset(&self) -> Option<Arc<SampleAsset>> {
        self.slot.load_full()
    }

    pub fn has_asset(&self) -> bool {
        self.slot.load().is_some()
    }
}

impl Sound for InstrumentVoiceSound {
    fn applies_to_note(&self, note: u8) -> bool {
        self.note == note
    }

    fn applies_to(&self, note: u8, velocity: f32) -> bool {
        self.applies_to_note(note) && self.velocity.contains(velocity)
    }
}
