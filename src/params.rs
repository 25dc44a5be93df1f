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
//! Live playback parameters shared between the control side and the render path.
//!
//! Every value is an independent atomic scalar. The render path reads each value once per block
//! with relaxed ordering and never waits on the control side.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::{ChannelConfig, KitConfig, MasterConfig};

/// Coarse tune range in semitones.
pub const COARSE_RANGE: f32 = 36.0;

/// Fine tune range in cents.
pub const FINE_RANGE: f32 = 100.0;

/// Sentinel for "no learned note" in [`ChannelParams`].
const NO_NOTE: u32 = u32::MAX;

/// An `f32` stored as its bit pattern in an `AtomicU32`.
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Parameters of one instrument channel.
#[derive(Debug)]
pub struct ChannelParams {
    name: String,
    level: AtomicF32,
    pan: AtomicF32,
    coarse: AtomicF32,
    fine: AtomicF32,
    attack: AtomicF32,
    release: AtomicF32,
    mute: AtomicBool,
    solo: AtomicBool,
    learn: AtomicBool,
    /// The note most recently bound through MIDI learn, waiting to be picked up.
    learned_note: AtomicU32,
    /// The note the instrument currently responds to.
    bound_note: AtomicU32,
    /// Number of voices that were sounding at the end of the last render block.
    active_voices: AtomicUsize,
}

impl ChannelParams {
    /// Creates channel parameters from the channel's configuration.
    pub fn new(config: &ChannelConfig) -> Self {
        let params = Self {
            name: config.name().to_string(),
            level: AtomicF32::new(1.0),
            pan: AtomicF32::new(0.0),
            coarse: AtomicF32::new(0.0),
            fine: AtomicF32::new(0.0),
            attack: AtomicF32::new(0.0),
            release: AtomicF32::new(0.0),
            mute: AtomicBool::new(config.mute()),
            solo: AtomicBool::new(config.solo()),
            learn: AtomicBool::new(false),
            learned_note: AtomicU32::new(NO_NOTE),
            bound_note: AtomicU32::new(u32::from(config.note())),
            active_voices: AtomicUsize::new(0),
        };
        params.set_level(config.level());
        params.set_pan(config.pan());
        params.set_coarse(config.coarse());
        params.set_fine(config.fine());
        params.set_attack(config.attack());
        params.set_release(config.release());
        params
    }

    /// The channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> f32 {
        self.level.load()
    }

    /// Sets the level, clamped to [0, 1].
    pub fn set_level(&self, level: f32) {
        self.level.store(level.clamp(0.0, 1.0));
    }

    pub fn pan(&self) -> f32 {
        self.pan.load()
    }

    /// Sets the pan, clamped to [-1, 1].
    pub fn set_pan(&self, pan: f32) {
        self.pan.store(pan.clamp(-1.0, 1.0));
    }

    /// Coarse tune in semitones.
    pub fn coarse(&self) -> f32 {
        self.coarse.load()
    }

    pub fn set_coarse(&self, semitones: f32) {
        self.coarse.store(semitones.clamp(-COARSE_RANGE, COARSE_RANGE));
    }

    /// Fine tune in cents.
    pub fn fine(&self) -> f32 {
        self.fine.load()
    }

    pub fn set_fine(&self, cents: f32) {
        self.fine.store(cents.clamp(-FINE_RANGE, FINE_RANGE));
    }

    /// Attack time in seconds.
    pub fn attack(&self) -> f32 {
        self.attack.load()
    }

    pub fn set_attack(&self, seconds: f32) {
        self.attack.store(seconds.max(0.0));
    }

    /// Release time in seconds.
    pub fn release(&self) -> f32 {
        self.release.load()
    }

    pub fn set_release(&self, seconds: f32) {
        self.release.store(seconds.max(0.0));
    }

    pub fn mute(&self) -> bool {
        self.mute.load(Ordering::Relaxed)
    }

    pub fn set_mute(&self, mute: bool) {
        self.mute.store(mute, Ordering::Relaxed);
    }

    pub fn solo(&self) -> bool {
        self.solo.load(Ordering::Relaxed)
    }

    pub fn set_solo(&self, solo: bool) {
        self.solo.store(solo, Ordering::Relaxed);
    }

    /// Returns true while the channel waits for a note to learn.
    pub fn learn_enabled(&self) -> bool {
        self.learn.load(Ordering::Relaxed)
    }

    /// Arms or disarms MIDI learn.
    pub fn set_learn_enabled(&self, enabled: bool) {
        self.learn.store(enabled, Ordering::Relaxed);
    }

    /// Called by the engine once a note has been learned: disarms learn mode and publishes the
    /// note for the control side.
    pub(crate) fn finish_learn(&self, note: u8) {
        self.bound_note.store(u32::from(note), Ordering::Relaxed);
        self.learned_note.store(u32::from(note), Ordering::Release);
        self.learn.store(false, Ordering::Release);
    }

    /// Takes the note learned since the last call, if any.
    pub fn take_learned_note(&self) -> Option<u8> {
        match self.learned_note.swap(NO_NOTE, Ordering::Acquire) {
            NO_NOTE => None,
            note => u8::try_from(note).ok(),
        }
    }

    /// The note the instrument currently responds to.
    pub fn bound_note(&self) -> u8 {
        u8::try_from(self.bound_note.load(Ordering::Relaxed)).unwrap_or(0)
    }

    /// Rebinds the channel to `note`. The engine picks it up at its next block.
    pub fn set_bound_note(&self, note: u8) {
        self.bound_note.store(u32::from(note), Ordering::Relaxed);
    }

    /// Number of voices that were sounding at the end of the last render block.
    pub fn active_voices(&self) -> usize {
        self.active_voices.load(Ordering::Relaxed)
    }

    pub(crate) fn set_active_voices(&self, count: usize) {
        self.active_voices.store(count, Ordering::Relaxed);
    }
}

/// Parameters of the master bus.
#[derive(Debug)]
pub struct MasterParams {
    level: AtomicF32,
    pan: AtomicF32,
    mute: AtomicBool,
}

impl MasterParams {
    pub fn new(config: &MasterConfig) -> Self {
        let params = Self {
            level: AtomicF32::new(1.0),
            pan: AtomicF32::new(0.0),
            mute: AtomicBool::new(config.mute()),
        };
        params.set_level(config.level());
        params.set_pan(config.pan());
        params
    }

    pub fn level(&self) -> f32 {
        self.level.load()
    }

    pub fn set_level(&self, level: f32) {
        self.level.store(level.clamp(0.0, 1.0));
    }

    pub fn pan(&self) -> f32 {
        self.pan.load()
    }

    pub fn set_pan(&self, pan: f32) {
        self.pan.store(pan.clamp(-1.0, 1.0));
    }

    pub fn mute(&self) -> bool {
        self.mute.load(Ordering::Relaxed)
    }

    pub fn set_mute(&self, mute: bool) {
        self.mute.store(mute, Ordering::Relaxed);
    }
}

/// A cloneable handle to every live parameter of a sampler, for the control side.
#[derive(Clone, Debug)]
pub struct Controls {
    master: Arc<MasterParams>,
    channels: Vec<Arc<ChannelParams>>,
}

impl Controls {
    /// Creates the parameters for a kit.
    pub fn new(kit: &KitConfig) -> Self {
        Self {
            master: Arc::new(MasterParams::new(kit.master())),
            channels: kit
                .channels()
                .iter()
                .map(|channel| Arc::new(ChannelParams::new(channel)))
                .collect(),
        }
    }

    pub fn master(&self) -> &Arc<MasterParams> {
        &self.master
    }

    /// All channels, in kit order.
    pub fn channels(&self) -> &[Arc<ChannelParams>] {
        &self.channels
    }

    /// Gets a channel by its position in the kit.
    pub fn channel(&self, index: usize) -> Option<&Arc<ChannelParams>> {
        self.channels.get(index)
    }

    /// Gets a channel by name.
    pub fn channel_by_name(&self, name: &str) -> Option<&Arc<ChannelParams>> {
        self.channels.iter().find(|channel| channel.name() == name)
    }

    /// Returns true if any channel is soloed.
    pub fn any_solo(&self) -> bool {
        self.channels.iter().any(|channel| channel.solo())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;

    #[test]
    fn test_atomic_f32() {
        let value = AtomicF32::new(0.25);
        assert_eq!(value.load(), 0.25);
        value.store(-3.5);
        assert_eq!(value.load(), -3.5);
    }

    #[test]
    fn test_channel_params_clamp() {
        let params = ChannelParams::new(&ChannelConfig::new("Kick", 36));
        params.set_level(2.0);
        params.set_pan(-4.0);
        params.set_coarse(48.0);
        params.set_fine(-250.0);
        params.set_release(-1.0);

        assert_eq!(params.level(), 1.0);
        assert_eq!(params.pan(), -1.0);
        assert_eq!(params.coarse(), 36.0);
        assert_eq!(params.fine(), -100.0);
        assert_eq!(params.release(), 0.0);
    }

    #[test]
    fn test_learned_note_is_taken_once() {
        let params = ChannelParams::new(&ChannelConfig::new("Snare", 38));
        params.set_learn_enabled(true);
        assert_eq!(params.take_learned_note(), None);

        params.finish_learn(40);
        assert!(!params.learn_enabled());
        assert_eq!(params.bound_note(), 40);
        assert_eq!(params.take_learned_note(), Some(40));
        assert_eq!(params.take_learned_note(), None);
    }
}
