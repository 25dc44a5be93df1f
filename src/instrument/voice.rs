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
//! Polyphonic playback slots.
//!
//! A voice reads its sample with 2-point linear interpolation at a fractional rate, applies the
//! channel pan and its attack/release envelope and adds the result into the instrument's bus.

use crate::audio::{pan_gains, AudioBuffer};
use crate::sample::SampleAsset;

use super::sound::{InstrumentVoiceSound, Sound};

/// Envelope stage of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Idle,
    Attack,
    Sustain,
    Release,
}

/// Everything a voice needs to start playing.
#[derive(Debug, Clone, Copy)]
pub struct VoiceStart {
    /// Index of the sound within its instrument.
    pub sound_index: usize,
    pub note: u8,
    pub midi_channel: u8,
    /// Allocation order; lower is older.
    pub sequence: u64,
    /// Frame within the current block at which playback begins.
    pub offset: usize,
    pub source_rate: u32,
    pub output_rate: u32,
    /// Pitch offset in semitones (coarse plus fine / 100).
    pub semitones: f32,
    /// Attack time in seconds.
    pub attack: f32,
    /// Release time in seconds.
    pub release: f32,
    /// Channel pan when the note starts.
    pub pan: f32,
}

/// A playback slot for a sound.
pub trait Voice {
    type Sound: Sound;

    /// Returns true if the voice is able to play `sound` right now.
    fn can_play_sound(&self, sound: &Self::Sound) -> bool;

    fn start_note(&mut self, start: VoiceStart);

    /// Stops the voice, through its release stage if `allow_tail_off` is set.
    fn stop_note(&mut self, allow_tail_off: bool);

    /// Adds the next block into `output`. A missing asset stops the voice and renders nothing.
    fn render_next_block(
        &mut self,
        asset: Option<&SampleAsset>,
        output: &mut AudioBuffer,
        pan: f32,
    );

    fn is_active(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct RenderVoice {
    state: EnvelopeState,
    sound_index: usize,
    note: u8,
    midi_channel: u8,
    sequence: u64,
    position: f64,
    pitch_ratio: f64,
    level: f32,
    attack_delta: f32,
    release_delta: f32,
    start_offset: usize,
    /// Left and right pan gains the last block ended with.
    previous_pan: (f32, f32),
}

impl Default for RenderVoice {
    fn default() -> Self {
        RenderVoice {
            state: EnvelopeState::Idle,
            sound_index: 0,
            note: 0,
            midi_channel: 0,
            sequence: 0,
            position: 0.0,
            pitch_ratio: 1.0,
            level: 0.0,
            attack_delta: 0.0,
            release_delta: 0.0,
            start_offset: 0,
            previous_pan: (1.0, 1.0),
        }
    }
}

/// Per-sample envelope step for a ramp of `seconds` at `rate`. Zero means instantaneous.
fn ramp_delta(seconds: f32, rate: u32) -> f32 {
    let samples = seconds * rate as f32;
    if samples > 0.0 {
        1.0 / samples
    } else {
        0.0
    }
}

impl RenderVoice {
    pub fn new() -> RenderVoice {
        RenderVoice::default()
    }

    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    pub fn sound_index(&self) -> usize {
        self.sound_index
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn midi_channel(&self) -> u8 {
        self.midi_channel
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Current read position in source frames.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn pitch_ratio(&self) -> f64 {
        self.pitch_ratio
    }

    /// Current envelope level.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Returns true if the voice is sounding `note` from `midi_channel` and hasn't been released.
    pub fn is_playing(&self, note: u8, midi_channel: u8) -> bool {
        matches!(self.state, EnvelopeState::Attack | EnvelopeState::Sustain)
            && self.note == note
            && self.midi_channel == midi_channel
    }

    fn clear(&mut self) {
        self.state = EnvelopeState::Idle;
        self.level = 0.0;
        self.start_offset = 0;
    }
}

impl Voice for RenderVoice {
    type Sound = InstrumentVoiceSound;

    fn can_play_sound(&self, sound: &InstrumentVoiceSound) -> bool {
        sound.has_asset()
    }

    fn start_note(&mut self, start: VoiceStart) {
        self.sound_index = start.sound_index;
        self.note = start.note;
        self.midi_channel = start.midi_channel;
        self.sequence = start.sequence;
        self.start_offset = start.offset;
        self.position = 0.0;
        self.pitch_ratio = 2f64.powf(f64::from(start.semitones) / 12.0)
            * f64::from(start.source_rate)
            / f64::from(start.output_rate.max(1));
        self.attack_delta = ramp_delta(start.attack, start.source_rate);
        self.release_delta = ramp_delta(start.release, start.source_rate);
        self.previous_pan = pan_gains(start.pan);

        if self.attack_delta > 0.0 {
            self.state = EnvelopeState::Attack;
            self.level = 0.0;
        } else {
            self.state = EnvelopeState::Sustain;
            self.level = 1.0;
        }
    }

    fn stop_note(&mut self, allow_tail_off: bool) {
        if self.state == EnvelopeState::Idle {
            return;
        }
        if allow_tail_off && self.release_delta > 0.0 {
            self.state = EnvelopeState::Release;
        } else {
            self.clear();
        }
    }

    fn render_next_block(
        &mut self,
        asset: Option<&SampleAsset>,
        output: &mut AudioBuffer,
        pan: f32,
    ) {
        if self.state == EnvelopeState::Idle {
            return;
        }
        let Some((asset, left)) = asset.and_then(|asset| Some((asset, asset.channel(0)?))) else {
            self.clear();
            return;
        };
        let right = asset.channel(1);
        let length = left.len();
        // The asset may have been replaced by a shorter one since the last block.
        if self.position >= length as f64 {
            self.clear();
            return;
        }

        // Pan changes ramp across the block like the bus gains do.
        let num_frames = output.num_frames();
        let (start_left, start_right) = self.previous_pan;
        let (end_left, end_right) = pan_gains(pan);
        let step_left = (end_left - start_left) / num_frames.max(1) as f32;
        let step_right = (end_right - start_right) / num_frames.max(1) as f32;
        self.previous_pan = (end_left, end_right);
        let first_frame = self.start_offset.min(num_frames);
        self.start_offset = 0;
        let (out_left, mut out_right) = output.stereo_mut();

        for frame in first_frame..num_frames {
            let index = self.position as usize;
            let alpha = (self.position - index as f64) as f32;
            let next = (index + 1).min(length - 1);

            let l = left[index] + alpha * (left[next] - left[index]);
            let r = match right {
                Some(right) => right[index] + alpha * (right[next] - right[index]),
                None => l,
            };
            let pan_left = start_left + step_left * frame as f32;
            let pan_right = start_right + step_right * frame as f32;
            let l = l * pan_left * self.level;
            let r = r * pan_right * self.level;

            match out_right.as_deref_mut() {
                Some(out_right) => {
                    out_left[frame] += l;
                    out_right[frame] += r;
                }
                None => out_left[frame] += (l + r) * 0.5,
            }

            match self.state {
                EnvelopeState::Attack => {
                    self.level += self.attack_delta;
                    if self.level >= 1.0 {
                        self.level = 1.0;
                        self.state = EnvelopeState::Sustain;
                    }
                }
                EnvelopeState::Release => {
                    self.level -= self.release_delta;
                    if self.level <= 0.0 {
                        self.clear();
                        break;
                    }
                }
                EnvelopeState::Sustain | EnvelopeState::Idle => {}
            }

            self.position += self.pitch_ratio;
            if self.position >= length as f64 {
                self.clear();
                break;
            }
        }
    }

    fn is_active(&self) -> bool {
        self.state != EnvelopeState::Idle
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::instrument::velocity_layers;
    use crate::sample::AssetSlot;
    use crate::testutil::signals;

    fn start(source_rate: u32, output_rate: u32) -> VoiceStart {
        VoiceStart {
            sound_index: 0,
            note: 36,
            midi_channel: 10,
            sequence: 1,
            offset: 0,
            source_rate,
            output_rate,
            semitones: 0.0,
            attack: 0.0,
            release: 0.0,
            pan: 0.0,
        }
    }

    fn mono(samples: Vec<f32>) -> SampleAsset {
        SampleAsset::new("test", vec![samples], 44100)
    }

    #[test]
    fn test_pitch_ratio() {
        let mut voice = RenderVoice::new();
        voice.start_note(VoiceStart {
            semitones: 12.0,
            ..start(48000, 48000)
        });
        assert_abs_diff_eq!(voice.pitch_ratio(), 2.0, epsilon = 1e-9);

        voice.start_note(VoiceStart {
            semitones: -12.0 + 0.5,
            ..start(44100, 44100)
        });
        assert_abs_diff_eq!(voice.pitch_ratio(), 2f64.powf(-11.5 / 12.0), epsilon = 1e-9);

        voice.start_note(start(44100, 88200));
        assert_abs_diff_eq!(voice.pitch_ratio(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_unity_playback_copies_the_sample() {
        let asset = mono(vec![0.1, 0.2, 0.3, 0.4]);
        let mut voice = RenderVoice::new();
        voice.start_note(start(44100, 44100));
        assert_eq!(voice.state(), EnvelopeState::Sustain);

        let mut output = AudioBuffer::new(2, 8);
        voice.render_next_block(Some(&asset), &mut output, 0.0);

        assert_eq!(output.channel(0), &[0.1, 0.2, 0.3, 0.4, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(output.channel(1), output.channel(0));
        assert!(!voice.is_active());
    }

    #[test]
    fn test_double_speed_skips_frames() {
        let asset = mono(signals::ramp(8));
        let mut voice = RenderVoice::new();
        voice.start_note(start(88200, 44100));

        let mut output = AudioBuffer::new(1, 8);
        voice.render_next_block(Some(&asset), &mut output, 0.0);

        assert_eq!(
            output.channel(0),
            &[0.0, 0.25, 0.5, 0.75, 0.0, 0.0, 0.0, 0.0]
        );
        assert!(!voice.is_active());
    }

    #[test]
    fn test_interpolation_at_half_speed() {
        let asset = mono(vec![0.0, 1.0, 0.5]);
        let mut voice = RenderVoice::new();
        voice.start_note(start(44100, 88200));

        let mut output = AudioBuffer::new(1, 8);
        voice.render_next_block(Some(&asset), &mut output, 0.0);

        // Mono output folds the duplicated channel back to the same value.
        let expected = [0.0, 0.5, 1.0, 0.75, 0.5, 0.5, 0.0, 0.0];
        for (actual, expected) in output.channel(0).iter().zip(expected) {
            assert_abs_diff_eq!(*actual, expected, epsilon = 1e-6);
        }
        assert!(!voice.is_active());
    }

    #[test]
    fn test_stops_exactly_at_the_end_for_any_ratio() {
        for semitones in [-24.0f32, -7.3, 0.0, 0.01, 5.5, 12.0, 36.0] {
            let length = 37;
            let asset = mono(vec![1.0; length]);
            let mut voice = RenderVoice::new();
            voice.start_note(VoiceStart {
                semitones,
                ..start(44100, 44100)
            });
            let ratio = voice.pitch_ratio();

            let mut output = AudioBuffer::new(1, 4096);
            voice.render_next_block(Some(&asset), &mut output, 0.0);
            assert!(!voice.is_active());

            let expected = (length as f64 / ratio).ceil() as usize;
            let rendered = output.channel(0).iter().filter(|s| **s != 0.0).count();
            assert_eq!(rendered, expected, "semitones {}", semitones);
        }
    }

    #[test]
    fn test_pan_law() {
        let asset = SampleAsset::new("stereo", vec![vec![1.0; 4], vec![1.0; 4]], 44100);
        let mut voice = RenderVoice::new();
        voice.start_note(VoiceStart {
            pan: 0.5,
            ..start(44100, 44100)
        });

        let mut output = AudioBuffer::new(2, 4);
        voice.render_next_block(Some(&asset), &mut output, 0.5);
        assert_eq!(output.channel(0), &[0.5; 4]);
        assert_eq!(output.channel(1), &[1.0; 4]);
    }

    #[test]
    fn test_pan_change_ramps_across_the_block() {
        let asset = SampleAsset::new("stereo", vec![vec![1.0; 16], vec![1.0; 16]], 44100);
        let mut voice = RenderVoice::new();
        voice.start_note(start(44100, 44100));

        let mut output = AudioBuffer::new(2, 4);
        voice.render_next_block(Some(&asset), &mut output, 1.0);
        assert_eq!(output.channel(0), &[1.0, 0.75, 0.5, 0.25]);
        assert_eq!(output.channel(1), &[1.0; 4]);

        output.clear();
        voice.render_next_block(Some(&asset), &mut output, 1.0);
        assert_eq!(output.channel(0), &[0.0; 4]);
    }

    #[test]
    fn test_accumulates_into_output() {
        let asset = mono(vec![0.25; 4]);
        let mut output = AudioBuffer::from_channels(vec![vec![0.5; 4], vec![0.5; 4]]);
        let mut voice = RenderVoice::new();
        voice.start_note(start(44100, 44100));
        voice.render_next_block(Some(&asset), &mut output, 0.0);
        assert_eq!(output.channel(0), &[0.75; 4]);
    }

    #[test]
    fn test_start_offset() {
        let asset = mono(vec![1.0; 16]);
        let mut voice = RenderVoice::new();
        voice.start_note(VoiceStart {
            offset: 3,
            ..start(44100, 44100)
        });

        let mut output = AudioBuffer::new(1, 4);
        voice.render_next_block(Some(&asset), &mut output, 0.0);
        assert_eq!(output.channel(0), &[0.0, 0.0, 0.0, 1.0]);

        output.clear();
        voice.render_next_block(Some(&asset), &mut output, 0.0);
        assert_eq!(output.channel(0), &[1.0; 4]);
        assert_eq!(voice.position(), 5.0);
    }

    #[test]
    fn test_attack_and_release() {
        let asset = mono(vec![1.0; 1000]);
        let mut voice = RenderVoice::new();
        // 4 samples of attack, 2 of release.
        voice.start_note(VoiceStart {
            attack: 4.0 / 1024.0,
            release: 2.0 / 1024.0,
            ..start(1024, 1024)
        });
        assert_eq!(voice.state(), EnvelopeState::Attack);

        let mut output = AudioBuffer::new(1, 6);
        voice.render_next_block(Some(&asset), &mut output, 0.0);
        let expected = [0.0, 0.25, 0.5, 0.75, 1.0, 1.0];
        for (actual, expected) in output.channel(0).iter().zip(expected) {
            assert_abs_diff_eq!(*actual, expected, epsilon = 1e-6);
        }
        assert_eq!(voice.state(), EnvelopeState::Sustain);

        voice.stop_note(true);
        assert_eq!(voice.state(), EnvelopeState::Release);
        output.clear();
        voice.render_next_block(Some(&asset), &mut output, 0.0);
        assert_abs_diff_eq!(output.channel(0)[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(output.channel(0)[1], 0.5, epsilon = 1e-6);
        assert_eq!(&output.channel(0)[2..], &[0.0; 4]);
        assert!(!voice.is_active());
    }

    #[test]
    fn test_stop_without_tail_is_immediate() {
        let mut voice = RenderVoice::new();
        voice.start_note(VoiceStart {
            release: 1.0,
            ..start(44100, 44100)
        });
        voice.stop_note(false);
        assert_eq!(voice.state(), EnvelopeState::Idle);

        // No release time means a tail-off request stops right away as well.
        voice.start_note(start(44100, 44100));
        voice.stop_note(true);
        assert_eq!(voice.state(), EnvelopeState::Idle);
    }

    #[test]
    fn test_missing_asset_renders_silence() {
        let mut voice = RenderVoice::new();
        voice.start_note(start(44100, 44100));

        let mut output = AudioBuffer::new(2, 16);
        voice.render_next_block(None, &mut output, 0.0);
        assert!(output.is_silent());
        assert!(!voice.is_active());
    }

    #[test]
    fn test_replaced_asset_is_read_from_the_current_position() {
        let mut voice = RenderVoice::new();
        voice.start_note(start(44100, 44100));

        let mut output = AudioBuffer::new(1, 4);
        voice.render_next_block(Some(&mono(vec![0.5; 16])), &mut output, 0.0);
        assert_eq!(voice.position(), 4.0);

        output.clear();
        voice.render_next_block(Some(&mono(vec![0.25; 6])), &mut output, 0.0);
        assert_eq!(output.channel(0), &[0.25, 0.25, 0.0, 0.0]);
        assert!(!voice.is_active());

        voice.start_note(start(44100, 44100));
        voice.render_next_block(Some(&mono(vec![0.5; 16])), &mut output, 0.0);
        output.clear();
        voice.render_next_block(Some(&mono(vec![0.25; 2])), &mut output, 0.0);
        assert!(output.is_silent());
        assert!(!voice.is_active());
    }

    #[test]
    fn test_can_play_sound() {
        let slot = Arc::new(AssetSlot::empty());
        let sound = InstrumentVoiceSound::new(36, velocity_layers(1)[0], 0, 1, slot.clone());
        let voice = RenderVoice::new();
        assert!(!voice.can_play_sound(&sound));

        slot.store(Some(Arc::new(mono(vec![0.0; 4]))));
        assert!(voice.can_play_sound(&sound));
    }
}
