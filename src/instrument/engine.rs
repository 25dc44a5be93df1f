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
//! Trigger routing and voice allocation for one instrument channel.

use std::sync::Arc;

use crate::audio::AudioBuffer;
use crate::config::NoteOffBehavior;
use crate::event::{TriggerEvent, TriggerKind};
use crate::params::ChannelParams;
use crate::sample::AssetSlot;

use super::sound::{InstrumentVoiceSound, Sound};
use super::velocity::{normalize_velocity, velocity_layers};
use super::voice::{EnvelopeState, RenderVoice, Voice, VoiceStart};

/// A snapshot of one sounding voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceActivity {
    /// Position of the instrument in the kit.
    pub channel: usize,
    /// Voice slot within the instrument's pool.
    pub voice: usize,
    pub note: u8,
    pub midi_channel: u8,
    /// Velocity layer of the sound being played, 0-based.
    pub layer: usize,
    /// Round-robin slot of the sound being played, 1-based.
    pub round_robin: usize,
    pub state: EnvelopeState,
}

/// Engine settings shared by every instrument of a kit.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub velocity_layers: usize,
    pub round_robin_slots: usize,
    pub max_voices: usize,
    pub voice_stealing: bool,
    pub note_off: NoteOffBehavior,
}

/// The sounds and voice pool of one instrument channel.
pub struct InstrumentEngine {
    channel: usize,
    params: Arc<ChannelParams>,
    /// Layer-major: the sound for layer `l`, slot `r` (1-based) is at `l * slots + r - 1`.
    sounds: Vec<InstrumentVoiceSound>,
    voices: Vec<RenderVoice>,
    note: u8,
    round_robin_slots: usize,
    /// Next round-robin slot to try, per layer.
    round_robin_cursor: Vec<usize>,
    voice_stealing: bool,
    note_off: NoteOffBehavior,
    output_rate: u32,
    next_sequence: u64,
}

impl InstrumentEngine {
    /// Creates the engine with one empty asset slot per sound. `slots` is called with the layer
    /// (0-based) and round-robin index (1-based) of each sound.
    pub fn new<F>(
        channel: usize,
        params: Arc<ChannelParams>,
        settings: EngineSettings,
        output_rate: u32,
        mut slots: F,
    ) -> InstrumentEngine
    where
        F: FnMut(usize, usize) -> Arc<AssetSlot>,
    {
        let note = params.bound_note();
        let layers = velocity_layers(settings.velocity_layers.max(1));
        let round_robin_slots = settings.round_robin_slots.max(1);

        let mut sounds = Vec::with_capacity(layers.len() * round_robin_slots);
        for (layer, range) in layers.iter().enumerate() {
            for round_robin in 1..=round_robin_slots {
                sounds.push(InstrumentVoiceSound::new(
                    note,
                    *range,
                    layer,
                    round_robin,
                    slots(layer, round_robin),
                ));
            }
        }

        InstrumentEngine {
            channel,
            params,
            sounds,
            voices: vec![RenderVoice::new(); settings.max_voices.max(1)],
            note,
            round_robin_slots,
            round_robin_cursor: vec![0; layers.len()],
            voice_stealing: settings.voice_stealing,
            note_off: settings.note_off,
            output_rate,
            next_sequence: 0,
        }
    }

    pub fn params(&self) -> &Arc<ChannelParams> {
        &self.params
    }

    pub fn sounds(&self) -> &[InstrumentVoiceSound] {
        &self.sounds
    }

    pub fn voices(&self) -> &[RenderVoice] {
        &self.voices
    }

    /// The note every sound is bound to.
    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn set_output_rate(&mut self, output_rate: u32) {
        self.output_rate = output_rate;
    }

    /// Rebinds every sound of the instrument to `note`.
    pub fn set_midi_note(&mut self, note: u8) {
        for sound in self.sounds.iter_mut() {
            sound.set_note(note);
        }
        self.note = note;
        self.params.set_bound_note(note);
    }

    /// Handles one trigger event.
    pub fn handle_event(&mut self, event: &TriggerEvent) {
        match event.kind {
            TriggerKind::NoteOn { note, velocity } => {
                self.note_on(note, velocity, event.channel, event.offset)
            }
            TriggerKind::NoteOff { note } => self.note_off(note, event.channel),
            TriggerKind::AllNotesOff | TriggerKind::AllSoundOff => self.all_notes_off(),
            TriggerKind::Other => {}
        }
    }

    fn note_on(&mut self, note: u8, velocity: u8, midi_channel: u8, offset: usize) {
        if self.params.learn_enabled() {
            self.set_midi_note(note);
            self.params.finish_learn(note);
            return;
        }

        let velocity = normalize_velocity(velocity);
        let Some(layer) = self
            .sounds
            .iter()
            .find(|sound| sound.applies_to(note, velocity))
            .map(InstrumentVoiceSound::layer)
        else {
            return;
        };
        let Some(sound_index) = self.next_round_robin(layer) else {
            return;
        };
        let Some(asset) = self.sounds[sound_index].asset() else {
            return;
        };

        for voice in self.voices.iter_mut() {
            if voice.is_playing(note, midi_channel) {
                voice.stop_note(true);
            }
        }

        let Some(voice_index) = self.allocate_voice() else {
            return;
        };
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.voices[voice_index].start_note(VoiceStart {
            sound_index,
            note,
            midi_channel,
            sequence,
            offset,
            source_rate: asset.sample_rate(),
            output_rate: self.output_rate,
            semitones: self.params.coarse() + self.params.fine() / 100.0,
            attack: self.params.attack(),
            release: self.params.release(),
            pan: self.params.pan(),
        });
    }

    /// Picks the next playable round-robin slot of `layer`, cycling through the slots that have
    /// an asset.
    fn next_round_robin(&mut self, layer: usize) -> Option<usize> {
        let slots = self.round_robin_slots;
        let cursor = self.round_robin_cursor[layer];
        let voice = &self.voices[0];
        let offset = (0..slots).find(|i| {
            let index = layer * slots + (cursor + i) % slots;
            voice.can_play_sound(&self.sounds[index])
        })?;

        let slot = (cursor + offset) % slots;
        self.round_robin_cursor[layer] = (slot + 1) % slots;
        Some(layer * slots + slot)
    }

    /// Finds an idle voice or, with stealing enabled, stops the oldest one.
    fn allocate_voice(&mut self) -> Option<usize> {
        if let Some(index) = self.voices.iter().position(|voice| !voice.is_active()) {
            return Some(index);
        }
        if !self.voice_stealing {
            return None;
        }

        let index = self
            .voices
            .iter()
            .enumerate()
            .min_by_key(|(_, voice)| voice.sequence())
            .map(|(index, _)| index)?;
        self.voices[index].stop_note(false);
        Some(index)
    }

    fn note_off(&mut self, note: u8, midi_channel: u8) {
        let allow_tail_off = match self.note_off {
            NoteOffBehavior::PlayToCompletion => return,
            NoteOffBehavior::Release => true,
            NoteOffBehavior::Stop => false,
        };
        for voice in self.voices.iter_mut() {
            if voice.is_playing(note, midi_channel) {
                voice.stop_note(allow_tail_off);
            }
        }
    }

    /// Moves every active voice into its release.
    pub fn all_notes_off(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.stop_note(true);
        }
    }

    /// Adds every active voice into `output`, which must already be sized for the block.
    pub fn render(&mut self, output: &mut AudioBuffer) {
        let bound = self.params.bound_note();
        if bound != self.note {
            self.set_midi_note(bound);
        }

        let pan = self.params.pan();
        let mut active = 0;
        for voice in self.voices.iter_mut().filter(|voice| voice.is_active()) {
            let asset = self.sounds.get(voice.sound_index()).and_then(|s| s.asset());
            voice.render_next_block(asset.as_deref(), output, pan);
            if voice.is_active() {
                active += 1;
            }
        }
        self.params.set_active_voices(active);
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|voice| voice.is_active()).count()
    }

    /// Describes every sounding voice.
    pub fn active_voices(&self) -> impl Iterator<Item = VoiceActivity> + '_ {
        self.voices
            .iter()
            .enumerate()
            .filter(|(_, voice)| voice.is_active())
            .map(|(index, voice)| {
                let sound = self.sounds.get(voice.sound_index());
                VoiceActivity {
                    channel: self.channel,
                    voice: index,
                    note: voice.note(),
                    midi_channel: voice.midi_channel(),
                    layer: sound.map(InstrumentVoiceSound::layer).unwrap_or(0),
                    round_robin: sound.map(InstrumentVoiceSound::round_robin).unwrap_or(0),
                    state: voice.state(),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ChannelConfig;
    use crate::sample::SampleAsset;

    use super::*;

    fn settings() -> EngineSettings {
        EngineSettings {
            velocity_layers: 2,
            round_robin_slots: 1,
            max_voices: 10,
            voice_stealing: true,
            note_off: NoteOffBehavior::PlayToCompletion,
        }
    }

    fn engine(settings: EngineSettings) -> InstrumentEngine {
        let params = Arc::new(ChannelParams::new(&ChannelConfig::new("Kick", 36)));
        InstrumentEngine::new(0, params, settings, 44100, |_, _| {
            Arc::new(AssetSlot::empty())
        })
    }

    fn load_all(engine: &InstrumentEngine, frames: usize) {
        for sound in engine.sounds() {
            sound.slot().store(Some(Arc::new(SampleAsset::new(
                "test",
                vec![vec![0.5; frames]],
                44100,
            ))));
        }
    }

    fn playing(engine: &InstrumentEngine) -> Vec<(u8, EnvelopeState)> {
        engine
            .active_voices()
            .map(|activity| (activity.note, activity.state))
            .collect()
    }

    #[test]
    fn test_sound_layout() {
        let engine = engine(EngineSettings {
            velocity_layers: 3,
            round_robin_slots: 2,
            ..settings()
        });
        let layout: Vec<(usize, usize)> = engine
            .sounds()
            .iter()
            .map(|sound| (sound.layer(), sound.round_robin()))
            .collect();
        assert_eq!(
            layout,
            vec![(0, 1), (0, 2), (1, 1), (1, 2), (2, 1), (2, 2)]
        );
        assert!(engine.sounds().iter().all(|sound| sound.note() == 36));
    }

    #[test]
    fn test_high_velocity_selects_high_layer() {
        let mut engine = engine(settings());
        load_all(&engine, 1000);

        engine.handle_event(&TriggerEvent::note_on(0, 10, 36, 115));
        let activity: Vec<VoiceActivity> = engine.active_voices().collect();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].layer, 1);
        assert_eq!(activity[0].state, EnvelopeState::Sustain);

        engine.handle_event(&TriggerEvent::note_on(0, 10, 36, 20));
        let layers: Vec<usize> = engine.active_voices().map(|a| a.layer).collect();
        assert_eq!(layers, vec![0]);
    }

    #[test]
    fn test_unloaded_sound_is_ignored() {
        let mut engine = engine(settings());
        engine.handle_event(&TriggerEvent::note_on(0, 10, 36, 100));
        assert_eq!(engine.active_voice_count(), 0);

        let mut output = AudioBuffer::new(2, 64);
        engine.render(&mut output);
        assert!(output.is_silent());
    }

    #[test]
    fn test_other_notes_are_ignored() {
        let mut engine = engine(settings());
        load_all(&engine, 1000);
        engine.handle_event(&TriggerEvent::note_on(0, 10, 38, 100));
        assert_eq!(engine.active_voice_count(), 0);
    }

    #[test]
    fn test_retrigger_releases_previous_voice() {
        let mut engine = engine(settings());
        engine.params().set_release(0.01);
        load_all(&engine, 44100);

        engine.handle_event(&TriggerEvent::note_on(0, 10, 36, 100));
        engine.handle_event(&TriggerEvent::note_on(10, 10, 36, 100));
        assert_eq!(
            playing(&engine),
            vec![(36, EnvelopeState::Release), (36, EnvelopeState::Sustain)]
        );

        engine.handle_event(&TriggerEvent::note_on(20, 10, 36, 100));
        let sustaining = engine
            .active_voices()
            .filter(|a| a.state == EnvelopeState::Sustain)
            .count();
        assert_eq!(sustaining, 1);
    }

    #[test]
    fn test_retrigger_without_release_cuts_previous_voice() {
        let mut engine = engine(settings());
        load_all(&engine, 44100);

        engine.handle_event(&TriggerEvent::note_on(0, 10, 36, 100));
        engine.handle_event(&TriggerEvent::note_on(10, 10, 36, 100));
        assert_eq!(playing(&engine), vec![(36, EnvelopeState::Sustain)]);
    }

    #[test]
    fn test_retrigger_on_other_channel_keeps_playing() {
        let mut engine = engine(settings());
        load_all(&engine, 44100);
        engine.handle_event(&TriggerEvent::note_on(0, 10, 36, 100));
        engine.handle_event(&TriggerEvent::note_on(0, 1, 36, 100));
        assert_eq!(
            playing(&engine),
            vec![(36, EnvelopeState::Sustain), (36, EnvelopeState::Sustain)]
        );
    }

    #[test]
    fn test_voice_stealing_takes_the_oldest_voice() {
        let params = Arc::new(ChannelParams::new(&ChannelConfig::new("Tom", 45)));
        let mut engine = InstrumentEngine::new(
            0,
            params,
            EngineSettings {
                max_voices: 2,
                ..settings()
            },
            44100,
            |_, _| Arc::new(AssetSlot::empty()),
        );
        load_all(&engine, 44100);

        engine.handle_event(&TriggerEvent::note_on(0, 10, 45, 100));
        engine.handle_event(&TriggerEvent::note_on(0, 11, 45, 100));
        engine.handle_event(&TriggerEvent::note_on(0, 12, 45, 100));

        let mut channels: Vec<(usize, u8)> = engine
            .active_voices()
            .map(|a| (a.voice, a.midi_channel))
            .collect();
        channels.sort();
        assert_eq!(channels, vec![(0, 12), (1, 11)]);
    }

    #[test]
    fn test_pool_exhaustion_without_stealing_drops_the_note() {
        let mut engine = engine(EngineSettings {
            max_voices: 2,
            voice_stealing: false,
            ..settings()
        });
        load_all(&engine, 44100);

        for channel in 1..=3 {
            engine.handle_event(&TriggerEvent::note_on(0, channel, 36, 100));
        }
        let channels: Vec<u8> = engine.active_voices().map(|a| a.midi_channel).collect();
        assert_eq!(channels, vec![1, 2]);
    }

    #[test]
    fn test_note_off_behaviors() {
        let mut ignoring = engine(settings());
        load_all(&ignoring, 44100);
        ignoring.handle_event(&TriggerEvent::note_on(0, 10, 36, 100));
        ignoring.handle_event(&TriggerEvent::note_off(0, 10, 36));
        assert_eq!(playing(&ignoring), vec![(36, EnvelopeState::Sustain)]);

        let mut releasing = engine(EngineSettings {
            note_off: NoteOffBehavior::Release,
            ..settings()
        });
        releasing.params().set_release(0.1);
        load_all(&releasing, 44100);
        releasing.handle_event(&TriggerEvent::note_on(0, 10, 36, 100));
        releasing.handle_event(&TriggerEvent::note_off(0, 9, 36));
        assert_eq!(playing(&releasing), vec![(36, EnvelopeState::Sustain)]);
        releasing.handle_event(&TriggerEvent::note_off(0, 10, 36));
        assert_eq!(playing(&releasing), vec![(36, EnvelopeState::Release)]);

        let mut stopping = engine(EngineSettings {
            note_off: NoteOffBehavior::Stop,
            ..settings()
        });
        stopping.params().set_release(0.1);
        load_all(&stopping, 44100);
        stopping.handle_event(&TriggerEvent::note_on(0, 10, 36, 100));
        stopping.handle_event(&TriggerEvent::note_off(0, 10, 36));
        assert_eq!(stopping.active_voice_count(), 0);
    }

    #[test]
    fn test_all_notes_off() {
        let mut engine = engine(settings());
        load_all(&engine, 44100);
        engine.handle_event(&TriggerEvent::note_on(0, 10, 36, 100));
        engine.handle_event(&TriggerEvent::note_on(0, 11, 36, 30));
        engine.handle_event(&TriggerEvent {
            offset: 0,
            channel: 1,
            kind: TriggerKind::AllSoundOff,
        });
        assert_eq!(engine.active_voice_count(), 0);
    }

    #[test]
    fn test_midi_learn() {
        let mut engine = engine(settings());
        load_all(&engine, 44100);
        engine.params().set_learn_enabled(true);

        engine.handle_event(&TriggerEvent::note_on(0, 10, 40, 100));
        assert_eq!(engine.active_voice_count(), 0);
        assert!(!engine.params().learn_enabled());
        assert_eq!(engine.params().take_learned_note(), Some(40));
        assert_eq!(engine.note(), 40);
        assert!(engine.sounds().iter().all(|sound| sound.note() == 40));

        engine.handle_event(&TriggerEvent::note_on(0, 10, 36, 100));
        assert_eq!(engine.active_voice_count(), 0);
        engine.handle_event(&TriggerEvent::note_on(0, 10, 40, 100));
        assert_eq!(engine.active_voice_count(), 1);
    }

    #[test]
    fn test_bound_note_from_control_side() {
        let mut engine = engine(settings());
        engine.params().set_bound_note(50);
        engine.render(&mut AudioBuffer::new(2, 4));
        assert_eq!(engine.note(), 50);
        assert!(engine.sounds().iter().all(|sound| sound.applies_to_note(50)));
    }

    #[test]
    fn test_round_robin_cycles_through_loaded_slots() {
        let mut engine = engine(EngineSettings {
            velocity_layers: 1,
            round_robin_slots: 3,
            ..settings()
        });
        // Slot 2 never loads.
        for sound in engine.sounds() {
            if sound.round_robin() != 2 {
                sound.slot().store(Some(Arc::new(SampleAsset::new(
                    "test",
                    vec![vec![0.5; 44100]],
                    44100,
                ))));
            }
        }

        let mut slots = Vec::new();
        for channel in 1..=4 {
            engine.handle_event(&TriggerEvent::note_on(0, channel, 36, 100));
            let newest = engine
                .active_voices()
                .find(|a| a.midi_channel == channel)
                .map(|a| a.round_robin);
            slots.push(newest);
        }
        assert_eq!(slots, vec![Some(1), Some(3), Some(1), Some(3)]);
    }

    #[test]
    fn test_render_counts_active_voices() {
        let mut engine = engine(settings());
        load_all(&engine, 100);
        engine.handle_event(&TriggerEvent::note_on(0, 10, 36, 100));

        let mut output = AudioBuffer::new(2, 64);
        engine.render(&mut output);
        assert!(!output.is_silent());
        assert_eq!(engine.params().active_voices(), 1);

        output.clear();
        engine.render(&mut output);
        assert_eq!(engine.params().active_voices(), 0);
        assert_eq!(engine.active_voice_count(), 0);
    }
}
