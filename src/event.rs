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
//! Trigger events delivered to the sampler with each render call.

use midly::live::LiveEvent;
use midly::num::u4;
use midly::MidiMessage;

/// All sound off.
const CC_ALL_SOUND_OFF: u8 = 120;
/// All notes off.
const CC_ALL_NOTES_OFF: u8 = 123;

/// What a trigger event asks the sampler to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Velocity is the raw MIDI value, 1 to 127.
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    AllNotesOff,
    AllSoundOff,
    /// Anything the sampler doesn't act on (aftertouch, pitch bend, other controllers).
    Other,
}

/// A trigger timestamped within a render block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Frame offset from the start of the block.
    pub offset: usize,
    /// MIDI channel, 1 to 16.
    pub channel: u8,
    pub kind: TriggerKind,
}

impl TriggerEvent {
    pub fn note_on(offset: usize, channel: u8, note: u8, velocity: u8) -> TriggerEvent {
        TriggerEvent {
            offset,
            channel,
            kind: TriggerKind::NoteOn { note, velocity },
        }
    }

    pub fn note_off(offset: usize, channel: u8, note: u8) -> TriggerEvent {
        TriggerEvent {
            offset,
            channel,
            kind: TriggerKind::NoteOff { note },
        }
    }

    /// Converts a channel message. Note on with velocity 0 is a note off.
    pub fn from_midi(offset: usize, channel: u4, message: &MidiMessage) -> TriggerEvent {
        let kind = match *message {
            MidiMessage::NoteOn { key, vel } if u8::from(vel) == 0 => TriggerKind::NoteOff {
                note: u8::from(key),
            },
            MidiMessage::NoteOn { key, vel } => TriggerKind::NoteOn {
                note: u8::from(key),
                velocity: u8::from(vel),
            },
            MidiMessage::NoteOff { key, .. } => TriggerKind::NoteOff {
                note: u8::from(key),
            },
            MidiMessage::Controller { controller, .. } => match u8::from(controller) {
                CC_ALL_NOTES_OFF => TriggerKind::AllNotesOff,
                CC_ALL_SOUND_OFF => TriggerKind::AllSoundOff,
                _ => TriggerKind::Other,
            },
            _ => TriggerKind::Other,
        };

        TriggerEvent {
            offset,
            channel: u8::from(channel) + 1,
            kind,
        }
    }

    /// Converts a live event. Only channel messages produce triggers.
    pub fn from_live(offset: usize, event: &LiveEvent) -> Option<TriggerEvent> {
        match event {
            LiveEvent::Midi { channel, message } => {
                Some(TriggerEvent::from_midi(offset, *channel, message))
            }
            _ => None,
        }
    }

    /// Parses raw MIDI bytes as delivered by a MIDI input port.
    pub fn parse(offset: usize, raw: &[u8]) -> Option<TriggerEvent> {
        LiveEvent::parse(raw)
            .ok()
            .and_then(|event| TriggerEvent::from_live(offset, &event))
    }

    /// Returns the event moved to another position in the block.
    pub fn with_offset(self, offset: usize) -> TriggerEvent {
        TriggerEvent { offset, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_on() {
        let event = TriggerEvent::parse(12, &[0x99, 36, 100]).expect("event");
        assert_eq!(event, TriggerEvent::note_on(12, 10, 36, 100));
    }

    #[test]
    fn test_note_on_velocity_zero_is_note_off() {
        assert_eq!(
            TriggerEvent::parse(0, &[0x90, 38, 0]),
            Some(TriggerEvent::note_off(0, 1, 38))
        );
        assert_eq!(
            TriggerEvent::parse(0, &[0x80, 38, 64]),
            Some(TriggerEvent::note_off(0, 1, 38))
        );
    }

    #[test]
    fn test_controllers() {
        assert_eq!(
            TriggerEvent::parse(0, &[0xB0, 123, 0]).map(|e| e.kind),
            Some(TriggerKind::AllNotesOff)
        );
        assert_eq!(
            TriggerEvent::parse(0, &[0xB3, 120, 0]).map(|e| e.kind),
            Some(TriggerKind::AllSoundOff)
        );
        assert_eq!(
            TriggerEvent::parse(0, &[0xB0, 1, 64]).map(|e| e.kind),
            Some(TriggerKind::Other)
        );
        assert_eq!(
            TriggerEvent::parse(0, &[0xE0, 0, 64]).map(|e| e.kind),
            Some(TriggerKind::Other)
        );
    }

    #[test]
    fn test_parse_rejects_non_channel_messages() {
        assert_eq!(TriggerEvent::parse(0, &[0xF8]), None);
        assert_eq!(TriggerEvent::parse(0, &[]), None);
    }
}
