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
//! One instrument channel: its sounds, its voice pool and how triggers are routed to them.

mod engine;
mod sound;
mod velocity;
mod voice;

pub use engine::{EngineSettings, InstrumentEngine, VoiceActivity};
pub use sound::{InstrumentVoiceSound, Sound};
pub use velocity::{normalize_velocity, velocity_layers, VelocityRange, MIN_VELOCITY};
pub use voice::{EnvelopeState, RenderVoice, Voice, VoiceStart};
