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

/// Typed error for kit load/validation failures so callers can distinguish e.g. a missing file
/// from an invalid channel list without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid duration for {field}: {value} ({reason})")]
    InvalidDuration {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("The kit has no channels")]
    NoChannels,

    #[error("Channel {0} is defined more than once")]
    DuplicateChannel(String),

    #[error("Channel {channel} has an invalid MIDI note {note}")]
    InvalidNote { channel: String, note: u8 },

    #[error("{0} must be at least 1")]
    ZeroCount(&'static str),
}
