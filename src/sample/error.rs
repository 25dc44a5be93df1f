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
use std::path::PathBuf;
use std::time::Duration;

/// Reasons a sample could not be loaded. None of these are fatal: the sound stays silent.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Sample file {0} does not exist")]
    NotFound(PathBuf),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: symphonia::core::errors::Error,
    },

    #[error("No audio track found in {0}")]
    NoAudioTrack(PathBuf),

    #[error("Sample rate not specified in {0}")]
    UnknownSampleRate(PathBuf),

    #[error("{0} contains no audio")]
    Empty(PathBuf),

    #[error("{path} is longer than the maximum sample length of {max:?}")]
    TooLong { path: PathBuf, max: Duration },
}

impl LoadError {
    /// Returns true if the error means the file simply isn't there (yet).
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound(_))
    }
}
