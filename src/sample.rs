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
//! Sample assets and their background loaders.
//!
//! Decoded samples are published into an [`AssetSlot`] with a single atomic swap. The render path
//! takes a counted reference from the slot once per block, so a reload never frees a buffer that a
//! voice is still reading.

mod asset;
mod decode;
mod error;
mod loader;

pub use asset::{AssetSlot, SampleAsset, MAX_CHANNELS};
pub use decode::decode_file;
pub use error::LoadError;
pub use loader::{sample_path, LoaderThread, PollOutcome, SampleLoader};
