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
//! A multi-output drum sampler: velocity layered, round-robin sample playback per instrument
//! channel, with lock-free hot reloading of sample files.

pub mod audio;
pub mod config;
pub mod event;
pub mod instrument;
pub mod live;
pub mod mixbus;
pub mod params;
pub mod render;
pub mod sample;
pub mod sampler;
#[cfg(test)]
mod testutil;
