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
//! Channel and master buses.
//!
//! Every bus remembers the gain it ended the previous block with. When the target changes, the
//! next block ramps from the old gain to the new one instead of stepping.

use std::sync::Arc;

use crate::audio::{add_from, apply_gain_ramp, pan_gains, AudioBuffer};
use crate::event::TriggerEvent;
use crate::instrument::InstrumentEngine;
use crate::params::{ChannelParams, Controls, MasterParams};

/// An output bus and the per-channel gains it ended the last block with.
#[derive(Debug, Clone)]
pub struct Bus {
    buffer: AudioBuffer,
    previous_gains: Vec<f32>,
}

impl Bus {
    pub fn new(num_channels: usize, max_frames: usize, initial_gain: f32) -> Bus {
        Bus {
            buffer: AudioBuffer::new(num_channels, max_frames),
            previous_gains: vec![initial_gain; num_channels],
        }
    }

    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    /// The gain the bus ended its last block with, per output channel.
    pub fn previous_gains(&self) -> &[f32] {
        &self.previous_gains
    }

    fn resize(&mut self, num_channels: usize, max_frames: usize) {
        self.buffer.resize(num_channels, max_frames);
        let gain = self.previous_gains.first().copied().unwrap_or(1.0);
        self.previous_gains.resize(num_channels, gain);
    }

    /// Sets the logical block length and zeroes it.
    fn begin_block(&mut self, frames: usize) {
        self.buffer.set_num_frames(frames);
        self.buffer.clear();
    }

    /// Applies `targets[channel]` to each channel, ramping from the previous block's gain.
    fn apply_gains(&mut self, targets: &[f32]) {
        for (channel, (previous, target)) in self
            .previous_gains
            .iter_mut()
            .zip(targets.iter().copied())
            .enumerate()
        {
            apply_gain_ramp(self.buffer.channel_mut(channel), *previous, target);
            *previous = target;
        }
    }
}

/// Sums every instrument into its channel bus and all channel buses into the master bus. Buses are
/// mono or stereo.
pub struct MixBus {
    engines: Vec<InstrumentEngine>,
    channel_buses: Vec<Bus>,
    master: Bus,
    controls: Controls,
}

impl MixBus {
    pub fn new(
        engines: Vec<InstrumentEngine>,
        controls: Controls,
        num_channels: usize,
        max_frames: usize,
    ) -> MixBus {
        let num_channels = num_channels.clamp(1, 2);
        let any_solo = controls.any_solo();
        let channel_buses = engines
            .iter()
            .map(|engine| {
                Bus::new(
                    num_channels,
                    max_frames,
                    channel_gain(engine.params(), any_solo),
                )
            })
            .collect();
        let master_params = controls.master().clone();
        let mut master = Bus::new(num_channels, max_frames, 1.0);
        for (previous, target) in master
            .previous_gains
            .iter_mut()
            .zip(master_gains(&master_params, num_channels))
        {
            *previous = target;
        }

        MixBus {
            engines,
            channel_buses,
            master,
            controls,
        }
    }

    /// Reallocates every bus. Not for use on the render path.
    pub fn prepare(&mut self, num_channels: usize, max_frames: usize, output_rate: u32) {
        let num_channels = num_channels.clamp(1, 2);
        for bus in self.channel_buses.iter_mut() {
            bus.resize(num_channels, max_frames);
        }
        self.master.resize(num_channels, max_frames);
        for engine in self.engines.iter_mut() {
            engine.set_output_rate(output_rate);
        }
    }

    pub fn engines(&self) -> &[InstrumentEngine] {
        &self.engines
    }

    pub fn engines_mut(&mut self) -> &mut [InstrumentEngine] {
        &mut self.engines
    }

    pub fn channel_bus(&self, index: usize) -> Option<&Bus> {
        self.channel_buses.get(index)
    }

    pub fn master(&self) -> &Bus {
        &self.master
    }

    /// Largest block the buses can hold.
    pub fn max_frames(&self) -> usize {
        self.master.buffer.capacity()
    }

    /// Dispatches `events` to every instrument, then renders `frames` frames into the buses. All
    /// events are handled before any audio is rendered. `frames` must not exceed
    /// [`MixBus::max_frames`].
    pub fn process_block<I>(&mut self, events: I, frames: usize)
    where
        I: IntoIterator<Item = TriggerEvent>,
    {
        for event in events {
            for engine in self.engines.iter_mut() {
                engine.handle_event(&event);
            }
        }

        let any_solo = self.controls.any_solo();
        self.master.begin_block(frames);
        let num_channels = self.master.buffer.num_channels();
        for (engine, bus) in self.engines.iter_mut().zip(self.channel_buses.iter_mut()) {
            bus.begin_block(frames);
            engine.render(&mut bus.buffer);

            let gain = channel_gain(engine.params(), any_solo);
            bus.apply_gains(&[gain; 2]);
            for channel in 0..num_channels {
                add_from(
                    self.master.buffer.channel_mut(channel),
                    bus.buffer.channel(channel),
                );
            }
        }

        let targets = master_gains(self.controls.master(), num_channels);
        self.master.apply_gains(&targets);
    }
}

/// Effective gain of a channel bus for this block.
fn channel_gain(params: &ChannelParams, any_solo: bool) -> f32 {
    let audible = !params.mute() && (!any_solo || params.solo());
    if audible {
        params.level()
    } else {
        0.0
    }
}

/// Effective left/right gains of the master bus. A mono master isn't panned.
fn master_gains(params: &Arc<MasterParams>, num_channels: usize) -> [f32; 2] {
    let level = if params.mute() { 0.0 } else { params.level() };
    if num_channels < 2 {
        return [level, level];
    }
    let (left, right) = pan_gains(params.pan());
    [level * left, level * right]
}
