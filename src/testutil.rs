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

#[cfg(test)]
use std::{
    error::Error,
    fs::File,
    io::BufWriter,
    path::Path,
    thread,
    time::{Duration, Instant},
};

#[cfg(test)]
use hound::{Sample, SampleFormat, WavSpec, WavWriter};

/// Test signal generators and measurements.
#[cfg(test)]
pub mod signals {
    use std::f32::consts::PI;

    /// A sine wave at the given frequency and amplitude.
    pub fn sine(frequency: f32, amplitude: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    /// A linear ramp from 0 up to (frames - 1) / frames.
    pub fn ramp(frames: usize) -> Vec<f32> {
        (0..frames).map(|i| i as f32 / frames as f32).collect()
    }

    /// Calculate RMS (Root Mean Square) of a signal
    pub fn calculate_rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }

        let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
        (sum_squares / samples.len() as f32).sqrt()
    }
}

/// Wait for the given predicate to return true or fail.
#[cfg(test)]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Writes planar samples to an interleaved WAV file. `f32` samples are written as 32 bit float,
/// `i16` and `i32` as integer PCM of that width.
#[cfg(test)]
pub fn write_wav<S: Sample + Copy + 'static>(
    path: &Path,
    channels: &[Vec<S>],
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let (sample_format, bits_per_sample) =
        if std::any::TypeId::of::<S>() == std::any::TypeId::of::<f32>() {
            (SampleFormat::Float, 32)
        } else if std::any::TypeId::of::<S>() == std::any::TypeId::of::<i32>() {
            (SampleFormat::Int, 32)
        } else if std::any::TypeId::of::<S>() == std::any::TypeId::of::<i16>() {
            (SampleFormat::Int, 16)
        } else {
            return Err("Unsupported sample format".into());
        };

    let num_channels = u16::try_from(channels.len())?;
    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    let mut writer = WavWriter::new(
        BufWriter::new(File::create(path)?),
        WavSpec {
            channels: num_channels,
            sample_rate,
            bits_per_sample,
            sample_format,
        },
    )?;

    for frame in 0..frames {
        for channel in channels {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;

    Ok(())
}
