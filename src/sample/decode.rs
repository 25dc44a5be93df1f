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
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::{AudioBuffer, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use super::asset::{SampleAsset, MAX_CHANNELS};
use super::error::LoadError;

/// Decodes an entire audio file into memory. Supports WAV, AIFF, FLAC and the other formats
/// symphonia ships with. Files longer than `max_length` are rejected.
pub fn decode_file(path: &Path, max_length: Duration) -> Result<SampleAsset, LoadError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let decode_error = |source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_error)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LoadError::NoAudioTrack(path.to_path_buf()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| LoadError::UnknownSampleRate(path.to_path_buf()))?;

    let max_frames = (max_length.as_secs_f64() * f64::from(sample_rate)).ceil() as usize;
    if let Some(n_frames) = track.codec_params.n_frames {
        if n_frames > max_frames as u64 {
            return Err(LoadError::TooLong {
                path: path.to_path_buf(),
                max: max_length,
            });
        }
    }

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(decode_error)?;

    let mut channels: Vec<Vec<f32>> = Vec::new();
    let mut converted: Option<AudioBuffer<f32>> = None;
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            // Some readers report the end of the stream as a decode error.
            Err(SymphoniaError::DecodeError(_)) => break,
            Err(e) => return Err(decode_error(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(path = ?path, error = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(decode_error(e)),
        };
        if decoded.frames() == 0 {
            continue;
        }

        let reusable = converted.as_ref().is_some_and(|buffer| {
            buffer.spec() == decoded.spec() && buffer.capacity() >= decoded.frames()
        });
        if !reusable {
            converted = Some(decoded.make_equivalent::<f32>());
        }
        let Some(buffer) = converted.as_mut() else {
            continue;
        };
        decoded.convert(buffer);

        if channels.is_empty() {
            let count = buffer.spec().channels.count().min(MAX_CHANNELS);
            channels = vec![Vec::new(); count];
        }
        for (index, channel) in channels.iter_mut().enumerate() {
            channel.extend_from_slice(buffer.chan(index));
        }

        if channels.first().map(Vec::len).unwrap_or(0) > max_frames {
            return Err(LoadError::TooLong {
                path: path.to_path_buf(),
                max: max_length,
            });
        }
    }

    let asset = SampleAsset::new(&path.to_string_lossy(), channels, sample_rate);
    if asset.frame_count() == 0 {
        return Err(LoadError::Empty(path.to_path_buf()));
    }
    Ok(asset)
}
