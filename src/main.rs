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
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use tracing_subscriber::EnvFilter;

use drumsampler::config;
use drumsampler::live;
use drumsampler::render::{self, RenderOptions};
use drumsampler::sampler::sound_files;

#[derive(Parser)]
#[clap(
    version = crate_version!(),
    about = "A multi-output drum sampler."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the sample files a kit expects and whether each one exists.
    Kit {
        /// The path to the kit config.
        kit_path: PathBuf,
    },
    /// Renders a MIDI file through a kit into a WAV file.
    Render {
        /// The path to the kit config.
        kit_path: PathBuf,
        /// The MIDI file to render.
        midi_path: PathBuf,
        /// The WAV file to write.
        output_path: PathBuf,
        /// The output sample rate. Defaults to the kit's sample rate.
        #[arg[short = 'r', long]]
        sample_rate: Option<u32>,
        /// The render block size. Defaults to the kit's block size.
        #[arg[short, long]]
        block_size: Option<usize>,
        /// How long to keep rendering after the last event.
        #[arg[short, long, default_value = "2s"]]
        tail: String,
        /// Also write one WAV file per kit channel next to the output.
        #[arg[short, long]]
        stems: bool,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Plays a kit live from a MIDI input.
    Play {
        /// The path to the kit config.
        kit_path: PathBuf,
        /// The audio device to play through. Defaults to the system default output.
        #[arg[short, long]]
        device: Option<String>,
        /// The MIDI device to listen to. Defaults to the first input.
        #[arg[short, long]]
        midi_device: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Kit { kit_path } => {
            let kit = config::load_kit(&kit_path)?;
            let files = sound_files(&kit);

            println!(
                "Kit (channels: {}, sounds: {}):",
                kit.channels().len(),
                files.len()
            );
            let mut missing = 0;
            for file in files.iter() {
                let exists = file.path.is_file();
                if !exists {
                    missing += 1;
                }
                println!(
                    "- {} layer {} rr {}: {} {}",
                    file.channel,
                    file.layer + 1,
                    file.round_robin,
                    file.path.display(),
                    if exists { "" } else { "(missing)" }
                );
            }
            if missing > 0 {
                println!("\n{} of {} files missing.", missing, files.len());
            }
        }
        Commands::Render {
            kit_path,
            midi_path,
            output_path,
            sample_rate,
            block_size,
            tail,
            stems,
        } => {
            let kit = config::load_kit(&kit_path)?;
            let tail: Duration = DurationString::from_string(tail)?.into();
            render::render_file(
                &kit,
                &midi_path,
                &output_path,
                RenderOptions {
                    sample_rate: sample_rate.unwrap_or(kit.sample_rate()),
                    block_size: block_size.unwrap_or(kit.block_size()),
                    tail,
                    stems,
                },
            )?;
        }
        Commands::Devices {} => {
            let devices = live::list_audio_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = live::list_midi_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play {
            kit_path,
            device,
            midi_device,
        } => {
            let kit = config::load_kit(&kit_path)?;
            live::play(&kit, device.as_deref(), midi_device.as_deref())?;
        }
    }

    Ok(())
}
