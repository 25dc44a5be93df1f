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
//! Kit configuration.
//!
//! A kit is described in a YAML file and loaded through the `config` crate, so any value can be
//! overridden from the environment with the `DRUMSAMPLER_` prefix (for example
//! `DRUMSAMPLER_SAMPLE_DIR=/srv/kits/studio`). Nested keys are separated by `__`, as in
//! `DRUMSAMPLER_MASTER__LEVEL=0.5`.

use std::path::{Path, PathBuf};

use tracing::info;

mod error;
mod kit;

pub use error::ConfigError;
pub use kit::{ChannelConfig, KitConfig, MasterConfig, NoteOffBehavior};

/// Environment prefix for configuration overrides.
const ENV_PREFIX: &str = "DRUMSAMPLER";

/// Loads and validates a kit file. A relative `sample_dir` is resolved against the directory
/// containing the kit file.
pub fn load_kit(path: &Path) -> Result<KitConfig, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Yaml))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    let mut kit: KitConfig = settings.try_deserialize()?;

    if kit.sample_dir().is_relative() {
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let resolved: PathBuf = base.join(kit.sample_dir());
        kit.set_sample_dir(resolved);
    }
    kit.validate()?;

    info!(
        path = ?path,
        channels = kit.channels().len(),
        sample_dir = ?kit.sample_dir(),
        "Loaded kit configuration"
    );
    Ok(kit)
}
