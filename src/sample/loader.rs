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
//! Background loading of sample files.
//!
//! Each sound owns one [`SampleLoader`]. While the sound has no asset, the loader's thread polls
//! the file on a fixed interval and publishes the decoded result into the sound's [`AssetSlot`].
//! Once loaded, the loader stays dormant until it is reset.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use super::asset::AssetSlot;
use super::decode::decode_file;
use super::error::LoadError;

/// Resolves the file for one sound: `<base_dir>/<instrument>_<round_robin>_<floor * 127>.<ext>`.
pub fn sample_path(
    base_dir: &Path,
    instrument: &str,
    round_robin: usize,
    velocity_floor: f32,
    extension: &str,
) -> PathBuf {
    let velocity = (velocity_floor * 127.0).round() as i32;
    base_dir.join(format!(
        "{}_{}_{}.{}",
        instrument, round_robin, velocity, extension
    ))
}

/// What happened on a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A new asset was published.
    Loaded,
    /// The asset is already loaded; nothing to do until reset.
    Dormant,
    /// The last attempt failed and the file hasn't changed since.
    Unchanged,
    /// The attempt failed. The asset slot is left as it was.
    Failed,
}

/// Identifies a version of a file on disk. `None` means the file doesn't exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp(Option<(SystemTime, u64)>);

impl FileStamp {
    fn of(path: &Path) -> FileStamp {
        FileStamp(
            fs::metadata(path)
                .ok()
                .map(|metadata| (metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH), metadata.len())),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Pending,
    Loaded,
    Failed(FileStamp),
}

/// Loads one sound's sample file into its asset slot.
pub struct SampleLoader {
    path: PathBuf,
    slot: Arc<AssetSlot>,
    max_length: Duration,
    state: LoadState,
}

impl SampleLoader {
    pub fn new(path: PathBuf, slot: Arc<AssetSlot>, max_length: Duration) -> SampleLoader {
        SampleLoader {
            path,
            slot,
            max_length,
            state: LoadState::Pending,
        }
    }

    /// The file this loader reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true once an asset has been published and the loader went dormant.
    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    /// Attempts a load unless the loader is dormant or the file is unchanged since the last
    /// failure.
    pub fn poll_and_load(&mut self) -> PollOutcome {
        let stamp = match self.state {
            LoadState::Loaded => return PollOutcome::Dormant,
            LoadState::Failed(previous) => {
                let stamp = FileStamp::of(&self.path);
                if stamp == previous {
                    return PollOutcome::Unchanged;
                }
                stamp
            }
            LoadState::Pending => FileStamp::of(&self.path),
        };

        let first_attempt = self.state == LoadState::Pending;
        match self.load_now() {
            Ok(()) => PollOutcome::Loaded,
            Err(e) => {
                if first_attempt {
                    warn!(path = ?self.path, err = %e, "Unable to load sample");
                } else {
                    debug!(path = ?self.path, err = %e, "Sample still unavailable");
                }
                self.state = LoadState::Failed(stamp);
                PollOutcome::Failed
            }
        }
    }

    /// Decodes the file right away and publishes it on success. A failure leaves any previously
    /// published asset in place.
    pub fn load_now(&mut self) -> Result<(), LoadError> {
        let stamp = FileStamp::of(&self.path);
        let asset = match decode_file(&self.path, self.max_length) {
            Ok(asset) => asset,
            Err(e) => {
                self.state = LoadState::Failed(stamp);
                return Err(e);
            }
        };

        info!(
            path = ?self.path,
            channels = asset.channel_count(),
            sample_rate = asset.sample_rate(),
            duration_ms = asset.duration().as_millis(),
            memory_kb = asset.memory_size() / 1024,
            "Sample loaded"
        );
        self.slot.store(Some(Arc::new(asset)));
        self.state = LoadState::Loaded;
        Ok(())
    }

    /// Makes the loader load the file again on its next poll.
    pub fn reset(&mut self) {
        self.state = LoadState::Pending;
    }
}

#[derive(Default)]
struct Signal {
    reset: bool,
    shutdown: bool,
    /// Polls completed since the loader started or was last reset.
    attempts: u64,
}

struct Shared {
    loader: Mutex<SampleLoader>,
    signal: Mutex<Signal>,
    condvar: Condvar,
}

/// Runs a [`SampleLoader`] on its own thread. The thread is shut down and joined on drop.
pub struct LoaderThread {
    shared: Arc<Shared>,
    join_handle: Option<JoinHandle<()>>,
}

impl LoaderThread {
    /// Starts polling `loader` every `interval`.
    pub fn spawn(loader: SampleLoader, interval: Duration) -> io::Result<LoaderThread> {
        let name = loader
            .path()
            .file_stem()
            .map(|stem| format!("loader-{}", stem.to_string_lossy()))
            .unwrap_or_else(|| "loader".to_string());
        let shared = Arc::new(Shared {
            loader: Mutex::new(loader),
            signal: Mutex::new(Signal::default()),
            condvar: Condvar::new(),
        });

        let join_handle = {
            let shared = shared.clone();
            thread::Builder::new()
                .name(name)
                .spawn(move || Self::run(&shared, interval))?
        };

        Ok(LoaderThread {
            shared,
            join_handle: Some(join_handle),
        })
    }

    fn run(shared: &Shared, interval: Duration) {
        loop {
            shared.loader.lock().poll_and_load();

            let mut signal = shared.signal.lock();
            // An attempt made while a reset was pending doesn't count.
            if !signal.reset {
                signal.attempts += 1;
                shared.condvar.notify_all();
            }
            if !signal.reset && !signal.shutdown {
                shared.condvar.wait_for(&mut signal, interval);
            }
            if signal.shutdown {
                debug!(path = ?shared.loader.lock().path(), "Loader shut down");
                return;
            }
            if signal.reset {
                signal.reset = false;
                shared.loader.lock().reset();
            }
        }
    }

    /// Returns true once the sample has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.shared.loader.lock().is_loaded()
    }

    pub fn path(&self) -> PathBuf {
        self.shared.loader.lock().path().to_path_buf()
    }

    /// Loads the sample on the calling thread.
    pub fn load_now(&self) -> Result<(), LoadError> {
        self.shared.loader.lock().load_now()
    }

    /// Wakes the loader and makes it load the file again.
    pub fn reset(&self) {
        let mut signal = self.shared.signal.lock();
        signal.reset = true;
        signal.attempts = 0;
        self.shared.condvar.notify_all();
        debug!("Loader reset requested");
    }

    /// Waits until the loader has made at least one attempt since it started or was last reset.
    /// Returns false on timeout.
    pub fn wait_for_attempt(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signal = self.shared.signal.lock();
        while signal.attempts == 0 {
            if self
                .shared
                .condvar
                .wait_until(&mut signal, deadline)
                .timed_out()
            {
                return signal.attempts > 0;
            }
        }
        true
    }

    /// Stops the loader thread. Loading already in progress finishes first.
    pub fn shutdown(&self) {
        let mut signal = self.shared.signal.lock();
        signal.shutdown = true;
        self.shared.condvar.notify_all();
    }
}

impl Drop for LoaderThread {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                warn!("Loader thread panicked");
            }
        }
    }
}
