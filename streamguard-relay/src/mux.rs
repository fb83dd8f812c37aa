//! The muxer: a named FIFO opened once for both read and write and held
//! open for the relay's lifetime, plus the `current_mode` flag that makes
//! source switching "pure metadata" (spec §4.4).
//!
//! Grounded on the teacher's `run_ffmpeg_command`
//! (`stream/transcoding/worker.rs`) for the child-process spawn/drain/wait
//! shape the pumps and transcoder reuse; the pipe itself has no teacher
//! analogue (the teacher never holds a FIFO open across writer
//! transitions) so its shape follows spec §4.4 and §9 ("Scoped resources")
//! directly.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use streamguard_model::source::Source;

use crate::error::{RelayError, Result};

const CHANNEL_CAPACITY: usize = 100;

/// Flips under a mutex (spec §5: "cheap; every chunk read takes it").
/// `AtomicBool` is enough state (two variants) but a mutex-guarded enum
/// keeps the intent ("this is the mode flag the spec describes, not a
/// generic boolean") legible at call sites.
#[derive(Debug)]
pub struct ModeFlag {
    is_primary: AtomicBool,
}

impl ModeFlag {
    pub fn new(initial: Source) -> Self {
        Self {
            is_primary: AtomicBool::new(initial == Source::Primary),
        }
    }

    pub fn get(&self) -> Source {
        if self.is_primary.load(Ordering::Acquire) {
            Source::Primary
        } else {
            Source::Loop
        }
    }

    pub fn set(&self, mode: Source) {
        self.is_primary.store(mode == Source::Primary, Ordering::Release);
    }
}

/// One writer task drains this channel and writes into the pipe file; a
/// chunk is always copied from a single pump read, so there is no
/// partial-chunk interleaving (spec §4.4(iii)).
pub struct Muxer {
    pub mode: Arc<ModeFlag>,
    tx: mpsc::Sender<Vec<u8>>,
    writer_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    pipe_path: PathBuf,
}

impl Muxer {
    /// Creates the FIFO (if absent) and opens it read-write once, then
    /// spawns the single writer task that drains `streamChan` into it.
    pub async fn start(pipe_path: impl AsRef<Path>, initial_mode: Source) -> Result<Self> {
        let pipe_path = pipe_path.as_ref().to_path_buf();
        if let Some(parent) = pipe_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if !pipe_path.exists() {
            nix::unistd::mkfifo(&pipe_path, nix::sys::stat::Mode::from_bits_truncate(0o660))
                .map_err(|e| RelayError::Internal(format!("mkfifo failed: {e}")))?;
        }

        // Opening read-write keeps this fd from ever seeing EOF even while
        // the transcoder (the actual reader) restarts (spec §4.4(iii)).
        let file: File = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&pipe_path)
            .await?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(Self::writer_loop(file, rx));

        Ok(Self {
            mode: Arc::new(ModeFlag::new(initial_mode)),
            tx,
            writer_handle: Mutex::new(Some(handle)),
            pipe_path,
        })
    }

    async fn writer_loop(mut file: File, mut rx: mpsc::Receiver<Vec<u8>>) {
        while let Some(chunk) = rx.recv().await {
            if let Err(err) = file.write_all(&chunk).await {
                warn!(%err, "muxer pipe write failed");
            }
        }
        info!("muxer writer loop exiting");
    }

    /// Handle to give each pump so it can forward chunks; the pump checks
    /// `mode` itself before sending (spec §4.4: "only forwards ... while
    /// the relay's mode is LOOP/PRIMARY").
    pub fn sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.tx.clone()
    }

    /// Pure metadata flip — no pipe teardown, no transcoder/distributor
    /// restart (spec §4.4: "Mode switch semantics").
    pub fn switch(&self, mode: Source) {
        self.mode.set(mode);
    }

    /// Structured cleanup: stop the writer task and remove the pipe file
    /// (spec §9: "the relay cleanup MUST ... remove the pipe file").
    pub async fn shutdown(&self) {
        if let Some(handle) = self.writer_handle.lock().await.take() {
            handle.abort();
        }
        if let Err(err) = tokio::fs::remove_file(&self.pipe_path).await {
            warn!(%err, path = %self.pipe_path.display(), "failed to remove pipe file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_flag_round_trips() {
        let flag = ModeFlag::new(Source::Loop);
        assert_eq!(flag.get(), Source::Loop);
        flag.set(Source::Primary);
        assert_eq!(flag.get(), Source::Primary);
    }
}
