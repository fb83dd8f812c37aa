//! Ingress pumps: one child encoder process per ingest (loop, primary)
//! that reads MS with `-copy` semantics and streams transport-stream
//! bytes onto the muxer's channel whenever it is the active mode
//! (spec §4.4(i)-(ii)).
//!
//! Spawn/drain/wait shape grounded on the teacher's `run_ffmpeg_command`
//! (`stream/transcoding/worker.rs`): `Stdio::piped()` stdout, stderr
//! drained into a side task, `.wait()` for exit, classify exit status.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use streamguard_model::source::Source;

use crate::mux::ModeFlag;

const READ_CHUNK_BYTES: usize = 64 * 1024;
/// Loop pump restart backoff (spec §4.4(i): "restarted after 50-100 ms").
const LOOP_RESTART_DELAY: Duration = Duration::from_millis(75);

fn build_pump_command(encoder_path: &str, source_url: &str) -> Command {
    let mut cmd = Command::new(encoder_path);
    cmd.args([
        "-i",
        source_url,
        "-c",
        "copy",
        "-f",
        "mpegts",
        "-loglevel",
        "warning",
        "-",
    ]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    cmd
}

/// One iteration: spawn, drain, forward chunks while active, wait.
/// Returns when the child process exits or `kill` is notified, in which
/// case the child is killed directly before returning.
async fn run_once(
    encoder_path: &str,
    source_url: &str,
    source: Source,
    mode: &ModeFlag,
    tx: &mpsc::Sender<Vec<u8>>,
    kill: &Notify,
) -> anyhow::Result<()> {
    let mut child = build_pump_command(encoder_path, source_url).spawn()?;
    let mut stdout = child.stdout.take().expect("stdout piped");
    let stderr = child.stderr.take().expect("stderr piped");

    let stderr_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(pump = ?source, "{line}");
        }
    });

    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let n = tokio::select! {
            result = stdout.read(&mut buf) => match result {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    warn!(pump = ?source, %err, "pump stdout read failed");
                    break;
                }
            },
            _ = kill.notified() => {
                let _ = child.start_kill();
                stderr_task.abort();
                let _ = child.wait().await;
                return Ok(());
            }
        };

        // "only forwards bytes downstream while the relay's mode is
        // LOOP/PRIMARY" (spec §4.4(i)-(ii)) — checked fresh on every read
        // so a mode flip takes effect on the very next chunk.
        if mode.get() == source {
            let chunk = buf[..n].to_vec();
            if tx.try_send(chunk).is_err() {
                warn!(pump = ?source, "muxer channel full or closed, dropping chunk");
            }
        }
    }

    stderr_task.abort();
    let status = child.wait().await?;
    if !status.success() {
        debug!(pump = ?source, ?status, "pump process exited non-zero");
    }
    Ok(())
}

/// Loop pump: runs forever, restarting after a short delay on every exit
/// (spec §4.4(i)).
pub fn spawn_loop_pump(
    encoder_path: String,
    source_url: String,
    mode: Arc<ModeFlag>,
    tx: mpsc::Sender<Vec<u8>>,
) -> LoopPumpHandle {
    let kill = Arc::new(Notify::new());
    let kill_clone = kill.clone();
    let join = tokio::spawn(async move {
        loop {
            if let Err(err) =
                run_once(&encoder_path, &source_url, Source::Loop, &mode, &tx, &kill_clone).await
            {
                warn!(%err, "loop pump failed to spawn");
            }
            tokio::time::sleep(LOOP_RESTART_DELAY).await;
        }
    });
    LoopPumpHandle { join, kill }
}

/// Handle for stopping the loop pump on relay shutdown; without it the
/// pump's ffmpeg child outlives the relay process.
pub struct LoopPumpHandle {
    join: tokio::task::JoinHandle<()>,
    kill: Arc<Notify>,
}

impl LoopPumpHandle {
    pub fn stop(self) {
        self.kill.notify_one();
        self.join.abort();
    }
}

/// Primary pump: runs only while the relay has a configured primary
/// source URL. On unexpected exit while primary is the active mode, the
/// relay must flip to LOOP immediately (spec §4.4: "Internal failover
/// trigger") — `on_unexpected_exit` performs that flip without touching
/// the reconciler's logical source.
pub fn spawn_primary_pump(
    encoder_path: String,
    source_url: String,
    mode: Arc<ModeFlag>,
    tx: mpsc::Sender<Vec<u8>>,
    on_unexpected_exit: Arc<dyn Fn() + Send + Sync>,
) -> PrimaryPumpHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let kill = Arc::new(Notify::new());
    let stop_clone = stop.clone();
    let kill_clone = kill.clone();
    let join = tokio::spawn(async move {
        loop {
            if stop_clone.load(Ordering::Acquire) {
                break;
            }
            let was_active = mode.get() == Source::Primary;
            if let Err(err) =
                run_once(&encoder_path, &source_url, Source::Primary, &mode, &tx, &kill_clone).await
            {
                warn!(%err, "primary pump failed to spawn");
            }
            if stop_clone.load(Ordering::Acquire) {
                break;
            }
            if was_active && mode.get() == Source::Primary {
                info!("primary pump exited unexpectedly while active, failing over to loop");
                mode.set(Source::Loop);
                on_unexpected_exit();
            }
            tokio::time::sleep(LOOP_RESTART_DELAY).await;
        }
    });

    PrimaryPumpHandle { join, stop, kill }
}

/// Cooperative handle for stopping the primary pump when `/update`
/// removes the primary source or the channel is disabled. `stop()` kills
/// the live ffmpeg child directly, not just the supervising task.
pub struct PrimaryPumpHandle {
    join: tokio::task::JoinHandle<()>,
    stop: Arc<AtomicBool>,
    kill: Arc<Notify>,
}

impl PrimaryPumpHandle {
    pub fn stop(self) {
        self.stop.store(true, Ordering::Release);
        self.kill.notify_one();
        self.join.abort();
    }
}
