//! Per-destination distributors: each reads the clean feed with `-copy`
//! and republishes to one downstream target, with its own exponential
//! backoff (spec §4.4: "Destination backoff specifics").

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::process::Command;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const BACKOFF_UNIT: Duration = Duration::from_secs(2);
const BACKOFF_CAP: Duration = Duration::from_secs(60);
/// Uptime beyond which a distributor is considered stable and its
/// failure counter resets (spec §4.4: "success resets after 60 s stable
/// uptime").
const STABLE_UPTIME: Duration = Duration::from_secs(60);

/// `retry_delay = min(fail_count x 2s, cap)` (spec §4.4). Pure function so
/// the exact schedule in spec §8 scenario 5 (2s, 4s, 6s, 8s, 10s) is
/// directly testable.
pub fn backoff_delay(fail_count: u32) -> Duration {
    let scaled = BACKOFF_UNIT.saturating_mul(fail_count);
    scaled.min(BACKOFF_CAP)
}

fn build_command(encoder_path: &str, clean_feed_url: &str, dest_url: &str) -> Command {
    let mut cmd = Command::new(encoder_path);
    cmd.args([
        "-i",
        clean_feed_url,
        "-c",
        "copy",
        "-f",
        "flv",
        "-loglevel",
        "warning",
        dest_url,
    ]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::piped());
    // Belt-and-suspenders with `remove()`'s explicit `start_kill()`: if the
    // supervising task is ever aborted while `child` is still a live local
    // (e.g. a future shutdown path that skips `remove`), dropping it still
    // reaps the ffmpeg process instead of orphaning it.
    cmd.kill_on_drop(true);
    cmd
}

struct Handle {
    join: tokio::task::JoinHandle<()>,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    failure_count: Arc<AtomicU32>,
    /// Wakes the supervising task out of `child.wait()` so it can
    /// `start_kill()` the live child directly instead of only aborting the
    /// task (mirrors `supervisor.rs`'s `entry.child.start_kill()`).
    kill: Arc<Notify>,
}

/// Keyed by destination id (spec §4.4: "distributors are added/removed
/// to match the desired set").
#[derive(Default)]
pub struct DistributorRegistry {
    handles: DashMap<String, Handle>,
}

impl DistributorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure(&self, id: &str, encoder_path: String, clean_feed_url: String, dest_url: String) {
        if self.handles.contains_key(id) {
            return;
        }
        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(false));
        let failure_count = Arc::new(AtomicU32::new(0));
        let kill = Arc::new(Notify::new());

        let stop_clone = stop.clone();
        let running_clone = running.clone();
        let failure_clone = failure_count.clone();
        let kill_clone = kill.clone();
        let id_owned = id.to_string();

        let join = tokio::spawn(async move {
            loop {
                if stop_clone.load(Ordering::Acquire) {
                    break;
                }
                let delay = backoff_delay(failure_clone.load(Ordering::Acquire));
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if stop_clone.load(Ordering::Acquire) {
                    break;
                }

                let mut child = match build_command(&encoder_path, &clean_feed_url, &dest_url).spawn() {
                    Ok(child) => child,
                    Err(err) => {
                        warn!(dest = %id_owned, %err, "failed to spawn distributor");
                        failure_clone.fetch_add(1, Ordering::AcqRel);
                        continue;
                    }
                };
                running_clone.store(true, Ordering::Release);
                let started_at = Instant::now();

                let stderr_task = child.stderr.take().map(|stderr| {
                    tokio::spawn(async move {
                        use tokio::io::{AsyncBufReadExt, BufReader};
                        let mut lines = BufReader::new(stderr).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            debug!(dest = %id_owned, "{line}");
                        }
                    })
                });

                let status = tokio::select! {
                    status = child.wait() => status,
                    _ = kill_clone.notified() => {
                        let _ = child.start_kill();
                        child.wait().await
                    }
                };
                running_clone.store(false, Ordering::Release);
                if let Some(t) = stderr_task {
                    t.abort();
                }

                let uptime = started_at.elapsed();
                if uptime >= STABLE_UPTIME {
                    failure_clone.store(0, Ordering::Release);
                } else {
                    failure_clone.fetch_add(1, Ordering::AcqRel);
                }
                match status {
                    Ok(status) if status.success() => {
                        info!(dest = %id_owned, "distributor exited cleanly, restarting")
                    }
                    other => debug!(dest = %id_owned, ?other, "distributor exited, restarting"),
                }
            }
        });

        self.handles.insert(
            id.to_string(),
            Handle {
                join,
                stop,
                running,
                failure_count,
                kill,
            },
        );
    }

    /// Force-kills and clears backoff (spec §4.4: "removal force-kills and
    /// clears backoff"). Wakes the supervising task so it `start_kill()`s
    /// the live ffmpeg child itself; `abort()` only stops the task, not the
    /// process it's waiting on.
    pub fn remove(&self, id: &str) {
        if let Some((_, handle)) = self.handles.remove(id) {
            handle.stop.store(true, Ordering::Release);
            handle.kill.notify_one();
            handle.join.abort();
        }
    }

    pub fn remove_all_except(&self, keep: &[String]) {
        let to_remove: Vec<String> = self
            .handles
            .iter()
            .map(|e| e.key().clone())
            .filter(|id| !keep.contains(id))
            .collect();
        for id in to_remove {
            self.remove(&id);
        }
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.handles
            .get(id)
            .map(|h| h.running.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    pub fn ids(&self) -> Vec<String> {
        self.handles.iter().map(|e| e.key().clone()).collect()
    }

    pub fn shutdown_all(&self) {
        for id in self.ids() {
            self.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_follows_spec_scenario_5() {
        // "1st retry after 2s, 2nd after 4s, ... 5th after 10s" (spec §8).
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(5), Duration::from_secs(10));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff_delay(100), BACKOFF_CAP);
    }

    #[test]
    fn zero_failures_means_no_delay() {
        assert_eq!(backoff_delay(0), Duration::ZERO);
    }
}
