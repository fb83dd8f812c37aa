//! The always-on transcoder: reads the muxer pipe and writes a single
//! normalized "clean feed" to a loopback MS path (spec §4.4(iv)).
//! Restarts on exit (it must stay hot) and on an encoding-parameter
//! change pushed through `/update` — "the only visible hiccup" per the
//! control contract (spec §4.4).

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

const RESTART_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub struct TranscoderConfig {
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub keyframe_interval_seconds: u32,
    pub output_resolution: String,
}

fn build_command(encoder_path: &str, pipe_path: &str, clean_feed_url: &str, cfg: &TranscoderConfig) -> Command {
    let mut cmd = Command::new(encoder_path);
    cmd.args(["-i", pipe_path]);
    cmd.args(["-c:v", "libx264", "-b:v", &format!("{}k", cfg.video_bitrate_kbps)]);
    cmd.args(["-g", &(cfg.keyframe_interval_seconds * 30).to_string()]);
    cmd.args(["-c:a", "aac", "-b:a", &format!("{}k", cfg.audio_bitrate_kbps)]);
    if !cfg.output_resolution.is_empty() {
        cmd.args(["-s", &cfg.output_resolution]);
    }
    cmd.args(["-f", "flv", "-loglevel", "warning", clean_feed_url]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    cmd
}

pub struct Transcoder {
    running: Arc<AtomicBool>,
    config_tx: watch::Sender<TranscoderConfig>,
    handle: tokio::task::JoinHandle<()>,
    shutdown_notify: Arc<Notify>,
}

impl Transcoder {
    pub fn start(
        encoder_path: String,
        pipe_path: String,
        clean_feed_url: String,
        initial: TranscoderConfig,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(false));
        let (config_tx, mut config_rx) = watch::channel(initial);
        let running_clone = running.clone();
        let shutdown_notify = Arc::new(Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();

        let handle = tokio::spawn(async move {
            loop {
                let cfg = config_rx.borrow_and_update().clone();
                running_clone.store(true, Ordering::Release);
                let mut child = match build_command(&encoder_path, &pipe_path, &clean_feed_url, &cfg).spawn() {
                    Ok(child) => child,
                    Err(err) => {
                        warn!(%err, "failed to spawn transcoder");
                        running_clone.store(false, Ordering::Release);
                        tokio::time::sleep(RESTART_DELAY).await;
                        continue;
                    }
                };
                let stderr = child.stderr.take();
                let stderr_task = stderr.map(|stderr| {
                    tokio::spawn(async move {
                        let mut lines = BufReader::new(stderr).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            debug!("transcoder: {line}");
                        }
                    })
                });

                tokio::select! {
                    status = child.wait() => {
                        running_clone.store(false, Ordering::Release);
                        match status {
                            Ok(status) if !status.success() => {
                                warn!(?status, "transcoder exited non-zero, restarting");
                            }
                            Err(err) => warn!(%err, "transcoder wait failed"),
                            _ => info!("transcoder exited, restarting to stay hot"),
                        }
                        if let Some(t) = stderr_task { t.abort(); }
                        tokio::time::sleep(RESTART_DELAY).await;
                    }
                    _ = config_rx.changed() => {
                        info!("transcoder config changed, restarting");
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        running_clone.store(false, Ordering::Release);
                        if let Some(t) = stderr_task { t.abort(); }
                    }
                    _ = shutdown_notify_clone.notified() => {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        running_clone.store(false, Ordering::Release);
                        if let Some(t) = stderr_task { t.abort(); }
                        break;
                    }
                }
            }
        });

        Self { running, config_tx, handle, shutdown_notify }
    }

    pub fn update_config(&self, cfg: TranscoderConfig) {
        let _ = self.config_tx.send(cfg);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Kills the live ffmpeg child itself, not just the supervising task
    /// (spec §9: the relay MUST kill all children on shutdown). `kill_on_drop`
    /// on the spawned `Command` is the backstop if the task is ever aborted
    /// before it reaches this notification.
    pub fn shutdown(&self) {
        self.shutdown_notify.notify_one();
    }
}
