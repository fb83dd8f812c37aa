//! Process lifecycle for the two child classes per channel: `loop-{slug}`
//! and `relay-{slug}` (spec §4.3).
//!
//! Grounded on the teacher's `WorkerPool`/`run_ffmpeg_command`
//! (`stream/transcoding/worker.rs`) for the spawn/label/restart shape;
//! SPEC_FULL §4.3 resolves the "container/process runtime" collaborator
//! as `tokio::process::Command` launching the configurable `LOOP_IMAGE`/
//! `RELAY_IMAGE` binaries, with an in-process `DashMap` registry standing
//! in for labels OS processes don't carry natively.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::process::Stdio;
use std::time::Instant;

use dashmap::DashMap;
use streamguard_model::channel::Channel;
use tokio::process::{Child, Command};
use tracing::{info, warn};

const MAX_RESTARTS: u32 = 5;
const RESOURCE_MEM_BYTES: u64 = 1024 * 1024 * 1024;
const RESOURCE_CPUS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Loop,
    Relay,
}

/// Labels carried alongside each managed child (spec §4.3: `managed_by`,
/// `channel`, and, for relays, `config_hash`).
struct ManagedChild {
    child: Child,
    kind: ChildKind,
    channel_slug: String,
    config_hash: Option<String>,
    image: String,
    restart_count: u32,
    started_at: Instant,
    pub relay_port: Option<u16>,
}

fn child_key(kind: ChildKind, slug: &str) -> String {
    match kind {
        ChildKind::Loop => format!("loop-{slug}"),
        ChildKind::Relay => format!("relay-{slug}"),
    }
}

/// `config_hash = digest(sorted(dest_ids) | video_bitrate | keyframe |
/// audio_bitrate | resolution | current_source)` (spec §4.3).
pub fn relay_config_hash(
    mut dest_ids: Vec<String>,
    video_bitrate_kbps: u32,
    keyframe_interval_seconds: u32,
    audio_bitrate_kbps: u32,
    output_resolution: &str,
    current_source: &str,
) -> String {
    dest_ids.sort();
    let mut hasher = DefaultHasher::new();
    dest_ids.hash(&mut hasher);
    video_bitrate_kbps.hash(&mut hasher);
    keyframe_interval_seconds.hash(&mut hasher);
    audio_bitrate_kbps.hash(&mut hasher);
    output_resolution.hash(&mut hasher);
    current_source.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Deterministic relay control-port allocation so the reconciler can
/// reach a relay it didn't just create (e.g. after its own restart).
pub fn relay_port_for(channel_id: i64) -> u16 {
    8080 + (channel_id.rem_euclid(1000) as u16)
}

pub struct SupervisorConfig {
    pub loop_image: String,
    pub relay_image: String,
    pub ms_api_url: String,
    pub media_path: String,
}

/// Manages all supervised children for the process. All `EnsureX`
/// operations are idempotent (spec §4.3: "calling EnsureX repeatedly ...
/// converges to the same state without side-effects on the second call").
pub struct Supervisor {
    children: DashMap<String, ManagedChild>,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            children: DashMap::new(),
            config,
        }
    }

    fn is_running(child: &mut Child) -> bool {
        matches!(child.try_wait(), Ok(None))
    }

    /// `EnsureLoopRunning` (spec §4.3).
    pub async fn ensure_loop_running(&self, channel: &Channel) -> anyhow::Result<()> {
        let key = child_key(ChildKind::Loop, &channel.slug);

        if let Some(mut entry) = self.children.get_mut(&key) {
            if Self::is_running(&mut entry.child) {
                return Ok(());
            }
            if entry.restart_count >= MAX_RESTARTS {
                warn!(slug = %channel.slug, "loop child exceeded max restarts, leaving stopped");
                return Ok(());
            }
        }
        // No running instance: remove any stale entry and (re)create,
        // carrying its restart_count forward so MAX_RESTARTS is actually
        // bounded across respawns, not reset by every recreate.
        let restart_count = if let Some((_, mut stale)) = self.children.remove(&key) {
            let _ = stale.child.start_kill();
            stale.restart_count + 1
        } else {
            0
        };

        let target_url = format!(
            "{}/app/{}?token={}",
            self.config.ms_api_url, channel.slug, channel.loop_token
        );
        let source_path = format!("{}/{}", self.config.media_path, channel.media_path);

        let spawn_once = |cmd_path: &str| -> anyhow::Result<Child> {
            let mut cmd = Command::new(cmd_path);
            cmd.env("TARGET_URL", &target_url)
                .env("SOURCE_PATH", &source_path)
                .env("KEYFRAME_INTERVAL_SECONDS", channel.encoding.keyframe_interval_seconds.to_string())
                .env("VIDEO_BITRATE_KBPS", channel.encoding.effective_video_bitrate_kbps().to_string())
                .env("AUDIO_BITRATE_KBPS", channel.encoding.audio_bitrate_kbps.to_string())
                .env("OUTPUT_RESOLUTION", &channel.encoding.output_resolution)
                .env("MEM_LIMIT_BYTES", RESOURCE_MEM_BYTES.to_string())
                .env("CPU_LIMIT", RESOURCE_CPUS.to_string())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped());
            Ok(cmd.spawn()?)
        };

        // "Conflict on create triggers a single force-remove + retry" (spec §4.3).
        let child = match spawn_once(&self.config.loop_image) {
            Ok(child) => child,
            Err(first_err) => {
                warn!(slug = %channel.slug, error = %first_err, "loop child create conflict, retrying once");
                spawn_once(&self.config.loop_image)?
            }
        };

        info!(slug = %channel.slug, "loop child started");
        self.children.insert(
            key,
            ManagedChild {
                child,
                kind: ChildKind::Loop,
                channel_slug: channel.slug.clone(),
                config_hash: None,
                image: self.config.loop_image.clone(),
                restart_count,
                started_at: Instant::now(),
                relay_port: None,
            },
        );
        Ok(())
    }

    pub async fn stop_loop(&self, slug: &str) {
        let key = child_key(ChildKind::Loop, slug);
        if let Some((_, mut entry)) = self.children.remove(&key) {
            let _ = entry.child.start_kill();
            info!(slug, "loop child stopped");
        }
    }

    pub fn loop_running(&self, slug: &str) -> bool {
        let key = child_key(ChildKind::Loop, slug);
        self.children
            .get_mut(&key)
            .map(|mut e| Self::is_running(&mut e.child))
            .unwrap_or(false)
    }

    /// `EnsureRelayRunning` (spec §4.3). Returns the relay's control port
    /// and whether a reconfiguration is needed (caller posts `/update`).
    pub async fn ensure_relay_running(
        &self,
        channel: &Channel,
        config_hash: &str,
        source_url: &str,
    ) -> anyhow::Result<RelayEnsureOutcome> {
        let key = child_key(ChildKind::Relay, &channel.slug);
        let port = relay_port_for(channel.id.as_i64());

        if let Some(mut entry) = self.children.get_mut(&key) {
            let running = Self::is_running(&mut entry.child);
            if running && entry.image == self.config.relay_image {
                let needs_update = entry.config_hash.as_deref() != Some(config_hash);
                if needs_update {
                    entry.config_hash = Some(config_hash.to_string());
                }
                return Ok(RelayEnsureOutcome {
                    created: false,
                    needs_update,
                    port,
                });
            }
            // Stale image label or dead process: destroy and recreate
            // (spec §4.3: "upgrade path").
            drop(entry);
            if let Some((_, mut stale)) = self.children.remove(&key) {
                let _ = stale.child.start_kill();
            }
        }

        let mut cmd = Command::new(&self.config.relay_image);
        cmd.env("CHANNEL_SLUG", &channel.slug)
            .env("MS_API_URL", &self.config.ms_api_url)
            .env("RELAY_PORT", port.to_string())
            .env(
                "LOOP_SOURCE_URL",
                format!("{}/app/{}", self.config.ms_api_url, channel.slug),
            )
            .env(
                "MEDIA_PATH",
                &self.config.media_path,
            )
            .env("MEM_LIMIT_BYTES", RESOURCE_MEM_BYTES.to_string())
            .env("CPU_LIMIT", RESOURCE_CPUS.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        let _ = source_url;
        let child = cmd.spawn()?;

        info!(slug = %channel.slug, port, "relay child started");
        self.children.insert(
            key,
            ManagedChild {
                child,
                kind: ChildKind::Relay,
                channel_slug: channel.slug.clone(),
                config_hash: Some(config_hash.to_string()),
                image: self.config.relay_image.clone(),
                restart_count: 0,
                started_at: Instant::now(),
                relay_port: Some(port),
            },
        );
        Ok(RelayEnsureOutcome {
            created: true,
            needs_update: false,
            port,
        })
    }

    pub async fn stop_relay(&self, slug: &str) {
        let key = child_key(ChildKind::Relay, slug);
        if let Some((_, mut entry)) = self.children.remove(&key) {
            let _ = entry.child.start_kill();
            info!(slug, "relay child stopped");
        }
    }

    pub fn relay_port(&self, slug: &str) -> Option<u16> {
        let key = child_key(ChildKind::Relay, slug);
        self.children.get(&key).and_then(|e| e.relay_port)
    }

    /// Graceful teardown: kill every managed child (spec §5: "Graceful
    /// shutdown ... kills all supervised children").
    pub async fn shutdown_all(&self) {
        let keys: Vec<String> = self.children.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, mut entry)) = self.children.remove(&key) {
                let _ = entry.child.start_kill();
            }
        }
    }

    pub fn running_child_count(&self, kind: ChildKind, slug: &str) -> usize {
        let key = child_key(kind, slug);
        match self.children.get_mut(&key) {
            Some(mut entry) if Self::is_running(&mut entry.child) => 1,
            _ => 0,
        }
    }
}

pub struct RelayEnsureOutcome {
    pub created: bool,
    pub needs_update: bool,
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_hash_is_order_independent_in_destinations() {
        let a = relay_config_hash(
            vec!["b".into(), "a".into()],
            4500,
            2,
            128,
            "",
            "PRIMARY",
        );
        let b = relay_config_hash(
            vec!["a".into(), "b".into()],
            4500,
            2,
            128,
            "",
            "PRIMARY",
        );
        assert_eq!(a, b);
    }

    #[test]
    fn config_hash_changes_with_source() {
        let a = relay_config_hash(vec!["a".into()], 4500, 2, 128, "", "PRIMARY");
        let b = relay_config_hash(vec!["a".into()], 4500, 2, 128, "", "LOOP");
        assert_ne!(a, b);
    }

    #[test]
    fn relay_port_is_deterministic() {
        assert_eq!(relay_port_for(1), relay_port_for(1));
        assert_ne!(relay_port_for(1), relay_port_for(2));
    }

    fn sample_channel() -> Channel {
        Channel {
            id: streamguard_model::ids::ChannelId(1),
            organization_id: streamguard_model::ids::OrganizationId::new(),
            slug: "alpha".into(),
            primary_token: "primary".into(),
            loop_token: "looptok".into(),
            enabled: true,
            loop_enabled: true,
            primary_override_enabled: true,
            auto_restart_loop: true,
            failover_timeout_seconds: 10,
            stability_window: 3,
            anti_flap_cooldown_seconds: 15,
            encoding: streamguard_model::channel::EncodingProfile::default(),
            media_path: "alpha.mp4".into(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    /// A dead loop child must not reset `restart_count` back to zero on
    /// every respawn, or `MAX_RESTARTS` (spec §4.3 "bounded retry (max 5)")
    /// never actually bounds anything.
    #[tokio::test]
    async fn loop_restart_count_survives_respawn_and_eventually_bounds() {
        let supervisor = Supervisor::new(SupervisorConfig {
            loop_image: "true".into(),
            relay_image: "true".into(),
            ms_api_url: "http://ms.local".into(),
            media_path: "/media".into(),
        });
        let channel = sample_channel();

        for expected in 0..=MAX_RESTARTS {
            supervisor.ensure_loop_running(&channel).await.unwrap();
            // Give the spawned `true` process time to exit immediately.
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            let key = child_key(ChildKind::Loop, &channel.slug);
            let count = supervisor
                .children
                .get(&key)
                .map(|e| e.restart_count)
                .unwrap_or(u32::MAX);
            assert_eq!(count, expected, "restart_count after iteration {expected}");
        }

        // One more call past MAX_RESTARTS must leave the dead entry in
        // place rather than respawning again.
        supervisor.ensure_loop_running(&channel).await.unwrap();
        let key = child_key(ChildKind::Loop, &channel.slug);
        assert_eq!(
            supervisor.children.get(&key).map(|e| e.restart_count),
            Some(MAX_RESTARTS)
        );
    }
}
