//! The tick loop: the I/O shell around `streamguard_core::reconcile`
//! (spec §4.1).
//!
//! Grounded on the teacher's `WorkerPool` run-loop shape
//! (`stream/transcoding/worker.rs`): a `tokio::spawn`ed task on a fixed
//! interval, `#[instrument]`ed per iteration, that never lets one
//! channel's failure abort the tick for the others.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};

use streamguard_contracts::relay::{RelayDestination, RelayUpdateRequest};
use streamguard_core::reconcile::{
    reconcile_channel, resolve_current_source, ReconcilerConfig, THRESHOLD_KBPS,
};
use streamguard_model::audit::AuditLogEntry;
use streamguard_model::health::ObservedStream;
use streamguard_model::log_buffer::LogLevel;
use streamguard_model::source::Source;

use crate::app_state::{AppState, TickStats};
use crate::relay_client::RelayClient;
use crate::supervisor::relay_config_hash;

pub async fn run(state: AppState) {
    let relay_client = match RelayClient::new(state.config.relay_request_timeout) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "failed to build relay client, reconciler cannot start");
            return;
        }
    };

    let mut interval = tokio::time::interval(state.config.reconcile_interval);
    loop {
        interval.tick().await;
        tick(&state, &relay_client).await;
    }
}

/// One reconciliation pass over every channel. `pub` so integration tests
/// can drive it directly against a `MemoryStore`-backed `AppState` without
/// waiting on the fixed-interval `run` loop.
#[instrument(skip(state, relay_client))]
pub async fn tick(state: &AppState, relay_client: &RelayClient) {
    let start = Instant::now();

    let channels = match state.store.list_channels().await {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "failed to list channels, skipping tick");
            return;
        }
    };

    // MS unreachable: every stream is treated as not publishing (spec
    // §4.1), rather than aborting the whole tick.
    let streams = state
        .ms_client
        .fetch_streams()
        .await
        .map(|r| r.by_name())
        .unwrap_or_default();

    let mut enabled_count = 0usize;
    for channel in &channels {
        if !channel.enabled {
            // Disabled phase (spec §4.1): "ensure its loop child is
            // stopped, ensure its relay is stopped". `admin::channels::
            // set_enabled` already does this the moment an operator
            // flips the flag; repeating it every tick is a self-healing
            // backstop so a disabled channel can never end up with a
            // stray child running, regardless of how it got disabled.
            state.supervisor.stop_loop(&channel.slug).await;
            state.supervisor.stop_relay(&channel.slug).await;
            continue;
        }
        enabled_count += 1;

        // Primary stream-name resolution (spec §4.1): prefer `slug-primary`;
        // fall back to the raw primary token as the path, mirroring the
        // fallback `webhooks::resolve_channel` already applies on publish
        // admission, so a channel admitted via the token-as-path
        // convention doesn't permanently read as down on every tick.
        let primary_observed = streams
            .get(&channel.primary_stream_name())
            .or_else(|| streams.get(&channel.primary_token))
            .map(|s| ObservedStream {
                publishing: s.publish.active,
                recv_kbps: s.kbps.recv_30s,
                width: s.video.width,
                height: s.video.height,
            })
            .unwrap_or_default();
        let loop_observed = streams
            .get(channel.loop_stream_name())
            .map(|s| ObservedStream {
                publishing: s.publish.active,
                recv_kbps: s.kbps.recv_30s,
                width: s.video.width,
                height: s.video.height,
            })
            .unwrap_or_default();

        let primary_up = primary_observed.primary_up(THRESHOLD_KBPS);
        let loop_up = loop_observed.loop_up();

        state
            .controller
            .push_health(&channel.slug, channel.stability_window, primary_up, loop_up);
        let _ = state
            .store
            .record_health_sample(channel.id, "primary", primary_up, primary_observed.recv_kbps)
            .await;
        let _ = state
            .store
            .record_health_sample(channel.id, "loop", loop_up, loop_observed.recv_kbps)
            .await;

        let snapshot = state.controller.snapshot(&channel.slug);
        let store_source = state
            .store
            .get_active_source(channel.id)
            .await
            .ok()
            .flatten();
        let (current_source, needs_correction) =
            resolve_current_source(snapshot.active_source, store_source);
        if needs_correction {
            state.controller.set_active_source(&channel.slug, current_source);
        }

        let decision = reconcile_channel(
            channel,
            primary_up,
            loop_up,
            current_source,
            snapshot.manual_loop_override,
            snapshot.cooldown_started_at,
            Utc::now(),
            snapshot.primary_stable_up,
            snapshot.primary_stable_down,
            ReconcilerConfig {
                primary_preempt_requires_stability: state.config.primary_preempt_requires_stability,
            },
        );

        if decision.emit_primary_down_watchdog {
            warn!(
                slug = %channel.slug,
                "primary has been down for a full stability window while logical source is PRIMARY \
                 (no unpublish webhook observed); data plane is on loop, logical source unchanged"
            );
            let _ = state
                .store
                .append_audit(AuditLogEntry::new(
                    "primary_down_watchdog",
                    "channel",
                    channel.slug.clone(),
                    serde_json::json!({}),
                    "reconciler",
                    None,
                ))
                .await;
        }

        if decision.clear_manual_override {
            state.controller.set_manual_loop_override(&channel.slug, false);
        }

        if decision.source_changed {
            state.controller.set_active_source(&channel.slug, decision.next_source);
            if let Err(e) = state.store.set_active_source(channel.id, decision.next_source).await {
                warn!(slug = %channel.slug, error = %e, "failed to persist active source");
            }
        }

        if decision.emit_auto_switch_audit {
            let _ = state
                .store
                .append_audit(AuditLogEntry::new(
                    "auto_switch_to_primary",
                    "channel",
                    channel.slug.clone(),
                    serde_json::json!({ "from": current_source.as_str(), "to": decision.next_source.as_str() }),
                    "reconciler",
                    None,
                ))
                .await;
            state.log_buffer.lock().unwrap().push(
                LogLevel::Info,
                "reconciler",
                format!("{} auto-switched to PRIMARY", channel.slug),
            );
        }

        if decision.start_loop_child {
            if let Err(e) = state.supervisor.ensure_loop_running(channel).await {
                warn!(slug = %channel.slug, error = %e, "failed to ensure loop child running");
            }
        } else {
            state.supervisor.stop_loop(&channel.slug).await;
        }

        if !decision.start_relay {
            continue;
        }

        let destinations = state
            .store
            .list_destinations(channel.id)
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|d| d.enabled)
            .collect::<Vec<_>>();

        let dest_ids: Vec<String> = destinations.iter().map(|d| d.id.to_string()).collect();
        let config_hash = relay_config_hash(
            dest_ids.clone(),
            channel.encoding.effective_video_bitrate_kbps(),
            channel.encoding.keyframe_interval_seconds,
            channel.encoding.audio_bitrate_kbps,
            &channel.encoding.output_resolution,
            decision.next_source.as_str(),
        );

        let source_url = match decision.next_source {
            Source::Primary => format!(
                "{}/app/{}?token={}",
                state.config.ms_api_url,
                channel.primary_stream_name(),
                channel.primary_token
            ),
            Source::Loop => format!(
                "{}/app/{}?token={}",
                state.config.ms_api_url,
                channel.loop_stream_name(),
                channel.loop_token
            ),
        };

        let outcome = match state
            .supervisor
            .ensure_relay_running(channel, &config_hash, &source_url)
            .await
        {
            Ok(o) => o,
            Err(e) => {
                warn!(slug = %channel.slug, error = %e, "failed to ensure relay running");
                continue;
            }
        };

        if outcome.created || outcome.needs_update {
            let update = RelayUpdateRequest {
                source_url,
                source: decision.next_source,
                destinations: destinations
                    .iter()
                    .map(|d| RelayDestination {
                        id: d.id.to_string(),
                        url: d.full_url(),
                    })
                    .collect(),
                video_bitrate_kbps: channel.encoding.effective_video_bitrate_kbps(),
                audio_bitrate_kbps: channel.encoding.audio_bitrate_kbps,
                keyframe_interval_seconds: channel.encoding.keyframe_interval_seconds,
            };
            // A failed POST just logs; the relay's own `/update` idempotency
            // check means the next tick's identical payload is harmless to
            // resend even once the config_hash has already been recorded.
            if let Err(e) = relay_client.update(outcome.port, &update).await {
                warn!(slug = %channel.slug, error = %e, "relay update failed, will retry next tick");
            }
        }
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    *state.tick_stats.lock().unwrap() = Some(TickStats {
        at: Utc::now(),
        duration_ms,
    });
    info!(channels = channels.len(), enabled = enabled_count, duration_ms, "tick complete");
}
