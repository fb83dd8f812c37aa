//! `GET/POST/PUT/DELETE /channels`, action endpoints, and destination
//! listing embedded in the channel response (spec §6).

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;

use streamguard_contracts::admin::{
    ChannelResponse, CreateChannelRequest, DestinationResponse, UpdateChannelRequest,
};
use streamguard_core::store::StoredCredentials;
use streamguard_model::audit::AuditLogEntry;
use streamguard_model::channel::{Channel, ChannelPhase};
use streamguard_model::destination::Destination;
use streamguard_model::ids::{ChannelId, OrganizationId};
use streamguard_model::source::{ChannelStatus, Source};

use crate::app_state::AppState;
use crate::auth::AdminUser;
use crate::errors::{AppError, AppResult};

async fn to_response(state: &AppState, channel: &Channel) -> AppResult<ChannelResponse> {
    let destinations = state
        .store
        .list_destinations(channel.id)
        .await?
        .into_iter()
        .map(destination_response)
        .collect();

    let snapshot = state.controller.snapshot(&channel.slug);
    let cooldown_active = snapshot
        .cooldown_started_at
        .map(|t| Utc::now() - t < chrono::Duration::seconds(channel.failover_timeout_seconds as i64))
        .unwrap_or(false);

    let phase = if !channel.enabled {
        ChannelPhase::Disabled
    } else if cooldown_active {
        ChannelPhase::Cooldown
    } else if snapshot.active_source == Some(Source::Primary) {
        ChannelPhase::PrimaryActive
    } else {
        ChannelPhase::LoopOnly
    };

    let status = if !channel.enabled {
        ChannelStatus::Down
    } else {
        match snapshot.active_source {
            Some(Source::Primary) => ChannelStatus::Live,
            Some(Source::Loop) => ChannelStatus::Loop,
            None => ChannelStatus::Down,
        }
    };

    Ok(ChannelResponse {
        id: channel.id.as_i64(),
        slug: channel.slug.clone(),
        enabled: channel.enabled,
        loop_enabled: channel.loop_enabled,
        primary_override_enabled: channel.primary_override_enabled,
        auto_restart_loop: channel.auto_restart_loop,
        failover_timeout_seconds: channel.failover_timeout_seconds,
        stability_window: channel.stability_window,
        anti_flap_cooldown_seconds: channel.anti_flap_cooldown_seconds,
        encoding: channel.encoding.clone(),
        media_path: channel.media_path.clone(),
        phase,
        active_source: snapshot.active_source,
        status,
        recv_kbps: 0,
        destinations,
        created_at: channel.created_at,
        updated_at: channel.updated_at,
    })
}

fn destination_response(d: Destination) -> DestinationResponse {
    DestinationResponse {
        id: d.id.0,
        channel_id: d.channel_id.as_i64(),
        name: d.name,
        target_url: d.target_url,
        stream_key: d.stream_key,
        enabled: d.enabled,
        status: streamguard_model::destination::DestinationStatus::Disconnected,
    }
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<ChannelResponse>>> {
    let channels = state.store.list_channels().await?;
    let mut out = Vec::with_capacity(channels.len());
    for ch in &channels {
        out.push(to_response(&state, ch).await?);
    }
    Ok(Json(out))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ChannelResponse>> {
    let channel = state
        .store
        .get_channel(ChannelId(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("channel {id} not found")))?;
    Ok(Json(to_response(&state, &channel).await?))
}

pub async fn create(
    State(state): State<AppState>,
    AdminUser(claims): AdminUser,
    Json(req): Json<CreateChannelRequest>,
) -> AppResult<Json<ChannelResponse>> {
    let now = Utc::now();
    let channel = Channel {
        id: ChannelId(next_channel_id()),
        organization_id: OrganizationId::new(),
        slug: req.slug,
        primary_token: req.primary_token.clone(),
        loop_token: req.loop_token.clone(),
        enabled: req.enabled,
        loop_enabled: req.loop_enabled,
        primary_override_enabled: req.primary_override_enabled,
        auto_restart_loop: req.auto_restart_loop,
        failover_timeout_seconds: req.failover_timeout_seconds,
        stability_window: req.stability_window,
        anti_flap_cooldown_seconds: req.anti_flap_cooldown_seconds,
        encoding: req.encoding,
        media_path: req.media_path,
        created_at: now,
        updated_at: now,
    };
    channel.validate().map_err(|e| AppError::bad_request(e.to_string()))?;

    let primary_encrypted = state.cipher.encrypt(&req.primary_token)?;
    let loop_encrypted = state.cipher.encrypt(&req.loop_token)?;
    let creds = StoredCredentials {
        primary_hash: streamguard_core::crypto::CredentialCipher::hash(&req.primary_token),
        primary_encrypted,
        loop_hash: streamguard_core::crypto::CredentialCipher::hash(&req.loop_token),
        loop_encrypted,
    };

    let created = state.store.create_channel(channel, creds).await?;
    state
        .store
        .append_audit(AuditLogEntry::new(
            "channel_created",
            "channel",
            created.slug.clone(),
            serde_json::json!({}),
            claims.sub.to_string(),
            None,
        ))
        .await?;
    Ok(Json(to_response(&state, &created).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AdminUser(claims): AdminUser,
    Json(req): Json<UpdateChannelRequest>,
) -> AppResult<Json<ChannelResponse>> {
    let mut channel = state
        .store
        .get_channel(ChannelId(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("channel {id} not found")))?;

    if let Some(v) = req.enabled {
        channel.enabled = v;
    }
    if let Some(v) = req.loop_enabled {
        channel.loop_enabled = v;
    }
    if let Some(v) = req.primary_override_enabled {
        channel.primary_override_enabled = v;
    }
    if let Some(v) = req.auto_restart_loop {
        channel.auto_restart_loop = v;
    }
    if let Some(v) = req.failover_timeout_seconds {
        channel.failover_timeout_seconds = v;
    }
    if let Some(v) = req.stability_window {
        channel.stability_window = v;
    }
    if let Some(v) = req.anti_flap_cooldown_seconds {
        channel.anti_flap_cooldown_seconds = v;
    }
    if let Some(v) = req.encoding {
        channel.encoding = v;
    }
    if let Some(v) = req.media_path {
        channel.media_path = v;
    }
    channel.updated_at = Utc::now();
    channel.validate().map_err(|e| AppError::bad_request(e.to_string()))?;

    // "Channel mutations must propagate through the reconciler next tick;
    // no endpoint directly rewrites relay config" (spec §4.5).
    let updated = state.store.update_channel(channel).await?;
    state
        .store
        .append_audit(AuditLogEntry::new(
            "channel_updated",
            "channel",
            updated.slug.clone(),
            serde_json::json!({}),
            claims.sub.to_string(),
            None,
        ))
        .await?;
    Ok(Json(to_response(&state, &updated).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AdminUser(_claims): AdminUser,
) -> AppResult<axum::http::StatusCode> {
    let channel = state.store.get_channel(ChannelId(id)).await?;
    if let Some(channel) = &channel {
        state.supervisor.stop_loop(&channel.slug).await;
        state.supervisor.stop_relay(&channel.slug).await;
        state.controller.remove_channel(&channel.slug);
    }
    state.store.delete_channel(ChannelId(id)).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn enable(state: State<AppState>, path: Path<i64>, admin: AdminUser) -> AppResult<Json<ChannelResponse>> {
    set_enabled(state, path, admin, true).await
}

pub async fn disable(state: State<AppState>, path: Path<i64>, admin: AdminUser) -> AppResult<Json<ChannelResponse>> {
    set_enabled(state, path, admin, false).await
}

async fn set_enabled(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AdminUser(claims): AdminUser,
    enabled: bool,
) -> AppResult<Json<ChannelResponse>> {
    let mut channel = state
        .store
        .get_channel(ChannelId(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("channel {id} not found")))?;
    channel.enabled = enabled;
    channel.updated_at = Utc::now();
    let updated = state.store.update_channel(channel).await?;

    if !enabled {
        // Disabled phase (spec §4.1): "ensure its loop child is stopped,
        // ensure its relay is stopped" — applied immediately rather than
        // waiting for the next tick's self-healing backstop.
        state.supervisor.stop_loop(&updated.slug).await;
        state.supervisor.stop_relay(&updated.slug).await;
    }

    state
        .store
        .append_audit(AuditLogEntry::new(
            if enabled { "channel_enabled" } else { "channel_disabled" },
            "channel",
            updated.slug.clone(),
            serde_json::json!({}),
            claims.sub.to_string(),
            None,
        ))
        .await?;
    Ok(Json(to_response(&state, &updated).await?))
}

pub async fn switch_to_loop(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AdminUser(claims): AdminUser,
) -> AppResult<Json<ChannelResponse>> {
    let channel = state
        .store
        .get_channel(ChannelId(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("channel {id} not found")))?;

    // Scenario 4 (spec §8): ActiveSource flips within this request, not
    // waiting for the next tick, and stays there until primary unpublish.
    state.controller.set_manual_loop_override(&channel.slug, true);
    state.controller.set_active_source(&channel.slug, Source::Loop);
    state.store.set_active_source(channel.id, Source::Loop).await?;
    state
        .store
        .append_audit(AuditLogEntry::new(
            "switch_to_loop",
            "channel",
            channel.slug.clone(),
            serde_json::json!({}),
            claims.sub.to_string(),
            None,
        ))
        .await?;
    Ok(Json(to_response(&state, &channel).await?))
}

pub async fn switch_to_primary(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AdminUser(claims): AdminUser,
) -> AppResult<Json<ChannelResponse>> {
    let channel = state
        .store
        .get_channel(ChannelId(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("channel {id} not found")))?;

    state.controller.set_manual_loop_override(&channel.slug, false);
    state.controller.set_active_source(&channel.slug, Source::Primary);
    state.store.set_active_source(channel.id, Source::Primary).await?;
    state
        .store
        .append_audit(AuditLogEntry::new(
            "switch_to_primary",
            "channel",
            channel.slug.clone(),
            serde_json::json!({}),
            claims.sub.to_string(),
            None,
        ))
        .await?;
    Ok(Json(to_response(&state, &channel).await?))
}

pub async fn restart(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AdminUser(_claims): AdminUser,
) -> AppResult<Json<ChannelResponse>> {
    let channel = state
        .store
        .get_channel(ChannelId(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("channel {id} not found")))?;
    state.supervisor.stop_loop(&channel.slug).await;
    state.supervisor.stop_relay(&channel.slug).await;
    Ok(Json(to_response(&state, &channel).await?))
}

fn next_channel_id() -> i64 {
    use std::sync::atomic::{AtomicI64, Ordering};
    static COUNTER: AtomicI64 = AtomicI64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}
