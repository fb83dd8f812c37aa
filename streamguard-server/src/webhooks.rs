//! MS publish/unpublish/connect webhooks and the operator-initiated
//! takeover endpoint (spec §4.5).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use streamguard_contracts::ms::{MsWebhookAction, MsWebhookPayload};
use streamguard_contracts::webhook::{MsWebhookDecision, TakeoverResponse};
use streamguard_core::crypto::CredentialCipher;
use streamguard_model::audit::AuditLogEntry;
use streamguard_model::channel::Channel;
use streamguard_model::source::Source;

use crate::app_state::AppState;
use crate::errors::AppResult;

/// Stream-name resolution (spec §4.5): by slug, by `slug-primary`, or by
/// the primary token used as the path (operator misconfiguration
/// fallback).
async fn resolve_channel(state: &AppState, stream: &str) -> Option<(Channel, bool)> {
    if let Some(slug) = stream.strip_suffix("-primary") {
        if let Ok(Some(ch)) = state.store.get_channel_by_slug(slug).await {
            return Some((ch, true));
        }
    }
    if let Ok(Some(ch)) = state.store.get_channel_by_slug(stream).await {
        return Some((ch, false));
    }
    // Token-as-slug fallback: an operator pointed their ingest software at
    // the raw primary token instead of `{slug}-primary`.
    let hash = CredentialCipher::hash(stream);
    if let Ok(Some(ch)) = state.store.find_channel_by_credential_hash(&hash).await {
        return Some((ch, true));
    }
    None
}

pub async fn on_publish(
    State(state): State<AppState>,
    Json(payload): Json<MsWebhookPayload>,
) -> (StatusCode, String) {
    handle_publish(&state, &payload).await.unwrap_or_else(reject)
}

async fn handle_publish(state: &AppState, payload: &MsWebhookPayload) -> Option<(StatusCode, String)> {
    debug_assert_eq!(payload.action, MsWebhookAction::OnPublish);
    let (channel, is_primary) = resolve_channel(state, &payload.stream).await?;

    let hash = CredentialCipher::hash(&payload.param);
    let expected_hash = if is_primary {
        CredentialCipher::hash(&channel.primary_token)
    } else {
        CredentialCipher::hash(&channel.loop_token)
    };
    // "if the stream is a primary stream, only the primary token matches"
    // (spec §4.5) — the loop publisher must never be admitted as primary.
    if hash != expected_hash {
        return None;
    }

    if is_primary {
        state.supervisor.stop_loop(&channel.slug).await;
        state.controller.start_cooldown(&channel.slug, chrono::Utc::now());
        state.controller.set_active_source(&channel.slug, Source::Primary);
        let _ = state.store.set_active_source(channel.id, Source::Primary).await;
        let _ = state
            .store
            .append_audit(AuditLogEntry::new(
                "primary_publish",
                "channel",
                channel.slug.clone(),
                serde_json::json!({ "ip": payload.ip }),
                "ms_webhook",
                payload.ip.clone(),
            ))
            .await;
    }

    Some((StatusCode::OK, MsWebhookDecision::Accept.as_body().to_string()))
}

pub async fn on_unpublish(
    State(state): State<AppState>,
    Json(payload): Json<MsWebhookPayload>,
) -> (StatusCode, String) {
    if let Some((channel, is_primary)) = resolve_channel(&state, &payload.stream).await {
        let expected_hash = CredentialCipher::hash(&channel.primary_token);
        let hash = CredentialCipher::hash(&payload.param);
        if is_primary && hash == expected_hash {
            state.controller.clear_cooldown(&channel.slug);
            state.controller.set_active_source(&channel.slug, Source::Loop);
            let _ = state.store.set_active_source(channel.id, Source::Loop).await;
            let _ = state
                .store
                .append_audit(AuditLogEntry::new(
                    "primary_unpublish",
                    "channel",
                    channel.slug.clone(),
                    serde_json::json!({ "ip": payload.ip }),
                    "ms_webhook",
                    payload.ip.clone(),
                ))
                .await;
        }
    }
    (StatusCode::OK, MsWebhookDecision::Accept.as_body().to_string())
}

pub async fn on_connect(
    State(_state): State<AppState>,
    Json(_payload): Json<MsWebhookPayload>,
) -> (StatusCode, String) {
    // No admission policy beyond publish/unpublish (spec §4.5 only
    // describes behavior for those two hooks); accept unconditionally.
    (StatusCode::OK, MsWebhookDecision::Accept.as_body().to_string())
}

fn reject() -> (StatusCode, String) {
    (StatusCode::OK, MsWebhookDecision::Reject.as_body().to_string())
}

pub async fn takeover(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<TakeoverResponse>> {
    let channel = state
        .store
        .get_channel_by_slug(&slug)
        .await?
        .ok_or_else(|| crate::errors::AppError::not_found(format!("channel {slug} not found")))?;

    state.supervisor.stop_loop(&channel.slug).await;
    state.controller.start_cooldown(&channel.slug, chrono::Utc::now());
    state.controller.set_active_source(&channel.slug, Source::Primary);
    state.store.set_active_source(channel.id, Source::Primary).await?;
    state
        .store
        .append_audit(AuditLogEntry::new(
            "takeover",
            "channel",
            channel.slug.clone(),
            serde_json::json!({}),
            "admin",
            None,
        ))
        .await?;

    let primary_url = format!(
        "{}/app/{}?token={}",
        state.config.ms_api_url,
        channel.primary_stream_name(),
        channel.primary_token
    );
    Ok(Json(TakeoverResponse { primary_url }))
}
