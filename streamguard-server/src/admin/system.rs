//! `GET /system/status`, `GET /health/services` (spec §6): read-only
//! observability over reconciler state.

use axum::extract::State;
use axum::Json;

use streamguard_contracts::admin::{ServiceHealthEntry, ServiceHealthResponse, SystemStatusResponse};
use streamguard_model::source::ChannelStatus;

use crate::app_state::AppState;
use crate::errors::AppResult;

pub async fn status(State(state): State<AppState>) -> AppResult<Json<SystemStatusResponse>> {
    let channels = state.store.list_channels().await?;
    let tick = state.tick_stats.lock().unwrap().clone();
    Ok(Json(SystemStatusResponse {
        channel_count: channels.len(),
        enabled_channel_count: channels.iter().filter(|c| c.enabled).count(),
        last_tick_at: tick.as_ref().map(|t| t.at),
        last_tick_duration_ms: tick.as_ref().map(|t| t.duration_ms),
    }))
}

pub async fn health_services(State(state): State<AppState>) -> AppResult<Json<ServiceHealthResponse>> {
    let channels = state.store.list_channels().await?;
    let mut services = Vec::with_capacity(channels.len());
    for channel in &channels {
        let snapshot = state.controller.snapshot(&channel.slug);
        let status = if !channel.enabled {
            ChannelStatus::Down
        } else {
            match snapshot.active_source {
                Some(streamguard_model::source::Source::Primary) => ChannelStatus::Live,
                Some(streamguard_model::source::Source::Loop) => ChannelStatus::Loop,
                None => ChannelStatus::Down,
            }
        };
        let destinations = state.store.list_destinations(channel.id).await.unwrap_or_default();
        let destinations_total = destinations.iter().filter(|d| d.enabled).count();
        let destinations_connected = destinations
            .iter()
            .filter(|d| d.enabled)
            .filter(|d| state.supervisor.relay_port(&channel.slug).is_some())
            .count();
        services.push(ServiceHealthEntry {
            slug: channel.slug.clone(),
            status,
            active_source: snapshot.active_source,
            destinations_connected,
            destinations_total,
        });
    }
    Ok(Json(ServiceHealthResponse { services }))
}
