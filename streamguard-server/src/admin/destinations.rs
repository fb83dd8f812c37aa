//! `POST /destinations`, `PUT|DELETE /destinations/{id}`, enable/disable
//! (spec §6). Listing is embedded in the channel response.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use streamguard_contracts::admin::{CreateDestinationRequest, DestinationResponse, UpdateDestinationRequest};
use streamguard_model::destination::{Destination, DestinationStatus};
use streamguard_model::ids::{ChannelId, DestinationId};

use crate::app_state::AppState;
use crate::auth::AdminUser;
use crate::errors::{AppError, AppResult};

fn to_response(d: Destination) -> DestinationResponse {
    DestinationResponse {
        id: d.id.0,
        channel_id: d.channel_id.as_i64(),
        name: d.name,
        target_url: d.target_url,
        stream_key: d.stream_key,
        enabled: d.enabled,
        status: DestinationStatus::Disconnected,
    }
}

pub async fn create(
    State(state): State<AppState>,
    AdminUser(_claims): AdminUser,
    Json(req): Json<CreateDestinationRequest>,
) -> AppResult<Json<DestinationResponse>> {
    state
        .store
        .get_channel(ChannelId(req.channel_id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("channel {} not found", req.channel_id)))?;

    let destination = Destination {
        id: DestinationId::new(),
        channel_id: ChannelId(req.channel_id),
        name: req.name,
        target_url: req.target_url,
        stream_key: req.stream_key,
        enabled: req.enabled,
    };
    destination
        .validate()
        .map_err(|e| AppError::bad_request(e.to_string()))?;
    let created = state.store.create_destination(destination).await?;
    Ok(Json(to_response(created)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    AdminUser(_claims): AdminUser,
    Json(req): Json<UpdateDestinationRequest>,
) -> AppResult<Json<DestinationResponse>> {
    let mut destination = state
        .store
        .get_destination(DestinationId(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("destination {id} not found")))?;

    if let Some(v) = req.name {
        destination.name = v;
    }
    if let Some(v) = req.target_url {
        destination.target_url = v;
    }
    if req.stream_key.is_some() {
        destination.stream_key = req.stream_key;
    }
    if let Some(v) = req.enabled {
        destination.enabled = v;
    }
    destination
        .validate()
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    let updated = state.store.update_destination(destination).await?;
    Ok(Json(to_response(updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    AdminUser(_claims): AdminUser,
) -> AppResult<StatusCode> {
    state.store.delete_destination(DestinationId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn enable(state: State<AppState>, path: Path<uuid::Uuid>, admin: AdminUser) -> AppResult<Json<DestinationResponse>> {
    set_enabled(state, path, admin, true).await
}

pub async fn disable(state: State<AppState>, path: Path<uuid::Uuid>, admin: AdminUser) -> AppResult<Json<DestinationResponse>> {
    set_enabled(state, path, admin, false).await
}

async fn set_enabled(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    AdminUser(_claims): AdminUser,
    enabled: bool,
) -> AppResult<Json<DestinationResponse>> {
    let mut destination = state
        .store
        .get_destination(DestinationId(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("destination {id} not found")))?;
    destination.enabled = enabled;
    let updated = state.store.update_destination(destination).await?;
    Ok(Json(to_response(updated)))
}
