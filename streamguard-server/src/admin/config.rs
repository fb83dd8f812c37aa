//! `GET|PUT /config` (spec §4.2, §6): untyped JSON blobs keyed by one of
//! the enumerated [`streamguard_model::config_entry::ConfigKey`] values.

use axum::extract::{Path, State};
use axum::Json;

use streamguard_contracts::admin::{ConfigEntryResponse, PutConfigRequest};
use streamguard_model::config_entry::{ConfigKey, SystemConfigEntry};

use crate::app_state::AppState;
use crate::auth::AdminUser;
use crate::errors::{AppError, AppResult};

pub async fn get(
    State(state): State<AppState>,
    Path(key): Path<String>,
    AdminUser(_claims): AdminUser,
) -> AppResult<Json<ConfigEntryResponse>> {
    ConfigKey::from_str(&key).ok_or_else(|| AppError::bad_request(format!("unknown config key {key:?}")))?;
    let entry = state
        .store
        .get_config(&key)
        .await?
        .unwrap_or(SystemConfigEntry { key, value: serde_json::json!({}) });
    Ok(Json(ConfigEntryResponse {
        key: entry.key,
        value: entry.value,
    }))
}

pub async fn put(
    State(state): State<AppState>,
    Path(key): Path<String>,
    AdminUser(_claims): AdminUser,
    Json(req): Json<PutConfigRequest>,
) -> AppResult<Json<ConfigEntryResponse>> {
    ConfigKey::from_str(&key).ok_or_else(|| AppError::bad_request(format!("unknown config key {key:?}")))?;
    let entry = state
        .store
        .put_config(SystemConfigEntry { key, value: req.value })
        .await?;
    Ok(Json(ConfigEntryResponse {
        key: entry.key,
        value: entry.value,
    }))
}
