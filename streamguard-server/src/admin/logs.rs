//! `GET /logs?level&limit` (spec §3, §6): reads the process-wide ring
//! buffer.

use axum::extract::{Query, State};
use axum::Json;

use streamguard_contracts::admin::{LogEntryResponse, LogsQuery};
use streamguard_model::log_buffer::LogLevel;

use crate::app_state::AppState;
use crate::errors::{AppError, AppResult};

fn parse_level(s: &str) -> AppResult<LogLevel> {
    match s {
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        other => Err(AppError::bad_request(format!("unknown log level {other:?}"))),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> AppResult<Json<Vec<LogEntryResponse>>> {
    let level = query.level.as_deref().map(parse_level).transpose()?;
    let entries = state.log_buffer.lock().unwrap().recent(level, query.limit);
    Ok(Json(
        entries
            .into_iter()
            .map(|e| LogEntryResponse {
                id: e.id,
                timestamp: e.timestamp,
                level: e.level.as_str().to_string(),
                component: e.component,
                message: e.message,
            })
            .collect(),
    ))
}
