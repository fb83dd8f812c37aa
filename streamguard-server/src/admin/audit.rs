//! `GET /audit-logs` (spec §6).

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use streamguard_contracts::admin::AuditLogResponse;

use crate::app_state::AppState;
use crate::errors::AppResult;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    200
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<Vec<AuditLogResponse>>> {
    let entries = state.store.list_audit(query.limit).await?;
    Ok(Json(
        entries
            .into_iter()
            .map(|e| AuditLogResponse {
                id: e.id,
                action: e.action,
                resource_type: e.resource_type,
                resource_id: e.resource_id,
                details: e.details,
                actor: e.actor,
                ip: e.ip,
                timestamp: e.timestamp,
            })
            .collect(),
    ))
}
