//! `GET /active-sources` (spec §6): the reconciler's in-memory authority,
//! not the persisted copy — the two converge within one tick (spec §8)
//! but this endpoint intentionally reports the faster-moving value.

use axum::extract::State;
use axum::Json;

use streamguard_contracts::admin::ActiveSourceEntry;

use crate::app_state::AppState;
use crate::errors::AppResult;

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<ActiveSourceEntry>>> {
    let entries = state
        .controller
        .active_sources()
        .into_iter()
        .map(|(slug, active_source)| ActiveSourceEntry { slug, active_source })
        .collect();
    Ok(Json(entries))
}
