//! The relay's control API: `POST /update`, `GET /status` (spec §4.4).

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use streamguard_contracts::relay::{RelayStatusResponse, RelayUpdateRequest};

use crate::state::RelayState;

pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/update", post(update))
        .route("/status", get(status))
        .with_state(state)
}

async fn update(State(state): State<Arc<RelayState>>, Json(req): Json<RelayUpdateRequest>) {
    state.apply_update(req).await;
}

async fn status(State(state): State<Arc<RelayState>>) -> Json<RelayStatusResponse> {
    Json(state.status().await)
}
