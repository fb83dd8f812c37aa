//! Route table: admin CRUD, MS webhooks, and the observability surface
//! (spec §6), wrapped in CORS and a global rate limit.
//!
//! Grounded on the teacher's `apply_api_rate_limits`
//! (`middleware/rate_limit_setup.rs`) for where rate limiting attaches in
//! the router, using `tower::limit::RateLimitLayer` directly rather than
//! the teacher's Redis-backed placeholder — this control plane has no
//! multi-instance deployment to coordinate across (spec §5 assumes one
//! controller process).

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower::limit::RateLimitLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::app_state::AppState;
use crate::webhooks;

pub fn build(state: AppState) -> Router {
    // Axum's ~2 MiB default body cap would reject uploads long before
    // `admin::media::upload`'s own size check ever runs.
    let max_upload_bytes = state.config.max_media_upload_bytes;

    let cors = if state.config.dev_mode {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = state
            .config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    };

    let admin_routes = Router::new()
        .route("/channels", get(admin::channels::list).post(admin::channels::create))
        .route(
            "/channels/{id}",
            get(admin::channels::get)
                .put(admin::channels::update)
                .delete(admin::channels::delete),
        )
        .route("/channels/{id}/start", post(admin::channels::enable))
        .route("/channels/{id}/stop", post(admin::channels::disable))
        .route("/channels/{id}/restart", post(admin::channels::restart))
        .route("/channels/{id}/enable", post(admin::channels::enable))
        .route("/channels/{id}/disable", post(admin::channels::disable))
        .route("/channels/{id}/switch-to-loop", post(admin::channels::switch_to_loop))
        .route(
            "/channels/{id}/switch-to-primary",
            post(admin::channels::switch_to_primary),
        )
        .route("/destinations", post(admin::destinations::create))
        .route(
            "/destinations/{id}",
            put(admin::destinations::update).delete(admin::destinations::delete),
        )
        .route("/destinations/{id}/enable", post(admin::destinations::enable))
        .route("/destinations/{id}/disable", post(admin::destinations::disable))
        .route("/media", get(admin::media::list))
        .route("/media/upload", post(admin::media::upload))
        .route(
            "/media/{filename}",
            get(admin::media::get).delete(admin::media::delete),
        )
        .route("/config/{key}", get(admin::config::get).put(admin::config::put))
        .route("/takeover/{slug}", post(webhooks::takeover))
        .route("/active-sources", get(admin::active_sources::list))
        .route("/system/status", get(admin::system::status))
        .route("/health/services", get(admin::system::health_services))
        .route("/logs", get(admin::logs::list))
        .route("/audit-logs", get(admin::audit::list))
        .route("/users", get(admin::users::list).post(admin::users::create))
        .route(
            "/users/{id}",
            get(admin::users::get)
                .put(admin::users::update)
                .delete(admin::users::delete),
        )
        .route("/users/{id}/activate", post(admin::users::activate))
        .route("/users/{id}/deactivate", post(admin::users::deactivate))
        .route("/users/{id}/reset-password", post(admin::users::reset_password))
        .route("/users/{id}/send-reset-email", post(admin::users::send_reset_email));

    let webhook_routes = Router::new()
        .route("/on_publish", post(webhooks::on_publish))
        .route("/on_unpublish", post(webhooks::on_unpublish))
        .route("/on_connect", post(webhooks::on_connect));

    Router::new()
        .route("/login", post(admin::users::login))
        .merge(admin_routes)
        .nest("/hooks", webhook_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RateLimitLayer::new(200, Duration::from_secs(1)))
        .layer(DefaultBodyLimit::max(max_upload_bytes as usize))
        .with_state(state)
}
