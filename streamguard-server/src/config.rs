//! Server configuration loaded from the environment (spec §9).
//!
//! Grounded on the teacher's `infra::config::Config::from_env`
//! (`ferrex-server/src/infra/config.rs`): plain env-var reads with
//! defaults, gathered once at startup via `dotenvy`.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,

    pub database_url: Option<String>,

    pub ms_api_url: String,
    pub ms_request_timeout: Duration,
    pub relay_request_timeout: Duration,

    pub loop_image: String,
    pub relay_image: String,
    pub media_root: String,

    pub reconcile_interval: Duration,
    /// Opt-in, system-wide (spec §9 Open Question): require
    /// `HealthHistory::stable_up()` for the primary ingress before
    /// auto-preemption, instead of the single-sample `primary_up`.
    /// Defaults to `false` to preserve the documented behavior.
    pub primary_preempt_requires_stability: bool,

    pub cors_allowed_origins: Vec<String>,
    pub dev_mode: bool,

    pub jwt_secret: String,
    pub jwt_expiry: Duration,
    pub encryption_key_hex: String,

    pub max_media_upload_bytes: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            database_url: env::var("DATABASE_URL").ok(),

            ms_api_url: env::var("MS_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:1985".to_string()),
            ms_request_timeout: Duration::from_millis(
                env::var("MS_REQUEST_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2_000),
            ),
            relay_request_timeout: Duration::from_millis(
                env::var("RELAY_REQUEST_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2_000),
            ),

            loop_image: env::var("LOOP_IMAGE").unwrap_or_else(|_| "streamguard-loop".to_string()),
            relay_image: env::var("RELAY_IMAGE")
                .unwrap_or_else(|_| "streamguard-relay".to_string()),
            media_root: env::var("MEDIA_ROOT").unwrap_or_else(|_| "./media".to_string()),

            reconcile_interval: Duration::from_millis(
                env::var("RECONCILE_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2_000),
            ),

            primary_preempt_requires_stability: env::var("PRIMARY_PREEMPT_REQUIRES_STABILITY")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            dev_mode: env::var("DEV_MODE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),

            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "change-me-in-production".to_string()),
            jwt_expiry: Duration::from_secs(
                env::var("JWT_EXPIRY_SECONDS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(28_800),
            ),
            encryption_key_hex: env::var("ENCRYPTION_KEY").unwrap_or_else(|_| "0".repeat(64)),

            max_media_upload_bytes: env::var("MAX_MEDIA_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10 * 1024 * 1024 * 1024),
        })
    }
}
