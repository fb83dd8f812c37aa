//! Request/response bodies for the admin HTTP surface (spec §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use streamguard_model::channel::{ChannelPhase, EncodingProfile};
use streamguard_model::destination::DestinationStatus;
use streamguard_model::source::{ChannelStatus, Source};
use streamguard_model::user::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelResponse {
    pub id: i64,
    pub slug: String,
    pub enabled: bool,
    pub loop_enabled: bool,
    pub primary_override_enabled: bool,
    pub auto_restart_loop: bool,
    pub failover_timeout_seconds: u32,
    pub stability_window: usize,
    pub anti_flap_cooldown_seconds: u32,
    pub encoding: EncodingProfile,
    pub media_path: String,
    pub phase: ChannelPhase,
    pub active_source: Option<Source>,
    pub status: ChannelStatus,
    pub recv_kbps: u32,
    pub destinations: Vec<DestinationResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateChannelRequest {
    pub slug: String,
    pub primary_token: String,
    pub loop_token: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub loop_enabled: bool,
    #[serde(default = "default_true")]
    pub primary_override_enabled: bool,
    #[serde(default = "default_true")]
    pub auto_restart_loop: bool,
    #[serde(default = "default_failover_timeout")]
    pub failover_timeout_seconds: u32,
    #[serde(default = "default_stability_window")]
    pub stability_window: usize,
    #[serde(default = "default_cooldown")]
    pub anti_flap_cooldown_seconds: u32,
    #[serde(default)]
    pub encoding: EncodingProfile,
    pub media_path: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateChannelRequest {
    pub enabled: Option<bool>,
    pub loop_enabled: Option<bool>,
    pub primary_override_enabled: Option<bool>,
    pub auto_restart_loop: Option<bool>,
    pub failover_timeout_seconds: Option<u32>,
    pub stability_window: Option<usize>,
    pub anti_flap_cooldown_seconds: Option<u32>,
    pub encoding: Option<EncodingProfile>,
    pub media_path: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_failover_timeout() -> u32 {
    10
}
fn default_stability_window() -> usize {
    3
}
fn default_cooldown() -> u32 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationResponse {
    pub id: Uuid,
    pub channel_id: i64,
    pub name: String,
    pub target_url: String,
    pub stream_key: Option<String>,
    pub enabled: bool,
    pub status: DestinationStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDestinationRequest {
    pub channel_id: i64,
    pub name: String,
    pub target_url: String,
    pub stream_key: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateDestinationRequest {
    pub name: Option<String>,
    pub target_url: Option<String>,
    pub stream_key: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSourceEntry {
    pub slug: String,
    pub active_source: Source,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatusResponse {
    pub channel_count: usize,
    pub enabled_channel_count: usize,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_tick_duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealthResponse {
    pub services: Vec<ServiceHealthEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealthEntry {
    pub slug: String,
    pub status: ChannelStatus,
    pub active_source: Option<Source>,
    pub destinations_connected: usize,
    pub destinations_total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntryResponse {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub component: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogsQuery {
    pub level: Option<String>,
    #[serde(default = "default_log_limit")]
    pub limit: usize,
}

fn default_log_limit() -> usize {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogResponse {
    pub id: Uuid,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub details: Value,
    pub actor: String,
    pub ip: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntryResponse {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PutConfigRequest {
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Operator
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFileResponse {
    pub filename: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}
