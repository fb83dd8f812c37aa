//! Postgres implementation of the [`Store`] trait (spec §4.2, §6).
//!
//! Grounded on the teacher's `PostgresQueryRepository`
//! (`database/repositories/query.rs`): a `PgPool`-holding struct, one
//! `#[derive(sqlx::FromRow)]` row type per query shape, runtime-checked
//! `sqlx::query_as` rather than the compile-time `query!` macro (no
//! database is available while building this workspace to seed an
//! offline query cache).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

use streamguard_model::audit::AuditLogEntry;
use streamguard_model::channel::{Channel, EncodingProfile};
use streamguard_model::config_entry::SystemConfigEntry;
use streamguard_model::destination::Destination;
use streamguard_model::ids::{ChannelId, DestinationId, OrganizationId, UserId};
use streamguard_model::source::Source;
use streamguard_model::user::{Role, User};

use super::{Store, StoredCredentials};
use crate::crypto::{CredentialCipher, EncryptedToken};
use crate::error::{CoreError, Result};

/// Pool + cipher. Decryption is needed to reconstruct a [`Channel`]'s
/// plaintext token fields on read (spec §4.2: "Credential reads may
/// decrypt").
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    cipher: CredentialCipher,
}

impl PostgresStore {
    pub fn new(pool: PgPool, cipher: CredentialCipher) -> Self {
        Self { pool, cipher }
    }

    pub async fn connect(database_url: &str, max_connections: u32, cipher: CredentialCipher) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool, cipher))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Decryption failure is a warning, not a fatal (spec §4.2); the
    /// plaintext field is left empty so the caller can still use the hash
    /// for lookups.
    fn decrypt_or_warn(&self, channel_id: i64, which: &str, token: &EncryptedToken) -> String {
        match self.cipher.decrypt(token) {
            Ok(plaintext) => plaintext,
            Err(err) => {
                warn!(channel_id, which, %err, "credential decryption failed");
                String::new()
            }
        }
    }

    fn channel_from_row(&self, row: ChannelRow) -> Channel {
        let primary_token = self.decrypt_or_warn(
            row.id,
            "primary",
            &EncryptedToken {
                ciphertext_b64: row.primary_token_ciphertext,
                nonce_b64: row.primary_token_nonce,
            },
        );
        let loop_token = self.decrypt_or_warn(
            row.id,
            "loop",
            &EncryptedToken {
                ciphertext_b64: row.loop_token_ciphertext,
                nonce_b64: row.loop_token_nonce,
            },
        );
        Channel {
            id: ChannelId(row.id),
            organization_id: OrganizationId(row.organization_id),
            slug: row.slug,
            primary_token,
            loop_token,
            enabled: row.enabled,
            loop_enabled: row.loop_enabled,
            primary_override_enabled: row.primary_override_enabled,
            auto_restart_loop: row.auto_restart_loop,
            failover_timeout_seconds: row.failover_timeout_seconds as u32,
            stability_window: row.stability_window as usize,
            anti_flap_cooldown_seconds: row.anti_flap_cooldown_seconds as u32,
            encoding: EncodingProfile {
                keyframe_interval_seconds: row.keyframe_interval_seconds as u32,
                video_bitrate_kbps: row.video_bitrate_kbps as u32,
                audio_bitrate_kbps: row.audio_bitrate_kbps as u32,
                output_resolution: row.output_resolution,
            },
            media_path: row.media_path,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ChannelRow {
    id: i64,
    organization_id: Uuid,
    slug: String,
    primary_token_ciphertext: String,
    primary_token_nonce: String,
    loop_token_ciphertext: String,
    loop_token_nonce: String,
    enabled: bool,
    loop_enabled: bool,
    primary_override_enabled: bool,
    auto_restart_loop: bool,
    failover_timeout_seconds: i32,
    stability_window: i32,
    anti_flap_cooldown_seconds: i32,
    keyframe_interval_seconds: i32,
    video_bitrate_kbps: i32,
    audio_bitrate_kbps: i32,
    output_resolution: String,
    media_path: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const CHANNEL_COLUMNS: &str = "id, organization_id, slug, primary_token_ciphertext, \
    primary_token_nonce, loop_token_ciphertext, loop_token_nonce, enabled, loop_enabled, \
    primary_override_enabled, auto_restart_loop, failover_timeout_seconds, stability_window, \
    anti_flap_cooldown_seconds, keyframe_interval_seconds, video_bitrate_kbps, \
    audio_bitrate_kbps, output_resolution, media_path, created_at, updated_at";

#[derive(Debug, FromRow)]
struct DestinationRow {
    id: Uuid,
    channel_id: i64,
    name: String,
    target_url: String,
    stream_key: Option<String>,
    enabled: bool,
}

impl From<DestinationRow> for Destination {
    fn from(row: DestinationRow) -> Self {
        Destination {
            id: DestinationId(row.id),
            channel_id: ChannelId(row.channel_id),
            name: row.name,
            target_url: row.target_url,
            stream_key: row.stream_key,
            enabled: row.enabled,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    organization_id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = CoreError;

    fn try_from(row: UserRow) -> Result<Self> {
        let role = match row.role.as_str() {
            "admin" => Role::Admin,
            "operator" => Role::Operator,
            other => return Err(CoreError::Internal(format!("unknown role {other:?}"))),
        };
        Ok(User {
            id: UserId(row.id),
            organization_id: OrganizationId(row.organization_id),
            email: row.email,
            password_hash: row.password_hash,
            role,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Operator => "operator",
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: Uuid,
    action: String,
    resource_type: String,
    resource_id: String,
    details: Value,
    actor: String,
    ip: Option<String>,
    timestamp: DateTime<Utc>,
}

impl From<AuditRow> for AuditLogEntry {
    fn from(row: AuditRow) -> Self {
        AuditLogEntry {
            id: row.id,
            action: row.action,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            details: row.details,
            actor: row.actor,
            ip: row.ip,
            timestamp: row.timestamp,
        }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn list_channels(&self) -> Result<Vec<Channel>> {
        let rows: Vec<ChannelRow> = sqlx::query_as(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| self.channel_from_row(r)).collect())
    }

    async fn get_channel(&self, id: ChannelId) -> Result<Option<Channel>> {
        let row: Option<ChannelRow> = sqlx::query_as(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| self.channel_from_row(r)))
    }

    async fn get_channel_by_slug(&self, slug: &str) -> Result<Option<Channel>> {
        let row: Option<ChannelRow> = sqlx::query_as(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| self.channel_from_row(r)))
    }

    async fn find_channel_by_credential_hash(&self, hash: &str) -> Result<Option<Channel>> {
        let row: Option<ChannelRow> = sqlx::query_as(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE primary_token_hash = $1 OR loop_token_hash = $1"
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| self.channel_from_row(r)))
    }

    async fn create_channel(&self, channel: Channel, creds: StoredCredentials) -> Result<Channel> {
        channel.validate()?;
        let row: ChannelRow = sqlx::query_as(&format!(
            "INSERT INTO channels (
                id, organization_id, slug,
                primary_token_hash, primary_token_ciphertext, primary_token_nonce,
                loop_token_hash, loop_token_ciphertext, loop_token_nonce,
                enabled, loop_enabled, primary_override_enabled, auto_restart_loop,
                failover_timeout_seconds, stability_window, anti_flap_cooldown_seconds,
                keyframe_interval_seconds, video_bitrate_kbps, audio_bitrate_kbps,
                output_resolution, media_path, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23)
            RETURNING {CHANNEL_COLUMNS}"
        ))
        .bind(channel.id.as_i64())
        .bind(channel.organization_id.0)
        .bind(&channel.slug)
        .bind(&creds.primary_hash)
        .bind(&creds.primary_encrypted.ciphertext_b64)
        .bind(&creds.primary_encrypted.nonce_b64)
        .bind(&creds.loop_hash)
        .bind(&creds.loop_encrypted.ciphertext_b64)
        .bind(&creds.loop_encrypted.nonce_b64)
        .bind(channel.enabled)
        .bind(channel.loop_enabled)
        .bind(channel.primary_override_enabled)
        .bind(channel.auto_restart_loop)
        .bind(channel.failover_timeout_seconds as i32)
        .bind(channel.stability_window as i32)
        .bind(channel.anti_flap_cooldown_seconds as i32)
        .bind(channel.encoding.keyframe_interval_seconds as i32)
        .bind(channel.encoding.video_bitrate_kbps as i32)
        .bind(channel.encoding.audio_bitrate_kbps as i32)
        .bind(&channel.encoding.output_resolution)
        .bind(&channel.media_path)
        .bind(channel.created_at)
        .bind(channel.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                CoreError::Conflict(format!("channel slug {:?} already exists", channel.slug))
            }
            other => CoreError::Database(other),
        })?;
        Ok(self.channel_from_row(row))
    }

    async fn update_channel(&self, channel: Channel) -> Result<Channel> {
        channel.validate()?;
        let row: Option<ChannelRow> = sqlx::query_as(&format!(
            "UPDATE channels SET
                enabled = $2, loop_enabled = $3, primary_override_enabled = $4,
                auto_restart_loop = $5, failover_timeout_seconds = $6, stability_window = $7,
                anti_flap_cooldown_seconds = $8, keyframe_interval_seconds = $9,
                video_bitrate_kbps = $10, audio_bitrate_kbps = $11, output_resolution = $12,
                media_path = $13, updated_at = $14
            WHERE id = $1
            RETURNING {CHANNEL_COLUMNS}"
        ))
        .bind(channel.id.as_i64())
        .bind(channel.enabled)
        .bind(channel.loop_enabled)
        .bind(channel.primary_override_enabled)
        .bind(channel.auto_restart_loop)
        .bind(channel.failover_timeout_seconds as i32)
        .bind(channel.stability_window as i32)
        .bind(channel.anti_flap_cooldown_seconds as i32)
        .bind(channel.encoding.keyframe_interval_seconds as i32)
        .bind(channel.encoding.video_bitrate_kbps as i32)
        .bind(channel.encoding.audio_bitrate_kbps as i32)
        .bind(&channel.encoding.output_resolution)
        .bind(&channel.media_path)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| self.channel_from_row(r))
            .ok_or_else(|| CoreError::NotFound(format!("channel {}", channel.id)))
    }

    async fn delete_channel(&self, id: ChannelId) -> Result<()> {
        sqlx::query("DELETE FROM channels WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_active_source(&self, channel_id: ChannelId) -> Result<Option<Source>> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT current_active_source FROM channels WHERE id = $1")
                .bind(channel_id.as_i64())
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.flatten().and_then(|s| match s.as_str() {
            "PRIMARY" => Some(Source::Primary),
            "LOOP" => Some(Source::Loop),
            _ => None,
        }))
    }

    async fn set_active_source(&self, channel_id: ChannelId, source: Source) -> Result<()> {
        sqlx::query("UPDATE channels SET current_active_source = $2 WHERE id = $1")
            .bind(channel_id.as_i64())
            .bind(source.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_destinations(&self, channel_id: ChannelId) -> Result<Vec<Destination>> {
        let rows: Vec<DestinationRow> = sqlx::query_as(
            "SELECT id, channel_id, name, target_url, stream_key, enabled \
             FROM destinations WHERE channel_id = $1 ORDER BY name",
        )
        .bind(channel_id.as_i64())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Destination::from).collect())
    }

    async fn get_destination(&self, id: DestinationId) -> Result<Option<Destination>> {
        let row: Option<DestinationRow> = sqlx::query_as(
            "SELECT id, channel_id, name, target_url, stream_key, enabled \
             FROM destinations WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Destination::from))
    }

    async fn create_destination(&self, destination: Destination) -> Result<Destination> {
        destination.validate()?;
        let row: DestinationRow = sqlx::query_as(
            "INSERT INTO destinations (id, channel_id, name, target_url, stream_key, enabled) \
             VALUES ($1,$2,$3,$4,$5,$6) \
             RETURNING id, channel_id, name, target_url, stream_key, enabled",
        )
        .bind(destination.id.0)
        .bind(destination.channel_id.as_i64())
        .bind(&destination.name)
        .bind(&destination.target_url)
        .bind(&destination.stream_key)
        .bind(destination.enabled)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_destination(&self, destination: Destination) -> Result<Destination> {
        destination.validate()?;
        let row: Option<DestinationRow> = sqlx::query_as(
            "UPDATE destinations SET name = $2, target_url = $3, stream_key = $4, enabled = $5 \
             WHERE id = $1 \
             RETURNING id, channel_id, name, target_url, stream_key, enabled",
        )
        .bind(destination.id.0)
        .bind(&destination.name)
        .bind(&destination.target_url)
        .bind(&destination.stream_key)
        .bind(destination.enabled)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Destination::from)
            .ok_or_else(|| CoreError::NotFound(format!("destination {}", destination.id)))
    }

    async fn delete_destination(&self, id: DestinationId) -> Result<()> {
        sqlx::query("DELETE FROM destinations WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, organization_id, email, password_hash, role, active, created_at, updated_at \
             FROM users ORDER BY email",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, organization_id, email, password_hash, role, active, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, organization_id, email, password_hash, role, active, created_at, updated_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn create_user(&self, user: User) -> Result<User> {
        let row: UserRow = sqlx::query_as(
            "INSERT INTO users (id, organization_id, email, password_hash, role, active, created_at, updated_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8) \
             RETURNING id, organization_id, email, password_hash, role, active, created_at, updated_at",
        )
        .bind(user.id.0)
        .bind(user.organization_id.0)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(role_str(user.role))
        .bind(user.active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                CoreError::Conflict(format!("user email {:?} already exists", user.email))
            }
            other => CoreError::Database(other),
        })?;
        User::try_from(row)
    }

    async fn update_user(&self, user: User) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(
            "UPDATE users SET email = $2, role = $3, active = $4, password_hash = $5, updated_at = $6 \
             WHERE id = $1 \
             RETURNING id, organization_id, email, password_hash, role, active, created_at, updated_at",
        )
        .bind(user.id.0)
        .bind(&user.email)
        .bind(role_str(user.role))
        .bind(user.active)
        .bind(&user.password_hash)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(r) => User::try_from(r),
            None => Err(CoreError::NotFound(format!("user {}", user.id))),
        }
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_config(&self, key: &str) -> Result<Option<SystemConfigEntry>> {
        let value: Option<Value> = sqlx::query_scalar("SELECT value FROM system_config WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.map(|value| SystemConfigEntry {
            key: key.to_string(),
            value,
        }))
    }

    async fn put_config(&self, entry: SystemConfigEntry) -> Result<SystemConfigEntry> {
        sqlx::query(
            "INSERT INTO system_config (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(&entry.key)
        .bind(&entry.value)
        .execute(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn append_audit(&self, entry: AuditLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_logs (id, action, resource_type, resource_id, details, actor, ip, timestamp) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
        )
        .bind(entry.id)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(&entry.resource_id)
        .bind(&entry.details)
        .bind(&entry.actor)
        .bind(&entry.ip)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audit(&self, limit: usize) -> Result<Vec<AuditLogEntry>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            "SELECT id, action, resource_type, resource_id, details, actor, ip, timestamp \
             FROM audit_logs ORDER BY timestamp DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AuditLogEntry::from).collect())
    }

    async fn record_health_sample(
        &self,
        channel_id: ChannelId,
        ingress: &str,
        up: bool,
        recv_kbps: u32,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO health_metrics (channel_id, ingress, up, recv_kbps) VALUES ($1,$2,$3,$4)",
        )
        .bind(channel_id.as_i64())
        .bind(ingress)
        .bind(up)
        .bind(recv_kbps as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
