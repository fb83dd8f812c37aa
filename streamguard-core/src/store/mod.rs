//! The `Store` trait (spec §4.2): the only persistence seam the
//! reconciler, webhook handlers, and admin API depend on.

#[cfg(feature = "database")]
pub mod postgres;

pub mod memory;

use async_trait::async_trait;
use streamguard_model::audit::AuditLogEntry;
use streamguard_model::channel::Channel;
use streamguard_model::config_entry::SystemConfigEntry;
use streamguard_model::destination::Destination;
use streamguard_model::ids::{ChannelId, DestinationId, UserId};
use streamguard_model::source::Source;
use streamguard_model::user::User;

use crate::crypto::EncryptedToken;
use crate::error::Result;

/// A channel row plus its encrypted/hashed credential columns, exactly as
/// persisted (spec §4.2: "Credential writes must persist both hash(token)
/// ... and encrypt(token)").
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub primary_hash: String,
    pub primary_encrypted: EncryptedToken,
    pub loop_hash: String,
    pub loop_encrypted: EncryptedToken,
}

#[async_trait]
pub trait Store: Send + Sync {
    // Channels
    async fn list_channels(&self) -> Result<Vec<Channel>>;
    async fn get_channel(&self, id: ChannelId) -> Result<Option<Channel>>;
    async fn get_channel_by_slug(&self, slug: &str) -> Result<Option<Channel>>;
    async fn find_channel_by_credential_hash(&self, hash: &str) -> Result<Option<Channel>>;
    async fn create_channel(&self, channel: Channel, creds: StoredCredentials) -> Result<Channel>;
    async fn update_channel(&self, channel: Channel) -> Result<Channel>;
    async fn delete_channel(&self, id: ChannelId) -> Result<()>;

    async fn get_active_source(&self, channel_id: ChannelId) -> Result<Option<Source>>;
    async fn set_active_source(&self, channel_id: ChannelId, source: Source) -> Result<()>;

    // Destinations
    async fn list_destinations(&self, channel_id: ChannelId) -> Result<Vec<Destination>>;
    async fn get_destination(&self, id: DestinationId) -> Result<Option<Destination>>;
    async fn create_destination(&self, destination: Destination) -> Result<Destination>;
    async fn update_destination(&self, destination: Destination) -> Result<Destination>;
    async fn delete_destination(&self, id: DestinationId) -> Result<()>;

    // Users
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn create_user(&self, user: User) -> Result<User>;
    async fn update_user(&self, user: User) -> Result<User>;
    async fn delete_user(&self, id: UserId) -> Result<()>;

    // Config
    async fn get_config(&self, key: &str) -> Result<Option<SystemConfigEntry>>;
    async fn put_config(&self, entry: SystemConfigEntry) -> Result<SystemConfigEntry>;

    // Audit
    async fn append_audit(&self, entry: AuditLogEntry) -> Result<()>;
    async fn list_audit(&self, limit: usize) -> Result<Vec<AuditLogEntry>>;

    /// Durable trail of the per-tick liveness samples the reconciler feeds
    /// into the in-process `HealthHistory` (spec §6: `health_metrics`
    /// table). The in-memory history remains authoritative for
    /// reconciliation decisions; this is only the audit trail behind
    /// `/health/services` history views and post-incident review.
    async fn record_health_sample(
        &self,
        channel_id: ChannelId,
        ingress: &str,
        up: bool,
        recv_kbps: u32,
    ) -> Result<()>;
}
