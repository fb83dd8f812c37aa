//! In-memory `Store` fake used by integration tests (spec §8's end-to-end
//! scenarios are exercised against this, not a real database).

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use streamguard_model::audit::AuditLogEntry;
use streamguard_model::channel::Channel;
use streamguard_model::config_entry::SystemConfigEntry;
use streamguard_model::destination::Destination;
use streamguard_model::ids::{ChannelId, DestinationId, UserId};
use streamguard_model::source::Source;
use streamguard_model::user::User;

use super::{Store, StoredCredentials};
use crate::error::{CoreError, Result};

#[derive(Default)]
struct Inner {
    channels: HashMap<ChannelId, Channel>,
    credentials: HashMap<ChannelId, StoredCredentials>,
    active_sources: HashMap<ChannelId, Source>,
    destinations: HashMap<DestinationId, Destination>,
    users: HashMap<UserId, User>,
    config: HashMap<String, SystemConfigEntry>,
    audit: Vec<AuditLogEntry>,
}

/// An in-memory `Store` fake. Grounded on the teacher's convention of
/// guarding shared collections with a single `RwLock` (`infra::app_state`,
/// `infra::scan::scan_manager`).
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_channels(&self) -> Result<Vec<Channel>> {
        Ok(self.inner.read().unwrap().channels.values().cloned().collect())
    }

    async fn get_channel(&self, id: ChannelId) -> Result<Option<Channel>> {
        Ok(self.inner.read().unwrap().channels.get(&id).cloned())
    }

    async fn get_channel_by_slug(&self, slug: &str) -> Result<Option<Channel>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .channels
            .values()
            .find(|c| c.slug == slug)
            .cloned())
    }

    async fn find_channel_by_credential_hash(&self, hash: &str) -> Result<Option<Channel>> {
        let guard = self.inner.read().unwrap();
        let channel_id = guard
            .credentials
            .iter()
            .find(|(_, creds)| creds.primary_hash == hash || creds.loop_hash == hash)
            .map(|(id, _)| *id);
        Ok(channel_id.and_then(|id| guard.channels.get(&id).cloned()))
    }

    async fn create_channel(&self, channel: Channel, creds: StoredCredentials) -> Result<Channel> {
        let mut guard = self.inner.write().unwrap();
        if guard.channels.values().any(|c| c.slug == channel.slug) {
            return Err(CoreError::Conflict(format!(
                "channel slug {:?} already exists",
                channel.slug
            )));
        }
        guard.credentials.insert(channel.id, creds);
        guard.channels.insert(channel.id, channel.clone());
        Ok(channel)
    }

    async fn update_channel(&self, channel: Channel) -> Result<Channel> {
        let mut guard = self.inner.write().unwrap();
        if !guard.channels.contains_key(&channel.id) {
            return Err(CoreError::NotFound(format!("channel {}", channel.id)));
        }
        guard.channels.insert(channel.id, channel.clone());
        Ok(channel)
    }

    async fn delete_channel(&self, id: ChannelId) -> Result<()> {
        let mut guard = self.inner.write().unwrap();
        guard.channels.remove(&id);
        guard.credentials.remove(&id);
        guard.active_sources.remove(&id);
        guard.destinations.retain(|_, d| d.channel_id != id);
        Ok(())
    }

    async fn get_active_source(&self, channel_id: ChannelId) -> Result<Option<Source>> {
        Ok(self.inner.read().unwrap().active_sources.get(&channel_id).copied())
    }

    async fn set_active_source(&self, channel_id: ChannelId, source: Source) -> Result<()> {
        self.inner.write().unwrap().active_sources.insert(channel_id, source);
        Ok(())
    }

    async fn list_destinations(&self, channel_id: ChannelId) -> Result<Vec<Destination>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .destinations
            .values()
            .filter(|d| d.channel_id == channel_id)
            .cloned()
            .collect())
    }

    async fn get_destination(&self, id: DestinationId) -> Result<Option<Destination>> {
        Ok(self.inner.read().unwrap().destinations.get(&id).cloned())
    }

    async fn create_destination(&self, destination: Destination) -> Result<Destination> {
        let mut guard = self.inner.write().unwrap();
        guard.destinations.insert(destination.id, destination.clone());
        Ok(destination)
    }

    async fn update_destination(&self, destination: Destination) -> Result<Destination> {
        let mut guard = self.inner.write().unwrap();
        if !guard.destinations.contains_key(&destination.id) {
            return Err(CoreError::NotFound(format!("destination {}", destination.id)));
        }
        guard.destinations.insert(destination.id, destination.clone());
        Ok(destination)
    }

    async fn delete_destination(&self, id: DestinationId) -> Result<()> {
        self.inner.write().unwrap().destinations.remove(&id);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.inner.read().unwrap().users.values().cloned().collect())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.inner.read().unwrap().users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create_user(&self, user: User) -> Result<User> {
        let mut guard = self.inner.write().unwrap();
        guard.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: User) -> Result<User> {
        let mut guard = self.inner.write().unwrap();
        if !guard.users.contains_key(&user.id) {
            return Err(CoreError::NotFound(format!("user {}", user.id)));
        }
        guard.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        self.inner.write().unwrap().users.remove(&id);
        Ok(())
    }

    async fn get_config(&self, key: &str) -> Result<Option<SystemConfigEntry>> {
        Ok(self.inner.read().unwrap().config.get(key).cloned())
    }

    async fn put_config(&self, entry: SystemConfigEntry) -> Result<SystemConfigEntry> {
        let mut guard = self.inner.write().unwrap();
        guard.config.insert(entry.key.clone(), entry.clone());
        Ok(entry)
    }

    async fn append_audit(&self, entry: AuditLogEntry) -> Result<()> {
        self.inner.write().unwrap().audit.push(entry);
        Ok(())
    }

    async fn list_audit(&self, limit: usize) -> Result<Vec<AuditLogEntry>> {
        let guard = self.inner.read().unwrap();
        Ok(guard.audit.iter().rev().take(limit).cloned().collect())
    }

    async fn record_health_sample(
        &self,
        _channel_id: ChannelId,
        _ingress: &str,
        _up: bool,
        _recv_kbps: u32,
    ) -> Result<()> {
        // Test fake: the durable trail has no reader in-process, so the
        // in-memory store doesn't bother keeping one.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use streamguard_model::channel::EncodingProfile;
    use streamguard_model::ids::OrganizationId;

    fn sample_channel() -> Channel {
        Channel {
            id: ChannelId(1),
            organization_id: OrganizationId::new(),
            slug: "alpha".into(),
            primary_token: "p".into(),
            loop_token: "l".into(),
            enabled: true,
            loop_enabled: true,
            primary_override_enabled: true,
            auto_restart_loop: true,
            failover_timeout_seconds: 10,
            stability_window: 3,
            anti_flap_cooldown_seconds: 15,
            encoding: EncodingProfile::default(),
            media_path: "alpha.mp4".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_creds() -> StoredCredentials {
        use crate::crypto::EncryptedToken;
        StoredCredentials {
            primary_hash: "h1".into(),
            primary_encrypted: EncryptedToken {
                ciphertext_b64: "a".into(),
                nonce_b64: "b".into(),
            },
            loop_hash: "h2".into(),
            loop_encrypted: EncryptedToken {
                ciphertext_b64: "c".into(),
                nonce_b64: "d".into(),
            },
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_slug() {
        let store = MemoryStore::new();
        store
            .create_channel(sample_channel(), sample_creds())
            .await
            .unwrap();
        let mut dup = sample_channel();
        dup.id = ChannelId(2);
        let result = store.create_channel(dup, sample_creds()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn finds_channel_by_credential_hash() {
        let store = MemoryStore::new();
        store
            .create_channel(sample_channel(), sample_creds())
            .await
            .unwrap();
        let found = store.find_channel_by_credential_hash("h1").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn cascades_destination_delete_on_channel_delete() {
        let store = MemoryStore::new();
        store
            .create_channel(sample_channel(), sample_creds())
            .await
            .unwrap();
        store
            .create_destination(Destination {
                id: DestinationId::new(),
                channel_id: ChannelId(1),
                name: "d".into(),
                target_url: "rtmp://x".into(),
                stream_key: None,
                enabled: true,
            })
            .await
            .unwrap();
        store.delete_channel(ChannelId(1)).await.unwrap();
        assert!(store.list_destinations(ChannelId(1)).await.unwrap().is_empty());
    }
}
