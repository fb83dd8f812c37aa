use chrono::{DateTime, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::ids::ChannelId;
use crate::source::{ChannelStatus, Source};

/// GOP/bitrate/resolution knobs the loop child and relay are launched with.
///
/// Defaults follow spec §3: `keyframe_interval_seconds` default 2,
/// `video_bitrate_kbps` 0 meaning "use the encoder default" (4500 is the
/// effective default applied by the supervisor, not stored as a sentinel
/// here), `audio_bitrate_kbps` default 128, `output_resolution` empty
/// meaning "match source".
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EncodingProfile {
    pub keyframe_interval_seconds: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub output_resolution: String,
}

impl Default for EncodingProfile {
    fn default() -> Self {
        Self {
            keyframe_interval_seconds: 2,
            video_bitrate_kbps: 0,
            audio_bitrate_kbps: 128,
            output_resolution: String::new(),
        }
    }
}

impl EncodingProfile {
    /// Effective video bitrate once the "0 = default" sentinel is resolved.
    pub fn effective_video_bitrate_kbps(&self) -> u32 {
        if self.video_bitrate_kbps == 0 {
            4500
        } else {
            self.video_bitrate_kbps
        }
    }
}

/// Per-channel state machine named in spec §4.1.
///
/// `Disabled` is terminal and reachable only by operator action; all other
/// transitions are driven by `enabled`, `primary_up`, `ManualLoopOverride`,
/// and cooldown expiry inside the reconciler (`streamguard-core::reconcile`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChannelPhase {
    Disabled,
    LoopOnly,
    PrimaryActive,
    Cooldown,
}

/// The unit of broadcasting (spec §3).
///
/// Token fields hold plaintext only transiently in memory after a store
/// decrypt; the store persists `hash(token)` and `encrypt(token)`
/// separately (`streamguard-core::crypto`), never this struct verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Channel {
    pub id: ChannelId,
    pub organization_id: crate::ids::OrganizationId,
    pub slug: String,
    pub primary_token: String,
    pub loop_token: String,

    pub enabled: bool,
    pub loop_enabled: bool,
    pub primary_override_enabled: bool,
    pub auto_restart_loop: bool,
    pub failover_timeout_seconds: u32,
    pub stability_window: usize,
    pub anti_flap_cooldown_seconds: u32,

    pub encoding: EncodingProfile,
    pub media_path: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Non-persisted, derived view of a channel's current condition (spec §3:
/// "Observed (derived, not stored)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObservedChannel {
    pub active_source: Option<Source>,
    pub status: ChannelStatus,
    pub recv_kbps: u32,
    pub uptime_seconds: u64,
}

impl Channel {
    /// Validates the invariants listed in spec §3.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.slug.is_empty() || !is_url_safe_slug(&self.slug) {
            return Err(ModelError::InvalidSlug(self.slug.clone()));
        }
        if self.primary_token == self.loop_token {
            return Err(ModelError::TokensMustDiffer);
        }
        if self.failover_timeout_seconds < 1 {
            return Err(ModelError::InvalidFailoverTimeout);
        }
        if self.stability_window < 1 {
            return Err(ModelError::InvalidStabilityWindow);
        }
        Ok(())
    }

    /// MS stream name for the primary ingest (spec §4.1: "preferred `slug-primary`").
    pub fn primary_stream_name(&self) -> String {
        format!("{}-primary", self.slug)
    }

    /// MS stream name for the loop ingest (spec §4.1: `slug`).
    pub fn loop_stream_name(&self) -> &str {
        &self.slug
    }
}

fn is_url_safe_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Channel {
        Channel {
            id: ChannelId(1),
            organization_id: crate::ids::OrganizationId::new(),
            slug: "alpha".into(),
            primary_token: "primary-tok".into(),
            loop_token: "loop-tok".into(),
            enabled: true,
            loop_enabled: true,
            primary_override_enabled: true,
            auto_restart_loop: true,
            failover_timeout_seconds: 10,
            stability_window: 3,
            anti_flap_cooldown_seconds: 5,
            encoding: EncodingProfile::default(),
            media_path: "alpha.mp4".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_equal_tokens() {
        let mut ch = sample();
        ch.loop_token = ch.primary_token.clone();
        assert_eq!(ch.validate(), Err(ModelError::TokensMustDiffer));
    }

    #[test]
    fn rejects_unsafe_slug() {
        let mut ch = sample();
        ch.slug = "has/slash".into();
        assert!(matches!(ch.validate(), Err(ModelError::InvalidSlug(_))));
    }

    #[test]
    fn stream_names_follow_spec_convention() {
        let ch = sample();
        assert_eq!(ch.primary_stream_name(), "alpha-primary");
        assert_eq!(ch.loop_stream_name(), "alpha");
    }

    #[test]
    fn default_encoding_profile_matches_spec_defaults() {
        let profile = EncodingProfile::default();
        assert_eq!(profile.keyframe_interval_seconds, 2);
        assert_eq!(profile.audio_bitrate_kbps, 128);
        assert_eq!(profile.effective_video_bitrate_kbps(), 4500);
    }
}
