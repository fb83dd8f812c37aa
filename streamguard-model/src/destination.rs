#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::ids::{ChannelId, DestinationId};

/// Observed connectivity of a single downstream distributor (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum DestinationStatus {
    Connected,
    Disconnected,
    Error,
}

impl DestinationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationStatus::Connected => "CONNECTED",
            DestinationStatus::Disconnected => "DISCONNECTED",
            DestinationStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for DestinationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A downstream RTMP target owned by a [`crate::channel::Channel`]
/// (deletion cascades, spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Destination {
    pub id: DestinationId,
    pub channel_id: ChannelId,
    pub name: String,
    pub target_url: String,
    pub stream_key: Option<String>,
    pub enabled: bool,
}

impl Destination {
    /// Full publish URL with `stream_key` appended as a path segment, per
    /// spec §3.
    pub fn full_url(&self) -> String {
        match &self.stream_key {
            Some(key) if !key.is_empty() => {
                format!("{}/{}", self.target_url.trim_end_matches('/'), key)
            }
            _ => self.target_url.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if url::Url::parse(&self.target_url).is_err() {
            return Err(ModelError::InvalidTargetUrl(self.target_url.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_url_appends_stream_key() {
        let dest = Destination {
            id: DestinationId::new(),
            channel_id: ChannelId(1),
            name: "youtube".into(),
            target_url: "rtmp://a.rtmp.youtube.com/live2".into(),
            stream_key: Some("abcd-1234".into()),
            enabled: true,
        };
        assert_eq!(dest.full_url(), "rtmp://a.rtmp.youtube.com/live2/abcd-1234");
    }

    #[test]
    fn full_url_without_key_is_target_url() {
        let dest = Destination {
            id: DestinationId::new(),
            channel_id: ChannelId(1),
            name: "relay-clean".into(),
            target_url: "rtmp://ms/app/relay_clean".into(),
            stream_key: None,
            enabled: true,
        };
        assert_eq!(dest.full_url(), "rtmp://ms/app/relay_clean");
    }
}
