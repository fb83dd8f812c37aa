use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `GET /api/v1/streams` response envelope (spec §6).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MsStreamsResponse {
    pub streams: Vec<MsStream>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MsStream {
    pub name: String,
    pub publish: MsPublishInfo,
    pub kbps: MsKbpsInfo,
    #[serde(default)]
    pub video: MsVideoInfo,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MsPublishInfo {
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MsKbpsInfo {
    pub recv_30s: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MsVideoInfo {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub codec: String,
}

impl MsStreamsResponse {
    /// `name → observed row`, matching spec §4.1 step 2.
    pub fn by_name(self) -> HashMap<String, MsStream> {
        self.streams.into_iter().map(|s| (s.name.clone(), s)).collect()
    }
}

/// Inbound publish/unpublish/connect webhook payload (spec §6).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MsWebhookPayload {
    pub action: MsWebhookAction,
    pub stream: String,
    pub param: String,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MsWebhookAction {
    OnPublish,
    OnUnpublish,
    OnConnect,
}
