use serde::{Deserialize, Serialize};
use streamguard_model::source::Source;

/// `POST /update` body (spec §4.4). Idempotent: posting the same payload
/// twice produces no observable change and no child restart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayUpdateRequest {
    pub source_url: String,
    pub source: Source,
    pub destinations: Vec<RelayDestination>,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub keyframe_interval_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayDestination {
    pub id: String,
    pub url: String,
}

/// `GET /status` response (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayStatusResponse {
    pub source: String,
    pub mode: Source,
    pub destinations: Vec<RelayDestinationStatus>,
    pub transcoder_running: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayDestinationStatus {
    pub url: String,
    pub running: bool,
}
