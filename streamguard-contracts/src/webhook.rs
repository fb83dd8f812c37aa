use serde::{Deserialize, Serialize};

/// Response to MS's publish/unpublish/connect hooks: `"0"` accepts, any
/// other body rejects (spec §6). Rendered as a bare text body, not JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsWebhookDecision {
    Accept,
    Reject,
}

impl MsWebhookDecision {
    pub fn as_body(&self) -> &'static str {
        match self {
            MsWebhookDecision::Accept => "0",
            MsWebhookDecision::Reject => "1",
        }
    }
}

/// `POST /takeover/{slug}` response (spec §4.5): returns the primary URL
/// for the operator's ingest software.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TakeoverResponse {
    pub primary_url: String,
}
