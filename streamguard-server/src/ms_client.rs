//! Outbound HTTP to the media server's `GET /streams` feed (spec §4.1 step
//! 2, §6).
//!
//! Grounded on the teacher's `reqwest::Client` usage in
//! `stream/transcoding/worker.rs` for talking to an external process over
//! HTTP with an explicit timeout rather than trusting the default.

use std::time::Duration;

use streamguard_contracts::ms::MsStreamsResponse;

#[derive(Clone)]
pub struct MsClient {
    client: reqwest::Client,
    base_url: String,
}

impl MsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Fetches the current stream table. A fetch failure (timeout,
    /// connection refused) is treated by the reconciler as "all streams
    /// down", not a tick abort (spec §4.1: "MS unreachable ... stream
    /// considered not publishing").
    pub async fn fetch_streams(&self) -> anyhow::Result<MsStreamsResponse> {
        let url = format!("{}/api/v1/streams", self.base_url);
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        Ok(resp.json::<MsStreamsResponse>().await?)
    }
}
