//! Outbound HTTP to a relay's control API (spec §4.4): `POST /update`,
//! `GET /status`. One client instance is shared across channels; each
//! call targets `http://127.0.0.1:{port}` per the supervisor's port
//! allocation.

use std::time::Duration;

use streamguard_contracts::relay::{RelayStatusResponse, RelayUpdateRequest};

#[derive(Clone)]
pub struct RelayClient {
    client: reqwest::Client,
}

impl RelayClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    /// Posts the desired configuration. Idempotent on the relay side;
    /// failure here is logged and retried next tick, not treated as fatal
    /// (spec §4.1: "a failed relay POST is retried on the next tick").
    pub async fn update(&self, port: u16, req: &RelayUpdateRequest) -> anyhow::Result<()> {
        let url = format!("http://127.0.0.1:{port}/update");
        self.client.post(&url).json(req).send().await?.error_for_status()?;
        Ok(())
    }

    pub async fn status(&self, port: u16) -> anyhow::Result<RelayStatusResponse> {
        let url = format!("http://127.0.0.1:{port}/status");
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        Ok(resp.json::<RelayStatusResponse>().await?)
    }
}
