//! The axum-visible `AppState`: every handler borrows from this.
//!
//! Grounded on the teacher's `AppState` aggregate (`ferrex-server/src/lib.rs`
//! / `infra/startup.rs`): one `Arc`-wrapped struct bundling the store, the
//! process-wide runtime state, and the ambient services, cloned cheaply
//! into each request.

use std::sync::{Arc, Mutex};

use streamguard_core::crypto::CredentialCipher;
use streamguard_core::state::ControllerState;
use streamguard_core::store::Store;
use streamguard_model::log_buffer::LogBuffer;

use crate::config::Config;
use crate::ms_client::MsClient;
use crate::supervisor::Supervisor;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub controller: Arc<ControllerState>,
    pub log_buffer: Arc<Mutex<LogBuffer>>,
    pub cipher: CredentialCipher,
    pub supervisor: Arc<Supervisor>,
    pub ms_client: MsClient,
    pub config: Arc<Config>,
    pub tick_stats: Arc<Mutex<Option<TickStats>>>,
}

/// The last reconciler tick's timing, surfaced at `GET /system/status`
/// (spec §6).
#[derive(Debug, Clone)]
pub struct TickStats {
    pub at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
}
