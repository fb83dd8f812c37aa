//! Shared domain types for the streamguard control plane.
//!
//! This crate has no I/O: it defines the entities, identifiers, and
//! invariants that `streamguard-core` persists and `streamguard-server`
//! / `streamguard-relay` exchange over the wire. Keeping it dependency-light
//! lets every other crate in the workspace depend on it without pulling in
//! sqlx, axum, or reqwest.

pub mod audit;
pub mod channel;
pub mod config_entry;
pub mod destination;
pub mod error;
pub mod health;
pub mod ids;
pub mod log_buffer;
pub mod source;
pub mod user;

pub mod prelude {
    pub use crate::audit::AuditLogEntry;
    pub use crate::channel::{Channel, ChannelPhase, EncodingProfile, ObservedChannel};
    pub use crate::config_entry::{ConfigKey, SystemConfigEntry};
    pub use crate::destination::{Destination, DestinationStatus};
    pub use crate::error::ModelError;
    pub use crate::health::{HealthHistory, ObservedStream};
    pub use crate::ids::{ChannelId, DestinationId, OrganizationId, UserId};
    pub use crate::log_buffer::{LogBuffer, LogEntry, LogLevel};
    pub use crate::source::{ChannelStatus, Source};
    pub use crate::user::{Role, User};
}
