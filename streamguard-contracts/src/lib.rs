//! Wire DTOs for the three HTTP boundaries in the control plane: the
//! reconciler/supervisor's outbound calls to a relay's control API, MS's
//! inbound webhooks and outbound `/streams` feed, and the admin HTTP
//! surface.
//!
//! Kept in its own crate (rather than folded into `streamguard-core`) so
//! `streamguard-relay` can depend on the DTOs without pulling in the store
//! adapter or reconciliation logic.

pub mod admin;
pub mod ms;
pub mod relay;
pub mod webhook;

pub mod prelude {
    pub use super::admin::*;
    pub use super::ms::*;
    pub use super::relay::*;
    pub use super::webhook::*;
}
