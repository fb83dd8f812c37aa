//! Store adapter, credential crypto, shared controller state, and pure
//! reconciliation decision functions for the streamguard control plane.
//!
//! This crate holds no HTTP surface and spawns no processes — it is the
//! seam `streamguard-server` drives. Keeping reconciliation decisions
//! (`reconcile`) free of I/O is what lets spec §8's invariants be asserted
//! directly against plain functions.

pub mod crypto;
pub mod error;
pub mod reconcile;
pub mod state;
pub mod store;

pub use error::{CoreError, Result};
