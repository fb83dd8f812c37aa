//! # streamguard-server
//!
//! The control-plane binary: reconciles primary/loop source state per
//! channel, supervises the loop and relay child processes, serves the
//! media-server webhooks, and exposes the admin HTTP API.
//!
//! ## Architecture
//!
//! - PostgreSQL for persistent channel/destination/user/audit state
//! - An in-memory `ControllerState` for the fast-moving reconciler view
//! - `tokio::process` children (`loop-{slug}`, `relay-{slug}`) supervised
//!   per channel
//! - A fixed-interval reconciler task driving failover decisions

pub mod admin;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod errors;
pub mod ms_client;
pub mod reconciler;
pub mod relay_client;
pub mod routes;
pub mod supervisor;
pub mod webhooks;
