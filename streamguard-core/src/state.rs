//! In-memory controller state shared by the reconciler, webhook handlers,
//! and the admin API (spec §3, §5).
//!
//! Grounded on the teacher's `ScanControlPlane`
//! (`ferrex-server::infra::scan::scan_manager`): a single `RwLock`-guarded
//! map per concern, read every tick and written rarely, snapshotted under
//! a read lock before the reconciler computes its decision lock-free.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use streamguard_model::health::HealthHistory;
use streamguard_model::source::Source;

#[derive(Debug, Default)]
struct PerChannelState {
    active_source: Option<Source>,
    manual_loop_override: bool,
    cooldown_started_at: Option<DateTime<Utc>>,
    primary_health: Option<HealthHistory>,
    loop_health: Option<HealthHistory>,
}

/// Holds `ActiveSourceMap`, `ManualLoopOverride`, `TakeoverCooldown`, and
/// `HealthHistory` (spec §3) keyed by channel slug.
#[derive(Debug, Default)]
pub struct ControllerState {
    channels: RwLock<HashMap<String, PerChannelState>>,
}

/// A read-lock snapshot of one channel's runtime state, safe to compute a
/// reconcile decision from without holding any lock.
#[derive(Debug, Clone)]
pub struct ChannelStateSnapshot {
    pub active_source: Option<Source>,
    pub manual_loop_override: bool,
    pub cooldown_started_at: Option<DateTime<Utc>>,
    pub primary_stable_up: bool,
    pub loop_stable_up: bool,
    pub primary_stable_down: bool,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, slug: &str) -> ChannelStateSnapshot {
        let guard = self.channels.read().expect("controller state poisoned");
        match guard.get(slug) {
            Some(s) => ChannelStateSnapshot {
                active_source: s.active_source,
                manual_loop_override: s.manual_loop_override,
                cooldown_started_at: s.cooldown_started_at,
                primary_stable_up: s.primary_health.as_ref().is_some_and(|h| h.stable_up()),
                loop_stable_up: s.loop_health.as_ref().is_some_and(|h| h.stable_up()),
                primary_stable_down: s.primary_health.as_ref().is_some_and(|h| h.stable_down()),
            },
            None => ChannelStateSnapshot {
                active_source: None,
                manual_loop_override: false,
                cooldown_started_at: None,
                primary_stable_up: false,
                loop_stable_up: false,
                primary_stable_down: false,
            },
        }
    }

    /// Pushes a liveness sample into the per-ingress history, creating it
    /// on first observation (spec §3: "created on first observation").
    pub fn push_health(&self, slug: &str, stability_window: usize, primary_up: bool, loop_up: bool) {
        let mut guard = self.channels.write().expect("controller state poisoned");
        let entry = guard.entry(slug.to_string()).or_default();
        entry
            .primary_health
            .get_or_insert_with(|| HealthHistory::new(stability_window))
            .push(primary_up);
        entry
            .loop_health
            .get_or_insert_with(|| HealthHistory::new(stability_window))
            .push(loop_up);
    }

    pub fn set_active_source(&self, slug: &str, source: Source) {
        let mut guard = self.channels.write().expect("controller state poisoned");
        guard.entry(slug.to_string()).or_default().active_source = Some(source);
    }

    pub fn set_manual_loop_override(&self, slug: &str, value: bool) {
        let mut guard = self.channels.write().expect("controller state poisoned");
        guard.entry(slug.to_string()).or_default().manual_loop_override = value;
    }

    pub fn start_cooldown(&self, slug: &str, at: DateTime<Utc>) {
        let mut guard = self.channels.write().expect("controller state poisoned");
        guard.entry(slug.to_string()).or_default().cooldown_started_at = Some(at);
    }

    pub fn clear_cooldown(&self, slug: &str) {
        let mut guard = self.channels.write().expect("controller state poisoned");
        if let Some(s) = guard.get_mut(slug) {
            s.cooldown_started_at = None;
        }
    }

    pub fn remove_channel(&self, slug: &str) {
        let mut guard = self.channels.write().expect("controller state poisoned");
        guard.remove(slug);
    }

    pub fn active_sources(&self) -> HashMap<String, Source> {
        let guard = self.channels.read().expect("controller state poisoned");
        guard
            .iter()
            .filter_map(|(slug, s)| s.active_source.map(|src| (slug.clone(), src)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_history_accumulates_per_channel() {
        let state = ControllerState::new();
        state.push_health("alpha", 2, true, false);
        state.push_health("alpha", 2, true, false);
        let snap = state.snapshot("alpha");
        assert!(snap.primary_stable_up);
        assert!(!snap.loop_stable_up);
    }

    #[test]
    fn unknown_channel_snapshots_as_empty() {
        let state = ControllerState::new();
        let snap = state.snapshot("missing");
        assert!(snap.active_source.is_none());
        assert!(!snap.manual_loop_override);
    }

    #[test]
    fn cooldown_round_trips() {
        let state = ControllerState::new();
        let now = Utc::now();
        state.start_cooldown("alpha", now);
        assert_eq!(state.snapshot("alpha").cooldown_started_at, Some(now));
        state.clear_cooldown("alpha");
        assert!(state.snapshot("alpha").cooldown_started_at.is_none());
    }
}
