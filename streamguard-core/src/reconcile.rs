//! Pure reconciliation decision functions (spec §4.1).
//!
//! Kept free of I/O and locking so every invariant in spec §8 can be
//! asserted directly against these functions; `streamguard-server::reconciler`
//! is the thin I/O shell that gathers inputs (store, MS, controller state)
//! and applies the [`ReconcileDecision`] it gets back.

use chrono::{DateTime, Duration, Utc};

use streamguard_model::channel::{Channel, ChannelPhase};
use streamguard_model::source::Source;

/// `THRESHOLD_KBPS` from spec §4.1: guards `primary_up` against spurious
/// flaps caused by a trickle of bytes.
pub const THRESHOLD_KBPS: u32 = 100;

/// Resolves the authoritative in-memory source against the persisted
/// value (spec §4.1: "if store disagrees, adopt store value and correct
/// map; if both empty, default `LOOP`").
///
/// Returns the resolved source and whether the in-memory map needs
/// correcting to match it.
pub fn resolve_current_source(
    map_value: Option<Source>,
    store_value: Option<Source>,
) -> (Source, bool) {
    match (map_value, store_value) {
        (Some(m), Some(s)) if m != s => (s, true),
        (Some(m), Some(_)) => (m, false),
        (Some(m), None) => (m, false),
        (None, Some(s)) => (s, true),
        (None, None) => (Source::Loop, true),
    }
}

/// Process-wide reconciler tuning, separate from any one channel's
/// desired state (spec §9 Open Question: "Implementation should make
/// this configurable ... and default to the current behavior").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// When `true`, auto-preemption additionally requires
    /// `HealthHistory::stable_up()` for the primary ingress, not just the
    /// single-sample `primary_up`. Defaults to `false` to preserve the
    /// spec's documented observable semantics.
    pub primary_preempt_requires_stability: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            primary_preempt_requires_stability: false,
        }
    }
}

/// The decision produced for one channel on one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileDecision {
    pub phase: ChannelPhase,
    pub next_source: Source,
    pub source_changed: bool,
    pub clear_manual_override: bool,
    pub emit_auto_switch_audit: bool,
    pub start_loop_child: bool,
    pub start_relay: bool,
    pub cooldown_active: bool,
    /// Set when `primary_up=false` for a full stability window while the
    /// logical source is still `PRIMARY` (spec §9's watchdog open
    /// question) — observability only, does not change `next_source`.
    pub emit_primary_down_watchdog: bool,
}

/// `ReconcileChannel` from spec §4.1, with `current_source` already
/// resolved via [`resolve_current_source`] and liveness already computed
/// via `ObservedStream::{primary_up, loop_up}`.
#[allow(clippy::too_many_arguments)]
pub fn reconcile_channel(
    channel: &Channel,
    primary_up: bool,
    _loop_up: bool,
    current_source: Source,
    manual_loop_override: bool,
    cooldown_started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    primary_history_stable_up: bool,
    primary_history_stable_down: bool,
    reconciler_config: ReconcilerConfig,
) -> ReconcileDecision {
    if !channel.enabled {
        return ReconcileDecision {
            phase: ChannelPhase::Disabled,
            next_source: current_source,
            source_changed: false,
            clear_manual_override: false,
            emit_auto_switch_audit: false,
            start_loop_child: false,
            start_relay: false,
            cooldown_active: false,
            emit_primary_down_watchdog: false,
        };
    }

    // "Clear ManualLoopOverride iff primary_up = false" (spec §4.1).
    let clear_manual_override = manual_loop_override && !primary_up;
    let effective_override = manual_loop_override && !clear_manual_override;

    // Auto-preemption rule (spec §4.1): single-sample primary_up, not
    // history stability — THRESHOLD_KBPS is the anti-flap guard. The
    // stricter, symmetrically-stable variant is opt-in (spec §9 Open
    // Question) via `reconciler_config.primary_preempt_requires_stability`.
    let primary_preempt_signal = if reconciler_config.primary_preempt_requires_stability {
        primary_history_stable_up
    } else {
        primary_up
    };
    let auto_switch_to_primary = channel.primary_override_enabled
        && primary_preempt_signal
        && current_source != Source::Primary
        && !effective_override;

    // Watchdog (spec §9 Open Question): observability only, never changes
    // `next_source` — the "No automatic fallback to LOOP" rule still holds.
    let emit_primary_down_watchdog =
        current_source == Source::Primary && primary_history_stable_down;

    let next_source = if auto_switch_to_primary {
        Source::Primary
    } else {
        current_source
    };

    // No automatic fallback to LOOP on primary drop (spec §4.1): absence
    // of an explicit switch-away rule is intentional, not an omission.

    let cooldown_active = cooldown_started_at
        .map(|t| now - t < Duration::seconds(channel.failover_timeout_seconds as i64))
        .unwrap_or(false);

    let start_loop_child = channel.loop_enabled && !cooldown_active;

    let phase = if cooldown_active {
        ChannelPhase::Cooldown
    } else if next_source == Source::Primary {
        ChannelPhase::PrimaryActive
    } else {
        ChannelPhase::LoopOnly
    };

    ReconcileDecision {
        phase,
        next_source,
        source_changed: next_source != current_source,
        clear_manual_override,
        emit_auto_switch_audit: auto_switch_to_primary,
        start_loop_child,
        start_relay: true,
        cooldown_active,
        emit_primary_down_watchdog,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamguard_model::channel::EncodingProfile;
    use streamguard_model::ids::ChannelId;

    fn sample_channel() -> Channel {
        Channel {
            id: ChannelId(1),
            organization_id: streamguard_model::ids::OrganizationId::new(),
            slug: "alpha".into(),
            primary_token: "primary".into(),
            loop_token: "loop".into(),
            enabled: true,
            loop_enabled: true,
            primary_override_enabled: true,
            auto_restart_loop: true,
            failover_timeout_seconds: 10,
            stability_window: 3,
            anti_flap_cooldown_seconds: 15,
            encoding: EncodingProfile::default(),
            media_path: "alpha.mp4".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Calls `reconcile_channel` with the default `ReconcilerConfig` and a
    /// stability history matching the single-sample `primary_up` value —
    /// the historical behavior tests below exercise before the stability
    /// gate and watchdog signal were added.
    #[allow(clippy::too_many_arguments)]
    fn reconcile(
        ch: &Channel,
        primary_up: bool,
        loop_up: bool,
        current_source: Source,
        manual_loop_override: bool,
        cooldown_started_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> ReconcileDecision {
        reconcile_channel(
            ch,
            primary_up,
            loop_up,
            current_source,
            manual_loop_override,
            cooldown_started_at,
            now,
            primary_up,
            !primary_up,
            ReconcilerConfig::default(),
        )
    }

    #[test]
    fn disabled_channel_stops_everything() {
        let mut ch = sample_channel();
        ch.enabled = false;
        let decision = reconcile(&ch, false, true, Source::Loop, false, None, Utc::now());
        assert_eq!(decision.phase, ChannelPhase::Disabled);
        assert!(!decision.start_loop_child);
        assert!(!decision.start_relay);
    }

    #[test]
    fn scenario_cold_start_loop_only() {
        let ch = sample_channel();
        let decision = reconcile(&ch, false, true, Source::Loop, false, None, Utc::now());
        assert_eq!(decision.phase, ChannelPhase::LoopOnly);
        assert_eq!(decision.next_source, Source::Loop);
        assert!(decision.start_loop_child);
    }

    #[test]
    fn scenario_primary_preempts() {
        let ch = sample_channel();
        let decision = reconcile(&ch, true, true, Source::Loop, false, None, Utc::now());
        assert_eq!(decision.next_source, Source::Primary);
        assert!(decision.source_changed);
        assert!(decision.emit_auto_switch_audit);
        assert_eq!(decision.phase, ChannelPhase::PrimaryActive);
        // Loop child stays up for instant fallback.
        assert!(decision.start_loop_child);
    }

    #[test]
    fn scenario_manual_loop_override_blocks_preemption() {
        let ch = sample_channel();
        let decision = reconcile(&ch, true, true, Source::Loop, true, None, Utc::now());
        assert_eq!(decision.next_source, Source::Loop);
        assert!(!decision.emit_auto_switch_audit);
        assert!(!decision.clear_manual_override);
    }

    #[test]
    fn manual_override_clears_when_primary_goes_down() {
        let ch = sample_channel();
        let decision = reconcile(&ch, false, true, Source::Loop, true, None, Utc::now());
        assert!(decision.clear_manual_override);
    }

    #[test]
    fn cooldown_blocks_loop_child_start() {
        let ch = sample_channel();
        let now = Utc::now();
        let decision = reconcile(&ch, true, true, Source::Primary, false, Some(now), now);
        assert!(decision.cooldown_active);
        assert!(!decision.start_loop_child);
        assert_eq!(decision.phase, ChannelPhase::Cooldown);
    }

    #[test]
    fn cooldown_expires_after_failover_timeout() {
        let ch = sample_channel();
        let started = Utc::now() - Duration::seconds(11);
        let decision = reconcile(
            &ch,
            true,
            true,
            Source::Primary,
            false,
            Some(started),
            Utc::now(),
        );
        assert!(!decision.cooldown_active);
        assert!(decision.start_loop_child);
    }

    #[test]
    fn preemption_does_not_fire_when_disabled_on_channel() {
        let mut ch = sample_channel();
        ch.primary_override_enabled = false;
        let decision = reconcile(&ch, true, true, Source::Loop, false, None, Utc::now());
        assert_eq!(decision.next_source, Source::Loop);
    }

    #[test]
    fn stability_gate_blocks_preemption_on_single_sample() {
        let ch = sample_channel();
        let decision = reconcile_channel(
            &ch,
            true,
            true,
            Source::Loop,
            false,
            None,
            Utc::now(),
            false, // primary_history_stable_up: not yet stable
            false,
            ReconcilerConfig {
                primary_preempt_requires_stability: true,
            },
        );
        assert_eq!(decision.next_source, Source::Loop);
        assert!(!decision.emit_auto_switch_audit);
    }

    #[test]
    fn stability_gate_allows_preemption_once_stable() {
        let ch = sample_channel();
        let decision = reconcile_channel(
            &ch,
            true,
            true,
            Source::Loop,
            false,
            None,
            Utc::now(),
            true,
            false,
            ReconcilerConfig {
                primary_preempt_requires_stability: true,
            },
        );
        assert_eq!(decision.next_source, Source::Primary);
        assert!(decision.emit_auto_switch_audit);
    }

    #[test]
    fn watchdog_fires_when_primary_stable_down_while_logically_primary() {
        let ch = sample_channel();
        let decision = reconcile_channel(
            &ch,
            false,
            true,
            Source::Primary,
            false,
            None,
            Utc::now(),
            false,
            true,
            ReconcilerConfig::default(),
        );
        assert!(decision.emit_primary_down_watchdog);
        // Watchdog never changes the logical source (spec §4.1).
        assert_eq!(decision.next_source, Source::Primary);
    }

    #[test]
    fn watchdog_silent_when_logical_source_is_loop() {
        let ch = sample_channel();
        let decision = reconcile_channel(
            &ch, false, true, Source::Loop, false, None, Utc::now(), false, true,
            ReconcilerConfig::default(),
        );
        assert!(!decision.emit_primary_down_watchdog);
    }

    #[test]
    fn resolve_source_prefers_store_on_disagreement() {
        let (resolved, corrected) =
            resolve_current_source(Some(Source::Loop), Some(Source::Primary));
        assert_eq!(resolved, Source::Primary);
        assert!(corrected);
    }

    #[test]
    fn resolve_source_defaults_to_loop_when_both_empty() {
        let (resolved, corrected) = resolve_current_source(None, None);
        assert_eq!(resolved, Source::Loop);
        assert!(corrected);
    }
}
