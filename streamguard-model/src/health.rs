use std::collections::VecDeque;

/// Per `(channel, ingress)` bounded FIFO of liveness samples (spec §3).
///
/// `stable_up()`/`stable_down()` require every sample in the window to
/// agree; a history shorter than `stability_window` (still filling up) is
/// neither stable-up nor stable-down.
#[derive(Debug, Clone)]
pub struct HealthHistory {
    samples: VecDeque<bool>,
    capacity: usize,
}

impl HealthHistory {
    pub fn new(stability_window: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(stability_window.max(1)),
            capacity: stability_window.max(1),
        }
    }

    pub fn push(&mut self, up: bool) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(up);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    /// `true` iff every sample in the window is `true`.
    pub fn stable_up(&self) -> bool {
        self.is_full() && self.samples.iter().all(|&b| b)
    }

    /// `true` iff every sample in the window is `false`.
    pub fn stable_down(&self) -> bool {
        self.is_full() && self.samples.iter().all(|&b| !b)
    }

    pub fn latest(&self) -> Option<bool> {
        self.samples.back().copied()
    }
}

/// A single channel's row from MS `GET /streams`, as parsed into the map
/// described in spec §4.1.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservedStream {
    pub publishing: bool,
    pub recv_kbps: u32,
    pub width: u32,
    pub height: u32,
}

impl ObservedStream {
    /// `loop_up = publishing AND (recv_kbps > 0 OR width > 0)` (spec §4.1).
    pub fn loop_up(&self) -> bool {
        self.publishing && (self.recv_kbps > 0 || self.width > 0)
    }

    /// `primary_up = publishing AND recv_kbps > THRESHOLD_KBPS` (spec §4.1, THRESHOLD=100).
    pub fn primary_up(&self, threshold_kbps: u32) -> bool {
        self.publishing && self.recv_kbps > threshold_kbps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_is_not_stable() {
        let h = HealthHistory::new(3);
        assert!(!h.stable_up());
        assert!(!h.stable_down());
    }

    #[test]
    fn partial_history_is_not_stable() {
        let mut h = HealthHistory::new(3);
        h.push(true);
        h.push(true);
        assert!(!h.stable_up());
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn full_true_history_is_stable_up() {
        let mut h = HealthHistory::new(3);
        for _ in 0..3 {
            h.push(true);
        }
        assert!(h.stable_up());
        assert!(!h.stable_down());
    }

    #[test]
    fn window_evicts_oldest_sample() {
        let mut h = HealthHistory::new(2);
        h.push(false);
        h.push(true);
        h.push(true);
        assert_eq!(h.len(), 2);
        assert!(h.stable_up());
    }

    #[test]
    fn stability_window_one_reduces_to_single_sample() {
        let mut h = HealthHistory::new(1);
        h.push(false);
        assert!(h.stable_down());
        h.push(true);
        assert!(h.stable_up());
    }

    #[test]
    fn loop_up_accepts_width_without_bitrate() {
        let obs = ObservedStream {
            publishing: true,
            recv_kbps: 0,
            width: 1280,
            height: 720,
        };
        assert!(obs.loop_up());
    }

    #[test]
    fn primary_up_requires_threshold() {
        let obs = ObservedStream {
            publishing: true,
            recv_kbps: 100,
            width: 0,
            height: 0,
        };
        assert!(!obs.primary_up(100));
        let obs = ObservedStream {
            recv_kbps: 101,
            ..obs
        };
        assert!(obs.primary_up(100));
    }
}
