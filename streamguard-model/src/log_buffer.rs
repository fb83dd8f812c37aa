use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Severity of a [`LogEntry`], separate from `tracing::Level` so the
/// admin-facing ring buffer can be filtered (`GET /logs?level`) without
/// reaching into the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub component: String,
    pub message: String,
}

/// Process-wide ring buffer of the last 1,000 log entries (spec §3),
/// guarded by its own lock at the call site (`streamguard-core::observability`)
/// with a monotonic id counter living alongside it, mirroring the teacher's
/// `ScanRunAggregator` history buffer (`infra/scan/scan_manager.rs`).
#[derive(Debug)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_id: AtomicU64,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn push(&mut self, level: LogLevel, component: impl Into<String>, message: impl Into<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            id,
            timestamp: Utc::now(),
            level,
            component: component.into(),
            message: message.into(),
        });
    }

    pub fn recent(&self, level: Option<LogLevel>, limit: usize) -> Vec<LogEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| level.is_none_or(|l| e.level >= l))
            .take(limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut buf = LogBuffer::new(2);
        buf.push(LogLevel::Info, "reconciler", "one");
        buf.push(LogLevel::Info, "reconciler", "two");
        buf.push(LogLevel::Info, "reconciler", "three");
        let all = buf.recent(None, 10);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].message, "three");
        assert_eq!(all[1].message, "two");
    }

    #[test]
    fn ids_are_monotonic() {
        let mut buf = LogBuffer::new(10);
        buf.push(LogLevel::Debug, "x", "a");
        buf.push(LogLevel::Debug, "x", "b");
        let all = buf.recent(None, 10);
        assert!(all[0].id > all[1].id);
    }

    #[test]
    fn filters_by_minimum_level() {
        let mut buf = LogBuffer::new(10);
        buf.push(LogLevel::Debug, "x", "debug-msg");
        buf.push(LogLevel::Error, "x", "error-msg");
        let errors_only = buf.recent(Some(LogLevel::Error), 10);
        assert_eq!(errors_only.len(), 1);
        assert_eq!(errors_only[0].message, "error-msg");
    }
}
