//! Session event log
//!
//! Ordered, timestamped messages for the operator (phase changes, detected
//! blockages, transport trouble). This is separate from `tracing` output:
//! the event log is what the shell shows in its log view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// One immutable log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Append-only log with an optional retention cap.
///
/// Every call takes the internal lock once, so an append never interleaves
/// with a snapshot.
#[derive(Debug)]
pub struct EventLog {
    entries: Mutex<VecDeque<LogEntry>>,
    /// 0 = unbounded
    max_entries: usize,
}

impl EventLog {
    /// Create a log that keeps at most `max_entries` (0 keeps everything).
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_entries,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(|e| {
            warn!("Mutex poisoned on EventLog, recovering");
            e.into_inner()
        })
    }

    /// Append a message stamped with the current time.
    pub fn append(&self, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            message: message.into(),
        };
        let mut entries = self.lock();
        if self.max_entries > 0 && entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Copy of the entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(crate::config::defaults::LOG_MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_append_preserves_order() {
        let log = EventLog::unbounded();
        log.append("first");
        log.append("second".to_string());
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].message, "second");
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[test]
    fn test_clear() {
        let log = EventLog::unbounded();
        log.append("a");
        log.clear();
        assert!(log.is_empty());
        log.append("b");
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_retention_cap_drops_oldest() {
        let log = EventLog::new(3);
        for i in 0..5 {
            log.append(format!("msg {i}"));
        }
        let messages: Vec<_> = log.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["msg 2", "msg 3", "msg 4"]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let log = EventLog::unbounded();
        log.append("a");
        let snapshot = log.entries();
        log.append("b");
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_concurrent_appends() {
        let log = Arc::new(EventLog::unbounded());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        log.append(format!("{t}-{i}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(log.len(), 400);
    }

    #[test]
    fn test_entry_display() {
        let entry = LogEntry {
            timestamp: DateTime::parse_from_rfc3339("2024-03-01T08:15:42Z")
                .unwrap()
                .with_timezone(&Utc),
            message: "Learning started".to_string(),
        };
        assert_eq!(entry.to_string(), "[08:15:42] Learning started");
    }
}
