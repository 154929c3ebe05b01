//! The widget log panel: a capped ring of timestamped, leveled entries.
//!
//! Every component writes its outcome here so the surface can render a small
//! activity feed. Entries also mirror into `tracing` for operators running
//! with a subscriber installed.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Number of entries retained by default, matching the widget log panel.
pub const DEFAULT_JOURNAL_CAPACITY: usize = 50;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Error,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Shared, cheaply clonable handle to the log ring.
#[derive(Clone)]
pub struct Journal {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl Journal {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_JOURNAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(LogLevel::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    fn push(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => tracing::info!(target: "avatarkit", "{message}"),
            LogLevel::Success => tracing::info!(target: "avatarkit", ok = true, "{message}"),
            LogLevel::Error => tracing::error!(target: "avatarkit", "{message}"),
        }
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.push_back(LogEntry {
            at: Utc::now(),
            level,
            message,
        });
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Snapshot of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_drops_oldest_beyond_capacity() {
        let journal = Journal::with_capacity(3);
        for i in 0..5 {
            journal.info(format!("entry {i}"));
        }
        let entries = journal.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "entry 2");
        assert_eq!(entries[2].message, "entry 4");
    }

    #[test]
    fn levels_are_recorded() {
        let journal = Journal::new();
        journal.info("a");
        journal.success("b");
        journal.error("c");
        let levels: Vec<LogLevel> = journal.entries().iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![LogLevel::Info, LogLevel::Success, LogLevel::Error]);
    }

    #[test]
    fn level_labels_are_stable() {
        assert_eq!(LogLevel::Info.label(), "info");
        assert_eq!(LogLevel::Success.label(), "success");
        assert_eq!(LogLevel::Error.label(), "error");
    }
}
