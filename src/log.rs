//! Bounded, newest-first history of finalized phases.

use crate::models::LogEntry;

/// Hard cap on retained entries; the oldest are evicted beyond this.
pub const LOG_CAP: usize = 200;

#[derive(Debug, Default, Clone)]
pub struct SessionLog {
    entries: Vec<LogEntry>,
}

impl SessionLog {
    pub fn from_entries(mut entries: Vec<LogEntry>) -> Self {
        entries.truncate(LOG_CAP);
        Self { entries }
    }

    /// Newest first.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prepends an entry, evicting the oldest beyond the cap.
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(LOG_CAP);
    }

    /// Detail lookup by entry identity.
    pub fn get(&self, id: &str) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
