//! Checklist scoped to the active focus window.

use crate::models::TodoItem;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique id for a fresh item: end-of-millisecond timestamp plus a
/// process-wide sequence so items created in the same millisecond differ.
fn fresh_id() -> String {
    let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", Utc::now().timestamp_millis(), seq)
}

/// Ordered checklist. Mutations rebuild the list; readers only ever see
/// owned snapshots, so a held snapshot never changes underneath a caller.
#[derive(Debug, Default, Clone)]
pub struct TodoList {
    items: Vec<TodoItem>,
}

impl TodoList {
    pub fn from_items(items: Vec<TodoItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    /// Owned copy of the current list, for log snapshots and display.
    pub fn snapshot(&self) -> Vec<TodoItem> {
        self.items.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Prepends a new item. Whitespace-only input is ignored.
    /// Returns true if the list changed.
    pub fn add(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.push(TodoItem {
            id: fresh_id(),
            text: text.to_string(),
            done: false,
        });
        items.extend(self.items.iter().cloned());
        self.items = items;
        true
    }

    /// Flips `done` on the matching item. No-op when the id is unknown.
    pub fn toggle(&mut self, id: &str) -> bool {
        let mut changed = false;
        self.items = self
            .items
            .iter()
            .map(|item| {
                if item.id == id {
                    changed = true;
                    TodoItem {
                        done: !item.done,
                        ..item.clone()
                    }
                } else {
                    item.clone()
                }
            })
            .collect();
        changed
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    pub fn clear_completed(&mut self) -> bool {
        let before = self.items.len();
        self.items.retain(|item| !item.done);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
