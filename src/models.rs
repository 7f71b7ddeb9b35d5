//! Data models for the Tomatick timer.

use serde::{Deserialize, Serialize};

/// The two kinds of interval the timer alternates between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Focus,
    Break,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Focus => "Focus",
            Phase::Break => "Break",
        }
    }
}

/// Alert tone played when a phase runs to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundKind {
    #[default]
    Chime,
    Beep,
    Tick,
}

/// User-configurable settings.
///
/// Minutes below 1 are clamped up at the setter level; there is no upper
/// clamp in the core, and out-of-range persisted values are loaded as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Length of a focus window in minutes.
    pub focus_mins: u32,
    /// Length of a break in minutes.
    pub break_mins: u32,
    /// Alert volume, 0.0 to 1.0.
    pub volume: f32,
    /// Which alert tone to play.
    pub sound_kind: SoundKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            focus_mins: 25,
            break_mins: 5,
            volume: 0.6,
            sound_kind: SoundKind::Chime,
        }
    }
}

impl Settings {
    /// Total seconds for the given phase, read live from the current values.
    pub fn total_secs_for(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Focus => self.focus_mins * 60,
            Phase::Break => self.break_mins * 60,
        }
    }
}

/// One checklist item, scoped to the active focus window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub text: String,
    pub done: bool,
}

/// Why a phase was closed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalizeReason {
    Completed,
    Reset,
    Skipped,
}

/// A finalized phase as recorded in the session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique id derived from the end timestamp.
    pub id: String,
    pub phase: Phase,
    /// Task text; "(No task)" for an untitled focus window, "—" for breaks.
    pub task: String,
    /// Epoch milliseconds.
    pub start_ms: i64,
    /// Epoch milliseconds.
    pub end_ms: i64,
    pub duration_secs: u32,
    pub reason: FinalizeReason,
    /// Checklist as it stood at finalize time.
    pub todos: Vec<TodoItem>,
}

/// Percent complete for display: round(100 × (total − remaining) / total).
pub fn percent_complete(remaining_secs: u32, total_secs: u32) -> u32 {
    if total_secs == 0 {
        return 100;
    }
    let elapsed = total_secs.saturating_sub(remaining_secs);
    (100.0 * elapsed as f64 / total_secs as f64).round() as u32
}
