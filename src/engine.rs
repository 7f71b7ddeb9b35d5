//! Phase-timer state machine and session finalizer.

use crate::log::SessionLog;
use crate::models::{percent_complete, FinalizeReason, LogEntry, Phase, Settings, SoundKind};
use crate::storage::{slot, StateStore};
use crate::todo::TodoList;
use chrono::Utc;

/// Minutes below this are clamped up on input. There is no upper clamp
/// in the core; the input layer carries the maximum hints.
const MIN_PHASE_MINS: u32 = 1;

/// Request for the audio collaborator. Fire-and-forget; the engine never
/// hears back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chime {
    pub kind: SoundKind,
    pub volume: f32,
}

/// What ended a phase and asks for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The countdown ran out.
    Expired,
    /// The user skipped the rest of the phase.
    Skipped,
}

struct Transition {
    next: Phase,
    auto_start: bool,
    chime: bool,
}

/// The automatic flip chain as an explicit table. The match is exhaustive
/// over (phase, trigger), so a new phase or trigger cannot be forgotten.
fn transition(phase: Phase, trigger: Trigger) -> Transition {
    match (phase, trigger) {
        (Phase::Focus, Trigger::Expired) => Transition {
            next: Phase::Break,
            auto_start: true,
            chime: true,
        },
        (Phase::Focus, Trigger::Skipped) => Transition {
            next: Phase::Break,
            auto_start: true,
            chime: false,
        },
        (Phase::Break, Trigger::Expired) => Transition {
            next: Phase::Focus,
            auto_start: true,
            chime: true,
        },
        (Phase::Break, Trigger::Skipped) => Transition {
            next: Phase::Focus,
            auto_start: true,
            chime: false,
        },
    }
}

/// Countdown state machine plus everything a finalized phase touches:
/// settings, the current task, the checklist, and the session log.
///
/// Totals are always read live from settings; editing a duration mid-run
/// shifts the total (and percent complete) immediately.
pub struct Engine {
    phase: Phase,
    running: bool,
    remaining_secs: u32,
    session_start_ms: Option<i64>,
    settings: Settings,
    current_task: String,
    todos: TodoList,
    log: SessionLog,
    store: StateStore,
    /// Single-flight finalize guard; a nested call is dropped.
    finalizing: bool,
}

impl Engine {
    /// Loads all state slots, falling back to defaults per slot.
    /// The timer always loads paused.
    pub fn load(store: StateStore) -> Self {
        let defaults = Settings::default();
        let settings = Settings {
            focus_mins: store.load(slot::FOCUS_MINUTES, defaults.focus_mins),
            break_mins: store.load(slot::BREAK_MINUTES, defaults.break_mins),
            volume: store.load(slot::VOLUME, defaults.volume),
            sound_kind: store.load(slot::SOUND_KIND, defaults.sound_kind),
        };
        let phase = store.load(slot::PHASE, Phase::Focus);
        let remaining_secs = store.load(slot::REMAINING_SECS, settings.total_secs_for(phase));
        let current_task = store.load(slot::CURRENT_TASK, String::new());
        let todos = TodoList::from_items(store.load(slot::TODOS, Vec::new()));
        let log = SessionLog::from_entries(store.load(slot::SESSION_LOG, Vec::new()));

        Self {
            phase,
            running: false,
            remaining_secs,
            session_start_ms: None,
            settings,
            current_task,
            todos,
            log,
            store,
            finalizing: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn current_task(&self) -> &str {
        &self.current_task
    }

    pub fn todos(&self) -> &TodoList {
        &self.todos
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    /// Live total for the given phase.
    pub fn total_for(&self, phase: Phase) -> u32 {
        self.settings.total_secs_for(phase)
    }

    pub fn percent_complete(&self) -> u32 {
        percent_complete(self.remaining_secs, self.total_for(self.phase))
    }

    /// Starts (or resumes) the countdown. A spent countdown is reset to
    /// the full phase length first.
    pub fn start(&mut self) {
        if self.remaining_secs == 0 {
            self.remaining_secs = self.total_for(self.phase);
        }
        self.session_start_ms = Some(Utc::now().timestamp_millis());
        self.running = true;
        self.persist_timer();
    }

    /// Stops the countdown in place. Never logs.
    pub fn pause(&mut self) {
        self.running = false;
        self.session_start_ms = None;
        self.persist_timer();
    }

    /// Advances the countdown by one second. Returns whether visible state
    /// changed and, on a completed phase, the chime to play.
    pub fn tick(&mut self) -> (bool, Option<Chime>) {
        if !self.running {
            return (false, None);
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.running = false;
            let chime = self.finalize(FinalizeReason::Completed, true);
            (true, chime)
        } else {
            self.store.save(slot::REMAINING_SECS, &self.remaining_secs);
            (true, None)
        }
    }

    /// Abandons the current attempt. Logs the elapsed time if any progress
    /// was made, then rewinds to a full, stopped countdown in the same phase.
    pub fn reset(&mut self) {
        if self.remaining_secs < self.total_for(self.phase) {
            self.finalize(FinalizeReason::Reset, false);
        }
        self.running = false;
        self.session_start_ms = None;
        self.remaining_secs = self.total_for(self.phase);
        self.persist_timer();
    }

    /// Ends the current phase early. Always logs exactly one entry, always
    /// flips phase, and always leaves the new phase running. No chime.
    pub fn skip(&mut self) {
        self.finalize(FinalizeReason::Skipped, false);
        let t = transition(self.phase, Trigger::Skipped);
        self.phase = t.next;
        self.remaining_secs = self.total_for(t.next);
        self.running = t.auto_start;
        self.persist_timer();
    }

    /// Manual phase selection. Only honored while stopped; never logs.
    pub fn switch_phase(&mut self, target: Phase) {
        if self.running {
            return;
        }
        self.phase = target;
        self.remaining_secs = self.total_for(target);
        self.persist_timer();
    }

    pub fn set_focus_minutes(&mut self, mins: u32) {
        self.settings.focus_mins = mins.max(MIN_PHASE_MINS);
        self.store.save(slot::FOCUS_MINUTES, &self.settings.focus_mins);
        self.reconcile_remaining();
    }

    pub fn set_break_minutes(&mut self, mins: u32) {
        self.settings.break_mins = mins.max(MIN_PHASE_MINS);
        self.store.save(slot::BREAK_MINUTES, &self.settings.break_mins);
        self.reconcile_remaining();
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.settings.volume = volume;
        self.store.save(slot::VOLUME, &self.settings.volume);
    }

    pub fn set_sound_kind(&mut self, kind: SoundKind) {
        self.settings.sound_kind = kind;
        self.store.save(slot::SOUND_KIND, &kind);
    }

    pub fn set_current_task(&mut self, text: &str) {
        self.current_task = text.to_string();
        self.store.save(slot::CURRENT_TASK, &self.current_task);
    }

    pub fn add_todo(&mut self, text: &str) {
        if self.todos.add(text) {
            self.persist_todos();
        }
    }

    pub fn toggle_todo(&mut self, id: &str) {
        if self.todos.toggle(id) {
            self.persist_todos();
        }
    }

    pub fn remove_todo(&mut self, id: &str) {
        if self.todos.remove(id) {
            self.persist_todos();
        }
    }

    pub fn clear_completed_todos(&mut self) {
        if self.todos.clear_completed() {
            self.persist_todos();
        }
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
        self.store.save(slot::SESSION_LOG, &self.log.entries());
    }

    /// A duration edit while stopped rewinds the countdown to the new full
    /// length of the current phase. Mid-run, the countdown is left alone
    /// and only the live total shifts.
    fn reconcile_remaining(&mut self) {
        if !self.running {
            self.remaining_secs = self.total_for(self.phase);
            self.store.save(slot::REMAINING_SECS, &self.remaining_secs);
        }
    }

    /// Closes out the current phase and records it.
    ///
    /// Elapsed time is measured against the live total and clamped into
    /// 0..=total, so a mid-run settings edit cannot produce a negative or
    /// oversized duration. A completed phase is always credited its full
    /// total. Finalizing a focus phase clears the checklist no matter the
    /// reason. With `auto_switch` on a completed phase, the transition
    /// table flips the phase and leaves the countdown running, which keeps
    /// the unattended focus → break → focus chain going.
    fn finalize(&mut self, reason: FinalizeReason, auto_switch: bool) -> Option<Chime> {
        if self.finalizing {
            return None;
        }
        self.finalizing = true;

        let total = self.total_for(self.phase);
        let end_ms = Utc::now().timestamp_millis();
        let elapsed = (total as i64 - self.remaining_secs as i64).clamp(0, total as i64) as u32;
        let duration_secs = if reason == FinalizeReason::Completed {
            total
        } else {
            elapsed
        };
        let start_ms = self
            .session_start_ms
            .unwrap_or(end_ms - duration_secs as i64 * 1000);
        let task = match self.phase {
            Phase::Focus => {
                if self.current_task.trim().is_empty() {
                    "(No task)".to_string()
                } else {
                    self.current_task.clone()
                }
            }
            Phase::Break => "—".to_string(),
        };

        self.log.push(LogEntry {
            id: end_ms.to_string(),
            phase: self.phase,
            task,
            start_ms,
            end_ms,
            duration_secs,
            reason,
            todos: self.todos.snapshot(),
        });
        self.store.save(slot::SESSION_LOG, &self.log.entries());

        // The checklist is scoped to one focus attempt.
        if self.phase == Phase::Focus {
            self.todos.clear();
            self.persist_todos();
        }

        self.session_start_ms = None;

        let chime = if reason == FinalizeReason::Completed && auto_switch {
            let t = transition(self.phase, Trigger::Expired);
            self.phase = t.next;
            self.remaining_secs = self.total_for(t.next);
            self.running = t.auto_start;
            self.persist_timer();
            t.chime.then_some(Chime {
                kind: self.settings.sound_kind,
                volume: self.settings.volume,
            })
        } else {
            None
        };

        self.finalizing = false;
        chime
    }

    fn persist_timer(&self) {
        self.store.save(slot::PHASE, &self.phase);
        self.store.save(slot::REMAINING_SECS, &self.remaining_secs);
    }

    fn persist_todos(&self) {
        self.store.save(slot::TODOS, &self.todos.items());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    fn test_engine() -> Engine {
        Engine::load(StateStore::new(Box::new(MemoryBackend::new())))
    }

    fn tick_n(engine: &mut Engine, n: u32) -> Option<Chime> {
        let mut last_chime = None;
        for _ in 0..n {
            let (_, chime) = engine.tick();
            if chime.is_some() {
                last_chime = chime;
            }
        }
        last_chime
    }

    #[test]
    fn test_initial_state() {
        let engine = test_engine();
        assert_eq!(engine.phase(), Phase::Focus);
        assert!(!engine.is_running());
        assert_eq!(engine.remaining_secs(), 1500);
        assert_eq!(engine.settings(), &Settings::default());
        assert!(engine.log().is_empty());
        assert!(engine.todos().is_empty());
    }

    #[test]
    fn test_start_and_tick() {
        let mut engine = test_engine();
        engine.start();
        assert!(engine.is_running());

        let (changed, chime) = engine.tick();
        assert!(changed);
        assert!(chime.is_none());
        assert_eq!(engine.remaining_secs(), 1499);
    }

    #[test]
    fn test_tick_is_noop_while_stopped() {
        let mut engine = test_engine();
        let (changed, chime) = engine.tick();
        assert!(!changed);
        assert!(chime.is_none());
        assert_eq!(engine.remaining_secs(), 1500);

        engine.start();
        engine.tick();
        engine.pause();
        let (changed, _) = engine.tick();
        assert!(!changed);
        assert_eq!(engine.remaining_secs(), 1499);
    }

    #[test]
    fn test_pause_clears_session_start() {
        let mut engine = test_engine();
        engine.start();
        assert!(engine.session_start_ms.is_some());
        engine.pause();
        assert!(!engine.is_running());
        assert!(engine.session_start_ms.is_none());
        assert!(engine.log().is_empty());
    }

    #[test]
    fn test_focus_completion_flips_and_auto_starts() {
        let mut engine = test_engine();
        engine.set_focus_minutes(1);
        engine.start();

        let chime = tick_n(&mut engine, 60);

        assert_eq!(engine.phase(), Phase::Break);
        assert!(engine.is_running());
        assert_eq!(engine.remaining_secs(), 300);
        assert_eq!(
            chime,
            Some(Chime {
                kind: SoundKind::Chime,
                volume: 0.6
            })
        );

        assert_eq!(engine.log().len(), 1);
        let entry = &engine.log().entries()[0];
        assert_eq!(entry.phase, Phase::Focus);
        assert_eq!(entry.reason, FinalizeReason::Completed);
        assert_eq!(entry.duration_secs, 60);
        assert_eq!(entry.task, "(No task)");
    }

    #[test]
    fn test_full_cycle_scenario() {
        // 25-minute focus, 5-minute break; 1500 ticks end the focus phase.
        let mut engine = test_engine();
        engine.start();
        tick_n(&mut engine, 1500);

        assert_eq!(engine.phase(), Phase::Break);
        assert_eq!(engine.remaining_secs(), 300);
        assert!(engine.is_running());
        let entry = &engine.log().entries()[0];
        assert_eq!(entry.phase, Phase::Focus);
        assert_eq!(entry.reason, FinalizeReason::Completed);
        assert_eq!(entry.duration_secs, 1500);

        // The chain keeps going unattended: the break runs out on its own.
        tick_n(&mut engine, 300);
        assert_eq!(engine.phase(), Phase::Focus);
        assert!(engine.is_running());
        assert_eq!(engine.remaining_secs(), 1500);
        assert_eq!(engine.log().len(), 2);
        let entry = &engine.log().entries()[0];
        assert_eq!(entry.phase, Phase::Break);
        assert_eq!(entry.task, "—");
        assert_eq!(entry.duration_secs, 300);
    }

    #[test]
    fn test_auto_started_phase_gets_derived_start_timestamp() {
        let mut engine = test_engine();
        engine.set_focus_minutes(1);
        engine.set_break_minutes(1);
        engine.start();
        tick_n(&mut engine, 60);

        // The auto-started break never saw start(), so its start timestamp
        // is derived from end − duration.
        assert!(engine.session_start_ms.is_none());
        tick_n(&mut engine, 60);
        let entry = &engine.log().entries()[0];
        assert_eq!(entry.phase, Phase::Break);
        assert_eq!(entry.start_ms, entry.end_ms - 60_000);
    }

    #[test]
    fn test_reset_mid_run_logs_elapsed() {
        let mut engine = test_engine();
        engine.start();
        tick_n(&mut engine, 600);
        assert_eq!(engine.remaining_secs(), 900);

        engine.reset();

        assert_eq!(engine.log().len(), 1);
        let entry = &engine.log().entries()[0];
        assert_eq!(entry.reason, FinalizeReason::Reset);
        assert_eq!(entry.duration_secs, 600);
        assert_eq!(engine.phase(), Phase::Focus);
        assert_eq!(engine.remaining_secs(), 1500);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_reset_at_full_remaining_does_not_log() {
        let mut engine = test_engine();
        engine.reset();
        assert!(engine.log().is_empty());

        engine.start();
        engine.reset();
        assert!(engine.log().is_empty());
        assert!(!engine.is_running());
    }

    #[test]
    fn test_skip_always_logs_flips_and_runs() {
        let mut engine = test_engine();
        engine.start();
        tick_n(&mut engine, 90);

        engine.skip();

        assert_eq!(engine.log().len(), 1);
        let entry = &engine.log().entries()[0];
        assert_eq!(entry.reason, FinalizeReason::Skipped);
        assert_eq!(entry.duration_secs, 90);
        assert_eq!(engine.phase(), Phase::Break);
        assert!(engine.is_running());
        assert_eq!(engine.remaining_secs(), 300);

        // Skipping an untouched phase still logs, with zero duration.
        engine.pause();
        engine.skip();
        assert_eq!(engine.log().len(), 2);
        assert_eq!(engine.log().entries()[0].duration_secs, 0);
        assert_eq!(engine.phase(), Phase::Focus);
        assert!(engine.is_running());
    }

    #[test]
    fn test_focus_finalize_clears_todos_regardless_of_reason() {
        let mut engine = test_engine();
        engine.add_todo("Draft outline");
        engine.add_todo("Send email");
        engine.start();
        tick_n(&mut engine, 30);

        engine.reset();

        assert!(engine.todos().is_empty());
        // The snapshot in the entry still holds the list as it stood.
        let entry = &engine.log().entries()[0];
        assert_eq!(entry.todos.len(), 2);
        assert_eq!(entry.todos[0].text, "Send email");
    }

    #[test]
    fn test_break_finalize_leaves_todos_untouched() {
        let mut engine = test_engine();
        engine.switch_phase(Phase::Break);
        engine.add_todo("Survives the break");
        engine.start();
        tick_n(&mut engine, 10);

        engine.skip();

        assert_eq!(engine.log().entries()[0].phase, Phase::Break);
        assert_eq!(engine.todos().len(), 1);
    }

    #[test]
    fn test_current_task_recorded_and_kept() {
        let mut engine = test_engine();
        engine.set_current_task("Write quarterly report");
        engine.start();
        engine.skip();

        assert_eq!(engine.log().entries()[0].task, "Write quarterly report");
        // The task is not auto-cleared between focus windows.
        assert_eq!(engine.current_task(), "Write quarterly report");
    }

    #[test]
    fn test_blank_task_recorded_as_placeholder() {
        let mut engine = test_engine();
        engine.set_current_task("   ");
        engine.start();
        engine.skip();
        assert_eq!(engine.log().entries()[0].task, "(No task)");
    }

    #[test]
    fn test_switch_phase_only_while_stopped() {
        let mut engine = test_engine();
        engine.switch_phase(Phase::Break);
        assert_eq!(engine.phase(), Phase::Break);
        assert_eq!(engine.remaining_secs(), 300);
        assert!(engine.log().is_empty());

        engine.start();
        engine.switch_phase(Phase::Focus);
        assert_eq!(engine.phase(), Phase::Break);
    }

    #[test]
    fn test_duration_edit_while_stopped_rewinds_countdown() {
        let mut engine = test_engine();
        engine.start();
        tick_n(&mut engine, 100);
        engine.pause();

        engine.set_focus_minutes(30);
        assert_eq!(engine.remaining_secs(), 1800);
    }

    #[test]
    fn test_duration_edit_mid_run_shifts_total_only() {
        let mut engine = test_engine();
        engine.start();
        tick_n(&mut engine, 10);

        engine.set_focus_minutes(50);
        assert_eq!(engine.remaining_secs(), 1490);
        // 3000 − 1490 = 1510 elapsed against the new live total.
        assert_eq!(engine.percent_complete(), 50);
    }

    #[test]
    fn test_minutes_clamped_up_to_minimum() {
        let mut engine = test_engine();
        engine.set_focus_minutes(0);
        assert_eq!(engine.settings().focus_mins, 1);
        engine.set_break_minutes(0);
        assert_eq!(engine.settings().break_mins, 1);
    }

    #[test]
    fn test_shrinking_duration_mid_run_clamps_elapsed() {
        let mut engine = test_engine();
        engine.start();
        tick_n(&mut engine, 10);

        // Remaining (1490) now exceeds the live total (60).
        engine.set_focus_minutes(1);
        engine.skip();

        let entry = &engine.log().entries()[0];
        assert_eq!(entry.duration_secs, 0);
    }

    #[test]
    fn test_start_with_spent_countdown_resets_to_full() {
        let mut engine = test_engine();
        engine.remaining_secs = 0;
        engine.start();
        assert_eq!(engine.remaining_secs(), 1500);
        assert!(engine.is_running());
    }

    #[test]
    fn test_chime_carries_configured_sound_and_volume() {
        let mut engine = test_engine();
        engine.set_sound_kind(SoundKind::Beep);
        engine.set_volume(0.3);
        engine.set_focus_minutes(1);
        engine.start();

        let chime = tick_n(&mut engine, 60).unwrap();
        assert_eq!(chime.kind, SoundKind::Beep);
        assert_eq!(chime.volume, 0.3);
    }

    #[test]
    fn test_skip_never_chimes() {
        let mut engine = test_engine();
        engine.start();
        engine.skip();
        // The skip transition plays no sound; only a natural expiry does.
        let t = transition(Phase::Focus, Trigger::Skipped);
        assert!(!t.chime);
        assert!(t.auto_start);
    }

    #[test]
    fn test_transition_table() {
        let t = transition(Phase::Focus, Trigger::Expired);
        assert_eq!(t.next, Phase::Break);
        assert!(t.auto_start && t.chime);

        let t = transition(Phase::Break, Trigger::Expired);
        assert_eq!(t.next, Phase::Focus);
        assert!(t.auto_start && t.chime);

        let t = transition(Phase::Break, Trigger::Skipped);
        assert_eq!(t.next, Phase::Focus);
        assert!(t.auto_start && !t.chime);
    }

    #[test]
    fn test_nested_finalize_is_dropped() {
        let mut engine = test_engine();
        engine.start();
        tick_n(&mut engine, 10);

        engine.finalizing = true;
        assert!(engine.finalize(FinalizeReason::Skipped, false).is_none());
        assert!(engine.log().is_empty());

        engine.finalizing = false;
        engine.finalize(FinalizeReason::Skipped, false);
        assert_eq!(engine.log().len(), 1);
    }

    #[test]
    fn test_log_cap_through_engine() {
        let mut engine = test_engine();
        for _ in 0..210 {
            engine.skip();
        }
        assert_eq!(engine.log().len(), crate::log::LOG_CAP);
    }

    #[test]
    fn test_state_survives_reload() {
        let backend = MemoryBackend::new();
        {
            let mut engine = Engine::load(StateStore::new(Box::new(backend.clone())));
            engine.set_focus_minutes(40);
            engine.set_sound_kind(SoundKind::Tick);
            engine.set_current_task("Review patches");
            engine.add_todo("Patch one");
            engine.start();
            tick_n(&mut engine, 5);
            engine.skip();
        }

        let engine = Engine::load(StateStore::new(Box::new(backend)));
        assert_eq!(engine.settings().focus_mins, 40);
        assert_eq!(engine.settings().sound_kind, SoundKind::Tick);
        assert_eq!(engine.current_task(), "Review patches");
        // The skip finalized the focus phase, so the checklist was cleared
        // and the persisted phase is the auto-started break.
        assert!(engine.todos().is_empty());
        assert_eq!(engine.phase(), Phase::Break);
        assert_eq!(engine.remaining_secs(), 300);
        assert!(!engine.is_running());
        assert_eq!(engine.log().len(), 1);
        assert_eq!(engine.log().entries()[0].todos.len(), 1);
    }
}
