//! Tick loop driving the engine, plus status-line formatting.

use crate::engine::{Chime, Engine};
use crate::models::Phase;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Message sent from the tick thread to the main thread.
#[derive(Debug, Clone)]
pub enum TimerMessage {
    /// Visible state changed; the status line needs a refresh.
    StateChanged { title: String },
    /// A phase ran to completion; play its alert tone.
    Completed(Chime),
}

/// Runs the tick loop, advancing the engine once per second. A stopped
/// engine makes the tick a no-op, so pause and reset effectively cancel
/// the pending tick.
pub fn run_timer_loop(engine: Arc<Mutex<Engine>>, tx: Sender<TimerMessage>) {
    loop {
        thread::sleep(Duration::from_secs(1));

        let message = {
            let mut engine = engine.lock().unwrap();
            let (changed, chime) = engine.tick();

            if let Some(chime) = chime {
                let _ = tx.send(TimerMessage::Completed(chime));
            }

            if changed {
                let title =
                    format_title(engine.phase(), engine.is_running(), engine.remaining_secs());
                Some(TimerMessage::StateChanged { title })
            } else {
                None
            }
        };

        if let Some(msg) = message {
            let _ = tx.send(msg);
        }
    }
}

/// Status line for the display collaborator. Purely cosmetic; consumes
/// only phase, running flag, and remaining seconds.
pub fn format_title(phase: Phase, running: bool, remaining_secs: u32) -> String {
    let marker = match (phase, running) {
        (_, false) => "⏸",
        (Phase::Focus, true) => "🍅",
        (Phase::Break, true) => "☕",
    };
    format!("{} {} {}", marker, phase.label(), format_time(remaining_secs))
}

/// Formats seconds as MM:SS.
pub fn format_time(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
