//! Tomatick - a focus/break interval timer with a per-focus checklist
//! and a persisted session history.
//!
//! The engine runs behind a mutex, ticked once per second by a background
//! thread; commands are read line by line on the main thread, which also
//! owns audio playback.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

mod audio;
mod engine;
mod log;
mod models;
mod storage;
mod timer;
mod todo;

use audio::AudioNotifier;
use engine::Engine;
use models::{Phase, SoundKind};
use storage::{MemoryBackend, SqliteBackend, StateStore, StorageBackend};
use timer::TimerMessage;

fn main() {
    // Storage trouble degrades to an in-memory session, never an abort.
    let backend: Box<dyn StorageBackend> = match SqliteBackend::open_default() {
        Ok(backend) => Box::new(backend),
        Err(e) => {
            eprintln!("Storage unavailable ({}); state will not persist", e);
            Box::new(MemoryBackend::new())
        }
    };
    let engine = Arc::new(Mutex::new(Engine::load(StateStore::new(backend))));

    // Audio lives on the main thread, like the rest of the output.
    let audio = AudioNotifier::new().ok();

    let (timer_tx, timer_rx) = mpsc::channel();
    let engine_clone = Arc::clone(&engine);
    thread::spawn(move || {
        timer::run_timer_loop(engine_clone, timer_tx);
    });

    let input_rx = spawn_input_thread();

    println!("tomatick — type 'help' for commands");
    print_status(&engine);

    loop {
        while let Ok(msg) = timer_rx.try_recv() {
            match msg {
                TimerMessage::StateChanged { title } => println!("{}", title),
                TimerMessage::Completed(chime) => {
                    if let Some(ref audio) = audio {
                        audio.play(chime);
                    }
                }
            }
        }

        match input_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(line) => {
                if handle_command(&engine, line.trim()) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Forwards stdin lines to the main loop.
fn spawn_input_thread() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}

/// Executes one command line. Returns true on quit.
fn handle_command(engine: &Arc<Mutex<Engine>>, line: &str) -> bool {
    let mut engine = engine.lock().unwrap();
    let (cmd, rest) = match line.split_once(' ') {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };

    match cmd {
        "" => {}
        "start" => {
            engine.start();
            print_engine_status(&engine);
        }
        "pause" => {
            engine.pause();
            print_engine_status(&engine);
        }
        "reset" => {
            engine.reset();
            print_engine_status(&engine);
        }
        "skip" => {
            engine.skip();
            print_engine_status(&engine);
        }
        "phase" => match rest {
            "focus" => engine.switch_phase(Phase::Focus),
            "break" => engine.switch_phase(Phase::Break),
            _ => println!("usage: phase focus|break"),
        },
        "task" => {
            if rest.is_empty() {
                let task = engine.current_task();
                println!("task: {}", if task.is_empty() { "(No task)" } else { task });
            } else {
                engine.set_current_task(rest);
                println!("task: {}", rest);
            }
        }
        "todo" => handle_todo_command(&mut engine, rest),
        "todos" => print_todos(&engine),
        "log" => handle_log_command(&mut engine, rest),
        "set" => handle_set_command(&mut engine, rest),
        "status" => print_engine_status(&engine),
        "help" => print_help(),
        "quit" | "exit" => return true,
        _ => println!("unknown command '{}'; try 'help'", cmd),
    }
    false
}

fn handle_todo_command(engine: &mut Engine, rest: &str) {
    let (sub, arg) = match rest.split_once(' ') {
        Some((sub, arg)) => (sub, arg.trim()),
        None => (rest, ""),
    };
    match sub {
        "add" => {
            engine.add_todo(arg);
            print_todos(engine);
        }
        "done" => match resolve_todo_id(engine, arg) {
            Some(id) => {
                engine.toggle_todo(&id);
                print_todos(engine);
            }
            None => println!("no such todo: {}", arg),
        },
        "rm" => match resolve_todo_id(engine, arg) {
            Some(id) => {
                engine.remove_todo(&id);
                print_todos(engine);
            }
            None => println!("no such todo: {}", arg),
        },
        "cleardone" => {
            engine.clear_completed_todos();
            print_todos(engine);
        }
        _ => println!("usage: todo add <text> | done <n> | rm <n> | cleardone"),
    }
}

/// Accepts a 1-based list position or a raw item id.
fn resolve_todo_id(engine: &Engine, arg: &str) -> Option<String> {
    if let Ok(index) = arg.parse::<usize>() {
        if index >= 1 {
            return engine.todos().items().get(index - 1).map(|i| i.id.clone());
        }
    }
    engine
        .todos()
        .items()
        .iter()
        .find(|i| i.id == arg)
        .map(|i| i.id.clone())
}

fn handle_log_command(engine: &mut Engine, rest: &str) {
    let (sub, arg) = match rest.split_once(' ') {
        Some((sub, arg)) => (sub, arg.trim()),
        None => (rest, ""),
    };
    match sub {
        "" => {
            for entry in engine.log().entries().iter().take(20) {
                println!(
                    "{}  {:<5} {:<9?} {}  ({})",
                    entry.id,
                    entry.phase.label(),
                    entry.reason,
                    timer::format_time(entry.duration_secs),
                    entry.task
                );
            }
            if engine.log().is_empty() {
                println!("(log is empty)");
            }
        }
        "show" => match engine.log().get(arg) {
            Some(entry) => {
                println!("{:#?}", entry);
            }
            None => println!("no such entry: {}", arg),
        },
        "clear" => {
            engine.clear_log();
            println!("log cleared");
        }
        _ => println!("usage: log | log show <id> | log clear"),
    }
}

fn handle_set_command(engine: &mut Engine, rest: &str) {
    let (key, value) = match rest.split_once(' ') {
        Some((key, value)) => (key, value.trim()),
        None => (rest, ""),
    };
    match (key, value.parse::<u32>()) {
        ("focus", Ok(mins)) => {
            engine.set_focus_minutes(mins);
            println!("focus: {} min", engine.settings().focus_mins);
            return;
        }
        ("break", Ok(mins)) => {
            engine.set_break_minutes(mins);
            println!("break: {} min", engine.settings().break_mins);
            return;
        }
        _ => {}
    }
    match key {
        "volume" => match value.parse::<f32>() {
            Ok(volume) => engine.set_volume(volume),
            Err(_) => println!("usage: set volume <0.0-1.0>"),
        },
        "sound" => match value {
            "chime" => engine.set_sound_kind(SoundKind::Chime),
            "beep" => engine.set_sound_kind(SoundKind::Beep),
            "tick" => engine.set_sound_kind(SoundKind::Tick),
            _ => println!("usage: set sound chime|beep|tick"),
        },
        _ => println!("usage: set focus|break <mins> | volume <v> | sound <kind>"),
    }
}

fn print_status(engine: &Arc<Mutex<Engine>>) {
    let engine = engine.lock().unwrap();
    print_engine_status(&engine);
}

fn print_engine_status(engine: &Engine) {
    println!(
        "{}  {}%",
        timer::format_title(engine.phase(), engine.is_running(), engine.remaining_secs()),
        engine.percent_complete()
    );
}

fn print_todos(engine: &Engine) {
    for (i, item) in engine.todos().items().iter().enumerate() {
        println!("{:>2}. [{}] {}", i + 1, if item.done { "x" } else { " " }, item.text);
    }
    if engine.todos().is_empty() {
        println!("(no todos)");
    }
}

fn print_help() {
    println!(
        "commands:\n\
         \x20 start | pause | reset | skip     control the countdown\n\
         \x20 phase focus|break                switch phase while stopped\n\
         \x20 task <text>                      set the current task\n\
         \x20 todo add <text>                  add a checklist item\n\
         \x20 todo done <n> | rm <n>           toggle or remove item n\n\
         \x20 todo cleardone                   drop completed items\n\
         \x20 todos                            list the checklist\n\
         \x20 log | log show <id> | log clear  session history\n\
         \x20 set focus|break <mins>           phase lengths\n\
         \x20 set volume <v> | set sound <k>   alert settings\n\
         \x20 status | quit"
    );
}
