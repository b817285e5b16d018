pub mod config;
pub mod pomodoro;
pub mod reset;
pub mod stats;
pub mod timer;
pub mod todo;

use std::io::BufRead;

use studytracker_core::{fmt_hms, Event};
use tokio::sync::mpsc;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Trimmed stdin lines, read on a plain thread.
///
/// The reader thread is detached: a read still blocked on the terminal when
/// the loop exits must not hold up process shutdown. The channel closes at EOF.
pub fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line.trim().to_string()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Status lines for the events a driver loop does not render itself.
/// Written to stderr so the per-second output on stdout stays clean.
pub fn announce(events: &[Event]) {
    for event in events {
        match event {
            Event::SessionOpened {
                session_id, source, ..
            } => eprintln!("session #{session_id} started ({source})"),
            Event::SessionFinalized {
                session_id,
                duration_secs: Some(secs),
                ..
            } => eprintln!(
                "session #{session_id} recorded: {}",
                fmt_hms(u64::try_from(*secs).unwrap_or(0))
            ),
            Event::StateChanged { state, .. } => eprintln!("timer {state:?}"),
            Event::PhaseCompleted {
                phase,
                skipped: true,
                ..
            } => eprintln!("{phase:?} skipped"),
            Event::PhaseCompleted { phase, .. } => eprintln!("{phase:?} finished"),
            Event::PomodoroReset { .. } => eprintln!("pomodoro reset"),
            _ => {}
        }
    }
}
