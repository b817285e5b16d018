use std::time::Duration;

use clap::Args;
use studytracker_core::{Config, Event, PomodoroEngine, SessionStore, SnapshotFile};
use tokio::time::MissedTickBehavior;

use super::{announce, stdin_lines, CmdResult};

#[derive(Args)]
pub struct PomodoroArgs {
    /// Subject recorded on study sessions
    #[arg(long, default_value = "")]
    subject: String,
}

pub async fn run(args: PomodoroArgs) -> CmdResult {
    let settings = Config::load()?.pomodoro_settings()?;
    let store = SessionStore::open_default()?;
    let snapshots = SnapshotFile::open_default()?;
    let mut engine = PomodoroEngine::new(store, settings).with_subject(args.subject);

    let closed = engine.finalize_orphans();
    if closed > 0 {
        eprintln!("recorded {closed} unfinished pomodoro session(s) from the last run");
    }
    if let Some(snapshot) = snapshots.take() {
        engine.restore(&snapshot);
    }
    eprintln!("{} {}", engine.phase_label(), engine.countdown());
    eprintln!("commands: p = start/pause, k = skip, r = reset, q = quit");

    let outcome = drive(&mut engine).await;
    // Runs on every exit path, including errors from the loop.
    engine.shutdown_to(&snapshots);
    outcome
}

async fn drive(engine: &mut PomodoroEngine) -> CmdResult {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let mut lines = stdin_lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let events = engine.tick()?;
                render(engine, &events);
            }
            line = lines.recv(), if stdin_open => {
                let events = match line.as_deref() {
                    Some("p") => engine.start_pause()?,
                    Some("k") => engine.skip()?,
                    Some("r") => engine.reset(),
                    Some("q") => return Ok(()),
                    Some("") => Vec::new(),
                    Some(other) => {
                        eprintln!("unknown command: {other}");
                        Vec::new()
                    }
                    None => {
                        stdin_open = false;
                        Vec::new()
                    }
                };
                render(engine, &events);
            }
            _ = &mut ctrl_c => return Ok(()),
        }
    }
}

fn render(engine: &PomodoroEngine, events: &[Event]) {
    announce(events);
    for event in events {
        match event {
            Event::PhaseTick { .. } => {
                println!("{} {}", engine.phase_label(), engine.countdown());
            }
            Event::PhaseEntered { .. } => {
                eprintln!("-> {} {}", engine.phase_label(), engine.countdown());
            }
            Event::PhaseRunning { running: false, .. } => {
                eprintln!("paused at {}", engine.countdown());
            }
            _ => {}
        }
    }
}
