use std::time::Duration;

use clap::Args;
use studytracker_core::{fmt_hms, Config, Event, SessionStore, TimerEngine};
use tokio::time::MissedTickBehavior;

use super::{announce, stdin_lines, CmdResult};

#[derive(Args)]
pub struct TimerArgs {
    /// Subject recorded on a new session
    #[arg(long, default_value = "")]
    subject: String,
    /// Free-form note recorded on a new session
    #[arg(long, default_value = "")]
    note: String,
    /// Come up paused instead of counting immediately
    #[arg(long)]
    paused: bool,
}

enum Exit {
    Stop,
    Quit,
}

pub async fn run(args: TimerArgs) -> CmdResult {
    let config = Config::load_or_default();
    let store = SessionStore::open_default()?;
    let mut engine = TimerEngine::new(store)
        .with_labels(args.subject, args.note)
        .with_checkpoint_interval(config.timer.checkpoint_interval_secs);

    let recovered = engine.resume_active_session(args.paused)?;
    if recovered.is_empty() {
        announce(&engine.start()?);
        if args.paused {
            announce(engine.pause().as_slice());
        }
    } else {
        eprintln!(
            "resumed open session at {}",
            fmt_hms(engine.elapsed_secs())
        );
        announce(&recovered);
    }
    eprintln!("commands: p = pause/resume, s = stop, q = quit");

    let outcome: CmdResult = match drive(&mut engine).await {
        Ok(Exit::Stop) => match engine.stop() {
            Ok(events) => {
                announce(&events);
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        Ok(Exit::Quit) => Ok(()),
        Err(e) => Err(e),
    };
    // Whatever happened above, never leave the session open.
    announce(&engine.shutdown());
    outcome
}

async fn drive(engine: &mut TimerEngine) -> Result<Exit, Box<dyn std::error::Error>> {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut lines = stdin_lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(Event::Tick { elapsed_secs, .. }) = engine.tick() {
                    println!("{}", fmt_hms(elapsed_secs));
                }
            }
            line = lines.recv(), if stdin_open => match line {
                Some(cmd) => match cmd.as_str() {
                    "p" => announce(engine.toggle_pause().as_slice()),
                    "s" => return Ok(Exit::Stop),
                    "q" => return Ok(Exit::Quit),
                    "" => {}
                    other => eprintln!("unknown command: {other}"),
                },
                None => stdin_open = false,
            },
            _ = &mut ctrl_c => return Ok(Exit::Quit),
        }
    }
}
