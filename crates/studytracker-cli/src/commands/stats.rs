use chrono::{Local, NaiveDate};
use clap::Args;
use studytracker_core::{fmt_hms, Clock, SessionRecord, SessionStore};

use super::CmdResult;

/// Ten years of per-day rows.
const MAX_TOTALS_DAYS: i64 = 3660;

#[derive(Args)]
pub struct HistoryArgs {
    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD), defaults to today
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
pub struct TotalsArgs {
    /// First day (YYYY-MM-DD)
    #[arg(long)]
    from: NaiveDate,
    /// Last day (YYYY-MM-DD)
    #[arg(long)]
    to: NaiveDate,
}

pub fn stats() -> CmdResult {
    let store = SessionStore::open_default()?;
    println!("{}", serde_json::to_string_pretty(&store.stats()?)?);
    Ok(())
}

pub fn today() -> CmdResult {
    let store = SessionStore::open_default()?;
    let total = store.today_total_seconds()?;
    println!("{}", fmt_hms(u64::try_from(total).unwrap_or(0)));
    Ok(())
}

pub fn history(args: HistoryArgs) -> CmdResult {
    let store = SessionStore::open_default()?;
    let sessions = if args.from.is_none() && args.to.is_none() {
        let mut all = store.list_sessions()?;
        all.reverse();
        all
    } else {
        let from = args.from.unwrap_or_default();
        let to = args.to.unwrap_or_else(|| store.clock().today());
        if from > to {
            return Err(format!("--from {from} is after --to {to}").into());
        }
        store.sessions_between(from, to)?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }
    if sessions.is_empty() {
        println!("no sessions recorded");
        return Ok(());
    }
    for session in &sessions {
        println!("{}", history_line(session));
    }
    Ok(())
}

fn history_line(session: &SessionRecord) -> String {
    let started = session.start_utc.with_timezone(&Local).format("%H:%M");
    let duration = match session.duration_sec {
        Some(secs) => fmt_hms(u64::try_from(secs).unwrap_or(0)),
        None => "(open)".to_string(),
    };
    let mut line = format!(
        "#{:<5} {} {} {:>9} {:<8}",
        session.id, session.local_date, started, duration, session.source.as_str()
    );
    if !session.subject.is_empty() {
        line.push(' ');
        line.push_str(&session.subject);
    }
    if !session.note.is_empty() {
        line.push_str(" - ");
        line.push_str(&session.note);
    }
    line
}

pub fn totals(args: TotalsArgs) -> CmdResult {
    if args.from > args.to {
        return Err(format!("--from {} is after --to {}", args.from, args.to).into());
    }
    let span = args.to.signed_duration_since(args.from).num_days() + 1;
    if span > MAX_TOTALS_DAYS {
        return Err(format!("range covers {span} days, at most {MAX_TOTALS_DAYS} allowed").into());
    }
    let store = SessionStore::open_default()?;
    let totals = store.daily_totals(args.from, args.to)?;
    println!("{}", serde_json::to_string_pretty(&totals)?);
    Ok(())
}
