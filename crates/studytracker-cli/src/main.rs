use std::env;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "studytracker", version, about = "Personal study-time tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the manual stopwatch
    Timer(commands::timer::TimerArgs),
    /// Run the Pomodoro study/break cycle
    Pomodoro(commands::pomodoro::PomodoroArgs),
    /// Streak and total study time as JSON
    Stats,
    /// Today's finalized study time
    Today,
    /// List recorded sessions
    History(commands::stats::HistoryArgs),
    /// Per-day study totals as JSON
    Totals(commands::stats::TotalsArgs),
    /// To-do list management
    Todo {
        #[command(subcommand)]
        action: commands::todo::TodoAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Delete the recorded session log
    Reset(commands::reset::ResetArgs),
}

fn init_logging() {
    let debug_enabled = env::var("STUDYTRACKER_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Timer(args) => commands::timer::run(args).await,
        Commands::Pomodoro(args) => commands::pomodoro::run(args).await,
        Commands::Stats => commands::stats::stats(),
        Commands::Today => commands::stats::today(),
        Commands::History(args) => commands::stats::history(args),
        Commands::Totals(args) => commands::stats::totals(args),
        Commands::Todo { action } => commands::todo::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Reset(args) => commands::reset::run(args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
