use std::io::{self, BufRead, Write};

use clap::Args;
use studytracker_core::storage::{data_dir, reset_data, DataResetOptions};

use super::CmdResult;

#[derive(Args)]
pub struct ResetArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,
    /// Also delete the to-do list
    #[arg(long)]
    todos: bool,
}

pub fn run(args: ResetArgs) -> CmdResult {
    let dir = data_dir()?;
    if !args.yes && !confirm(args.todos)? {
        println!("cancelled");
        return Ok(());
    }

    let summary = reset_data(
        &dir,
        DataResetOptions {
            sessions: true,
            todos: args.todos,
        },
    )?;
    if summary.removed_session_log {
        println!("session log deleted");
    } else {
        println!("no session log to delete");
    }
    if summary.removed_snapshot {
        println!("pomodoro snapshot deleted");
    }
    if summary.removed_todos {
        println!("to-do list deleted");
    }
    Ok(())
}

fn confirm(todos: bool) -> io::Result<bool> {
    let what = if todos {
        "all recorded study sessions and the to-do list"
    } else {
        "all recorded study sessions"
    };
    print!("Delete {what}? This cannot be undone. [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
}
