use clap::Subcommand;
use studytracker_core::TodoStore;

use super::CmdResult;

#[derive(Subcommand)]
pub enum TodoAction {
    /// Show the list
    List {
        /// Print JSON instead of a checklist
        #[arg(long)]
        json: bool,
    },
    /// Append an item
    Add {
        /// Item text
        text: String,
    },
    /// Check or uncheck an item
    Toggle {
        /// Item number as shown by `todo list`
        number: usize,
    },
    /// Delete an item
    Remove {
        /// Item number as shown by `todo list`
        number: usize,
    },
}

pub fn run(action: TodoAction) -> CmdResult {
    let mut todos = TodoStore::open_default()?;

    match action {
        TodoAction::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(todos.items())?);
            } else if todos.items().is_empty() {
                println!("nothing to do");
            } else {
                for (i, item) in todos.items().iter().enumerate() {
                    let mark = if item.checked { 'x' } else { ' ' };
                    println!("{:>3}. [{mark}] {}", i + 1, item.text);
                }
            }
        }
        TodoAction::Add { text } => {
            let text = text.trim();
            if text.is_empty() {
                return Err("to-do text cannot be empty".into());
            }
            let index = todos.add(text);
            todos.save()?;
            println!("added #{}", index + 1);
        }
        TodoAction::Toggle { number } => {
            let checked = number
                .checked_sub(1)
                .and_then(|i| todos.toggle(i))
                .ok_or_else(|| format!("no to-do item #{number}"))?;
            todos.save()?;
            println!("#{number} {}", if checked { "checked" } else { "unchecked" });
        }
        TodoAction::Remove { number } => {
            let removed = number
                .checked_sub(1)
                .and_then(|i| todos.remove(i))
                .ok_or_else(|| format!("no to-do item #{number}"))?;
            todos.save()?;
            println!("removed: {}", removed.text);
        }
    }
    Ok(())
}
