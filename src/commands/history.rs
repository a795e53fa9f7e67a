use crate::cli::HistoryCommand;
use crate::conversation::Role;
use crate::error::{CounselError, Result};
use crate::storage::{SessionStore, SessionSummary};
use colored::Colorize;
use prettytable::{format, Table};

const TITLE_WIDTH: usize = 40;

fn short_title(title: &str) -> String {
    if title.chars().count() > TITLE_WIDTH {
        let head: String = title.chars().take(TITLE_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}

/// Print stored sessions as a table, most recent first
pub fn print_sessions(sessions: &[SessionSummary]) {
    if sessions.is_empty() {
        println!("{}", "No conversation history found.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Messages".bold(),
        "Created".bold(),
        "Last Updated".bold()
    ]);

    for session in sessions {
        let title = if session.title_locked {
            format!("{} *", short_title(&session.title))
        } else {
            short_title(&session.title)
        };
        table.add_row(prettytable::row![
            session.id.cyan(),
            title,
            session.message_count,
            session.created_at.format("%Y-%m-%d %H:%M"),
            session.updated_at.format("%Y-%m-%d %H:%M")
        ]);
    }

    println!("\nConversation History:");
    table.printstd();
    println!();
}

/// Handle history commands
///
/// # Errors
///
/// Returns error if the store cannot be opened or an operation fails
pub fn handle_history(store: &SessionStore, command: HistoryCommand) -> Result<()> {
    match command {
        HistoryCommand::List => {
            let sessions = store.list_sessions();
            print_sessions(&sessions);
            if !sessions.is_empty() {
                println!(
                    "Use {} to resume a session.",
                    "counsel chat --resume <ID>".cyan()
                );
                println!();
            }
        }
        HistoryCommand::Show { id } => {
            let summary = store
                .get_summary(&id)
                .ok_or_else(|| CounselError::Storage(format!("No session with id {}", id)))?;

            println!("\n{} {}", summary.title.bold(), format!("({})", id).cyan());
            println!();
            for message in store.load_session(&id) {
                let label = match message.role {
                    Role::User => "You".green().bold(),
                    Role::Assistant => "Assistant".cyan().bold(),
                    Role::System => "System".yellow().bold(),
                };
                println!(
                    "{} {}",
                    label,
                    message.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed()
                );
                println!("{}\n", message.content);
            }
        }
        HistoryCommand::Rename { id, title } => {
            store.rename_session(&id, &title)?;
            println!("{}", format!("Renamed session {}", id).green());
        }
        HistoryCommand::Delete { id } => {
            if store.delete_session(&id)? {
                println!("{}", format!("Deleted session {}", id).green());
            } else {
                println!("{}", format!("No session with id {}", id).yellow());
            }
        }
        HistoryCommand::Prune => {
            let removed = store.prune_expired()?;
            if removed.is_empty() {
                println!("{}", "Nothing to prune.".yellow());
            } else {
                println!(
                    "{}",
                    format!("Removed {} expired session(s)", removed.len()).green()
                );
            }
        }
    }

    Ok(())
}
