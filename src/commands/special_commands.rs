//! Special commands parser for interactive chat
//!
//! Commands are prefixed with `/` and are case-insensitive. Arguments keep
//! their original case so file paths and titles survive intact.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
///
/// These act on the session instead of being sent to the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Queue a file to be extracted and sent with the next message
    Attach(PathBuf),

    /// Drop all queued attachments
    Detach,

    /// Start a new session; the current one stays stored
    New,

    /// List stored sessions
    Sessions,

    /// Rename the current session and lock its title
    Title(String),

    /// Show the current session and queued attachments
    ShowStatus,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command; send the input as a message
    None,
}

fn argument<'a>(trimmed: &'a str, command: &str) -> Option<&'a str> {
    let rest = trimmed.get(command.len()..)?;
    let rest = rest.trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}

/// Parse user input into a special command
///
/// # Errors
///
/// Returns [`CommandError`] for an unknown command or a missing argument
///
/// # Examples
///
/// ```
/// use counsel::commands::special_commands::{parse_special_command, SpecialCommand};
/// use std::path::PathBuf;
///
/// let cmd = parse_special_command("/attach Lease.pdf").unwrap();
/// assert_eq!(cmd, SpecialCommand::Attach(PathBuf::from("Lease.pdf")));
///
/// let cmd = parse_special_command("Is this clause enforceable?").unwrap();
/// assert_eq!(cmd, SpecialCommand::None);
///
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    let head = lower.split_whitespace().next().unwrap_or_default();
    match head {
        "exit" | "quit" | "/exit" | "/quit" => Ok(SpecialCommand::Exit),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/status" => Ok(SpecialCommand::ShowStatus),
        "/new" => Ok(SpecialCommand::New),
        "/sessions" | "/history" => Ok(SpecialCommand::Sessions),
        "/detach" => Ok(SpecialCommand::Detach),
        "/attach" => argument(trimmed, "/attach")
            .map(|path| SpecialCommand::Attach(PathBuf::from(path)))
            .ok_or_else(|| CommandError::MissingArgument {
                command: "/attach".to_string(),
                usage: "/attach <path>".to_string(),
            }),
        "/title" => argument(trimmed, "/title")
            .map(|title| SpecialCommand::Title(title.to_string()))
            .ok_or_else(|| CommandError::MissingArgument {
                command: "/title".to_string(),
                usage: "/title <new title>".to_string(),
            }),
        _ => Err(CommandError::UnknownCommand(head.to_string())),
    }
}

/// Display help for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat
=====================================

DOCUMENTS:
  /attach <path>  - Attach a PDF, Word, Excel, image or text file to the next message
  /detach         - Drop all queued attachments

SESSIONS:
  /new            - Start a new conversation
  /sessions       - List stored conversations
  /title <text>   - Rename the current conversation
  /status         - Show the current session and queued attachments

SESSION CONTROL:
  /help           - Show this help message
  exit            - Exit interactive mode
  quit            - Same as exit

NOTES:
  - Commands are case-insensitive
  - Press Ctrl-C while a reply is streaming to cancel it
  - Questions about recent events trigger a web search automatically
"#
    );
}
