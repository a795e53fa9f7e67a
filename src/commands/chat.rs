//! Interactive chat handler
//!
//! Runs a readline loop over a [`ChatPipeline`] talking to a running
//! server. Replies are printed as they stream; Ctrl-C while a reply is in
//! flight cancels it without leaving the loop.

use super::history::print_sessions;
use super::special_commands::{parse_special_command, print_help, SpecialCommand};
use crate::config::Config;
use crate::documents::{DocumentExtractor, ExtractionStatus, UploadedDocument};
use crate::error::Result;
use crate::pipeline::{ChatPipeline, HttpTransport, PipelineSettings, TurnEvent};
use crate::storage::{SessionStore, DEFAULT_TITLE};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Start interactive chat
///
/// # Arguments
///
/// * `config` - Effective configuration
/// * `server` - Server base URL; defaults to the configured host and port
/// * `resume` - Id of a stored session to continue
/// * `attach` - Files to send with the first message
///
/// # Errors
///
/// Returns error if the store, transport or line editor cannot be created
pub async fn run_chat(
    config: Config,
    server: Option<String>,
    resume: Option<String>,
    attach: Vec<PathBuf>,
) -> Result<()> {
    let base_url = server.unwrap_or_else(|| config.server.base_url());
    tracing::info!(server = %base_url, "Starting interactive chat");

    let store = Arc::new(SessionStore::open_default(&config.storage)?);
    let transport = Arc::new(HttpTransport::new(base_url.clone())?);
    let settings = PipelineSettings::from(&config);
    let extractor = DocumentExtractor::new(config.documents.clone());

    let mut pipeline = match resume {
        Some(id) => ChatPipeline::resume(transport, store.clone(), settings, id),
        None => ChatPipeline::new(transport, store.clone(), settings),
    };

    let mut rl = DefaultEditor::new()?;
    let mut pending = attach;

    print_welcome_banner(&config.conversation.firm_name, &base_url);
    if !pipeline.messages().is_empty() {
        println!(
            "Resumed session {} ({} messages)\n",
            pipeline.session_id().cyan(),
            pipeline.messages().len()
        );
    }

    loop {
        let prompt = if pending.is_empty() {
            "counsel> ".to_string()
        } else {
            format!("counsel [{} attached]> ", pending.len())
        };

        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                tracing::error!("Readline error: {:?}", err);
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() && pending.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(trimmed);

        match parse_special_command(trimmed) {
            Ok(SpecialCommand::None) => {}
            Ok(SpecialCommand::Exit) => break,
            Ok(SpecialCommand::Help) => {
                print_help();
                continue;
            }
            Ok(SpecialCommand::Attach(path)) => {
                if path.is_file() {
                    println!("{}", format!("Attached {}", path.display()).green());
                    pending.push(path);
                } else {
                    eprintln!("{}", format!("No such file: {}", path.display()).red());
                }
                continue;
            }
            Ok(SpecialCommand::Detach) => {
                pending.clear();
                println!("{}", "Cleared attachments".yellow());
                continue;
            }
            Ok(SpecialCommand::New) => {
                pipeline.start_new_session();
                println!(
                    "{}",
                    format!("Started new session {}", pipeline.session_id()).green()
                );
                continue;
            }
            Ok(SpecialCommand::Sessions) => {
                print_sessions(&store.list_sessions());
                continue;
            }
            Ok(SpecialCommand::Title(title)) => {
                match store.rename_session(pipeline.session_id(), &title) {
                    Ok(()) => println!("{}", format!("Renamed to \"{}\"", title).green()),
                    Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                }
                continue;
            }
            Ok(SpecialCommand::ShowStatus) => {
                print_status(&pipeline, &store, &pending);
                continue;
            }
            Err(e) => {
                eprintln!("{}", e.to_string().red());
                continue;
            }
        }

        let documents = extract_all(&extractor, std::mem::take(&mut pending)).await;
        stream_reply(&mut pipeline, trimmed, documents).await;
    }

    println!("Goodbye!");
    Ok(())
}

async fn extract_all(extractor: &DocumentExtractor, paths: Vec<PathBuf>) -> Vec<UploadedDocument> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let document = extractor.extract_path(&path, None).await;
        let status = match document.status {
            ExtractionStatus::Ok => document.status.to_string().green(),
            ExtractionStatus::Partial => document.status.to_string().yellow(),
            ExtractionStatus::Failed => document.status.to_string().red(),
        };
        println!(
            "📎 {} ({}, {} chars, {})",
            document.filename,
            document.kind.label(),
            document.extracted_text.chars().count(),
            status
        );
        documents.push(document);
    }
    documents
}

async fn stream_reply(pipeline: &mut ChatPipeline, input: &str, documents: Vec<UploadedDocument>) {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    match pipeline.send(input, documents, cancel).await {
        Ok(mut turn) => {
            println!();
            while let Some(event) = turn.next().await {
                match event {
                    TurnEvent::Delta(text) => {
                        print!("{}", text);
                        let _ = std::io::stdout().flush();
                    }
                    TurnEvent::Completed(_) => println!("\n"),
                    // Failures are logged only; the missing reply is the signal
                    TurnEvent::Failed(reason) => {
                        tracing::warn!("Reply failed: {}", reason);
                        println!();
                    }
                    TurnEvent::Cancelled => println!("\n{}\n", "Reply cancelled".yellow()),
                }
            }
        }
        Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
    }

    watcher.abort();
}

fn print_welcome_banner(firm_name: &str, server: &str) {
    println!("\n{}", format!("{} Legal Assistant", firm_name).bold());
    println!("Server: {}", server.cyan());
    println!("Type '/help' for available commands, 'exit' to quit\n");
}

fn print_status(pipeline: &ChatPipeline, store: &SessionStore, pending: &[PathBuf]) {
    let title = store
        .get_summary(pipeline.session_id())
        .map(|s| s.title)
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    println!();
    println!("Session:     {}", pipeline.session_id().cyan());
    println!("Title:       {}", title);
    println!("Messages:    {}", pipeline.messages().len());
    if pending.is_empty() {
        println!("Attachments: none");
    } else {
        println!("Attachments:");
        for path in pending {
            println!("  {}", path.display());
        }
    }
    println!();
}
