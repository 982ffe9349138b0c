// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::Path;

use tokio::io::AsyncReadExt;

use chatflow::chat::{transcript, ChatSession};
use chatflow::cli::{AskArgs, SettingsArgs, SettingsCommands, TranscriptArgs, TranscriptCommands};
use chatflow::config::Settings;
use chatflow::error::{ChatError, Result};
use chatflow::llm::message::Message;

use super::chat_runtime::{drain, drive_reply, ReplyOutcome};

/// Run a single question and stream the answer to stdout
pub(super) async fn run_ask(args: AskArgs, settings: Settings) -> Result<()> {
    let prompt = match args.prompt {
        Some(prompt) if !args.stdin => prompt,
        _ => {
            let mut buffer = String::new();
            tokio::io::stdin().read_to_string(&mut buffer).await?;
            buffer
        }
    };
    if prompt.trim().is_empty() {
        return Err(ChatError::InvalidInput("prompt is empty".to_string()));
    }

    let session = ChatSession::builder(settings).build()?;
    let mut events = session.subscribe();
    if let Some(ref path) = args.load {
        session.load(path).await?;
    }
    drain(&mut events);

    let outcome = if session.submit(prompt).await? {
        drive_reply(&session, &mut events).await?
    } else {
        ReplyOutcome::Aborted
    };

    if let Some(ref path) = args.save {
        session.save(path).await?;
    }
    session.shutdown().await?;

    match outcome {
        ReplyOutcome::Finished => Ok(()),
        ReplyOutcome::Failed(message) => Err(ChatError::Session(message)),
        ReplyOutcome::Aborted => Err(ChatError::Cancelled),
    }
}

/// Handle `chatflow transcript ...`
pub(super) fn run_transcript_command(args: TranscriptArgs) -> Result<()> {
    match args.command {
        TranscriptCommands::Show { path } => {
            let messages = transcript::load_from(&path)?;
            for message in &messages {
                println!("{}", format_message(message));
            }
        }
        TranscriptCommands::List => {
            let dir = Settings::transcripts_dir();
            if !dir.exists() {
                println!("No transcripts in {}", dir.display());
                return Ok(());
            }

            let mut entries: Vec<_> = std::fs::read_dir(&dir)?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "jsonl"))
                .collect();
            entries.sort();

            if entries.is_empty() {
                println!("No transcripts in {}", dir.display());
            }
            for path in entries {
                match transcript::load_from(&path) {
                    Ok(messages) => {
                        println!("{}  ({} messages)", path.display(), messages.len())
                    }
                    Err(e) => println!("{}  (unreadable: {})", path.display(), e),
                }
            }
        }
    }
    Ok(())
}

fn format_message(message: &Message) -> String {
    format!(
        "[{}] {}: {}",
        message.created_at.format("%Y-%m-%d %H:%M:%S"),
        message.role,
        message.content
    )
}

/// Handle `chatflow settings ...`
pub(super) fn run_settings_command(
    args: SettingsArgs,
    settings: &Settings,
    path: &Path,
) -> Result<()> {
    match args.command.unwrap_or(SettingsCommands::Show) {
        SettingsCommands::Show => {
            let mut shown = settings.clone();
            if shown.transport.api_key.is_some() {
                shown.transport.api_key = Some("<redacted>".to_string());
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        SettingsCommands::Path => println!("{}", path.display()),
        SettingsCommands::Init => {
            if path.exists() {
                println!("Settings already exist at {}", path.display());
            } else {
                Settings::default().save_to(path)?;
                println!("Wrote default settings to {}", path.display());
            }
        }
    }
    Ok(())
}
