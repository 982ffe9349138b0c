// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! chatflow - streaming chat sessions in your terminal
//!
//! Entry point for the chatflow CLI application.

use clap::Parser;

use chatflow::cli::{ChatArgs, Cli, Commands};
use chatflow::config::Settings;
use chatflow::error::Result;

#[path = "main/chat_runtime.rs"]
mod chat_runtime;
#[path = "main/cli_commands.rs"]
mod cli_commands;

use chat_runtime::run_chat;
use cli_commands::{run_ask, run_settings_command, run_transcript_command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on session diagnostics; `RUST_LOG` still takes precedence.
    if cli.verbose > 0 {
        let mut directives = vec![
            "chatflow.chat.session=debug",
            "chatflow.chat.submission=debug",
            "chatflow.llm.retry=debug",
        ];
        if cli.verbose > 1 {
            directives.push("chatflow.llm.http=debug");
            directives.push("chatflow.chat.transcript=debug");
        }
        for directive in directives {
            if let Ok(parsed) = directive.parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }

    // Replies go to stdout, so diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load_from(&settings_path)?;
    cli.apply_overrides(&mut settings);

    match cli.command {
        None => run_chat(ChatArgs::default(), settings).await?,
        Some(Commands::Chat(args)) => run_chat(args, settings).await?,
        Some(Commands::Ask(args)) => run_ask(args, settings).await?,
        Some(Commands::Transcript(args)) => run_transcript_command(args)?,
        Some(Commands::Settings(args)) => {
            run_settings_command(args, &settings, &settings_path)?
        }
    }

    Ok(())
}
