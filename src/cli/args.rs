// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for chatflow.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Settings;

/// chatflow - streaming chat sessions in your terminal
#[derive(Parser, Debug)]
#[command(name = "chatflow")]
#[command(version, about = "Streaming chat sessions in your terminal")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path (defaults to ~/.chatflow/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Chat-completions endpoint URL
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Model to request
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Session id forwarded to the endpoint
    #[arg(long, global = true)]
    pub session_id: Option<String>,

    /// Maximum retries per submission
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(ref endpoint) = self.endpoint {
            settings.transport.endpoint = endpoint.clone();
        }
        if let Some(ref model) = self.model {
            settings.transport.model = Some(model.clone());
        }
        if let Some(ref session_id) = self.session_id {
            settings.transport.session_id = Some(session_id.clone());
        }
        if let Some(max_retries) = self.max_retries {
            settings.resilience.max_retries = max_retries;
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start interactive chat session (default when no command given)
    Chat(ChatArgs),

    /// Ask a single question (non-interactive)
    Ask(AskArgs),

    /// Inspect saved transcripts
    Transcript(TranscriptArgs),

    /// Show or initialize configuration
    #[command(alias = "config")]
    Settings(SettingsArgs),
}

/// Arguments for the chat command
#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    /// Load a transcript before the first prompt
    #[arg(long)]
    pub load: Option<PathBuf>,

    /// Save the transcript here on exit
    #[arg(long)]
    pub save: Option<PathBuf>,
}

/// Arguments for the ask command
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    pub prompt: Option<String>,

    /// Read prompt from stdin
    #[arg(long)]
    pub stdin: bool,

    /// Load a transcript to continue from
    #[arg(long)]
    pub load: Option<PathBuf>,

    /// Save the transcript after the reply
    #[arg(long)]
    pub save: Option<PathBuf>,
}

/// Arguments for transcript inspection
#[derive(clap::Args, Debug)]
pub struct TranscriptArgs {
    #[command(subcommand)]
    pub command: TranscriptCommands,
}

/// Transcript subcommands
#[derive(Subcommand, Debug)]
pub enum TranscriptCommands {
    /// Print the messages of a transcript
    Show {
        /// Transcript file
        path: PathBuf,
    },

    /// List transcripts in the transcripts directory
    List,
}

/// Arguments for settings management
#[derive(clap::Args, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: Option<SettingsCommands>,
}

/// Settings subcommands
#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show current configuration
    Show,

    /// Print the settings file path
    Path,

    /// Write default settings if no settings file exists
    Init,
}
