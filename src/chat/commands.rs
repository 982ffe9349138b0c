// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Command handling for the chat REPL
//!
//! Lines starting with `/` are commands; everything else is a message.

use std::path::PathBuf;

/// Represents the different types of input that can be issued in chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Exit the chat session
    Exit,
    /// Show help information
    Help,
    /// Empty the conversation
    Clear,
    /// Resubmit the last user message
    Retry,
    /// Regenerate the last assistant reply
    Reload,
    /// Cancel the reply in flight
    Abort,
    /// Show session status
    Status,
    /// Save the transcript
    Save(PathBuf),
    /// Load a transcript
    Load(PathBuf),
    /// Insert a system message without submitting
    System(String),
    /// A command that needs an argument was given none
    MissingArgument(&'static str),
    /// Unknown slash command
    Unknown(String),
    /// Blank input
    Empty,
    /// Text to submit
    Message(String),
}

impl ChatCommand {
    /// Whether the command ends the REPL
    pub fn is_exit(&self) -> bool {
        matches!(self, ChatCommand::Exit)
    }
}

/// Parse one line of REPL input
pub fn parse_command(input: &str) -> ChatCommand {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return ChatCommand::Empty;
    }

    if matches!(trimmed, "exit" | "quit") {
        return ChatCommand::Exit;
    }

    let Some(rest) = trimmed.strip_prefix('/') else {
        return ChatCommand::Message(input.trim_end_matches(['\r', '\n']).to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name.to_lowercase().as_str() {
        "exit" | "quit" | "q" => ChatCommand::Exit,
        "help" | "h" | "?" => ChatCommand::Help,
        "clear" => ChatCommand::Clear,
        "retry" => ChatCommand::Retry,
        "reload" | "regen" => ChatCommand::Reload,
        "abort" | "stop" => ChatCommand::Abort,
        "status" => ChatCommand::Status,
        "save" if arg.is_empty() => ChatCommand::MissingArgument("save"),
        "save" => ChatCommand::Save(PathBuf::from(arg)),
        "load" if arg.is_empty() => ChatCommand::MissingArgument("load"),
        "load" => ChatCommand::Load(PathBuf::from(arg)),
        "system" if arg.is_empty() => ChatCommand::MissingArgument("system"),
        "system" => ChatCommand::System(arg.to_string()),
        _ => ChatCommand::Unknown(trimmed.to_string()),
    }
}

/// Help text listing the REPL commands
pub fn help_text() -> &'static str {
    "Commands:\n\
     \x20 /retry          resubmit the last message\n\
     \x20 /reload         regenerate the last reply\n\
     \x20 /abort          cancel the reply in flight (also Ctrl-C)\n\
     \x20 /clear          start over\n\
     \x20 /status         show session status\n\
     \x20 /system TEXT    add a system message\n\
     \x20 /save PATH      save the transcript\n\
     \x20 /load PATH      load a transcript\n\
     \x20 /help           show this help\n\
     \x20 /quit           exit"
}
