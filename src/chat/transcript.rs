// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! JSONL transcript persistence
//!
//! One message record per line, in store order. Writes go to a sibling temp
//! file that is renamed over the destination once fully flushed.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ChatError, Result};
use crate::llm::message::Message;

/// Encode messages as newline-delimited JSON
pub fn encode(messages: &[Message]) -> Result<String> {
    let mut out = String::new();
    for message in messages {
        out.push_str(&serde_json::to_string(message)?);
        out.push('\n');
    }
    Ok(out)
}

/// Decode newline-delimited JSON, skipping blank lines.
///
/// The first line that fails to decode fails the whole transcript.
pub fn decode(text: &str) -> Result<Vec<Message>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<Message>(line).map_err(|e| ChatError::Transcript {
                line: idx + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("transcript"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write messages to `path`, replacing any previous transcript
pub fn save_to(path: &Path, messages: &[Message]) -> Result<()> {
    let content = encode(messages)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_path(path);
    {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(&temp_path, path)?;

    tracing::debug!(
        target: "chatflow.chat.transcript",
        path = %path.display(),
        messages = messages.len(),
        "transcript saved"
    );
    Ok(())
}

/// Read and decode the transcript at `path`
pub fn load_from(path: &Path) -> Result<Vec<Message>> {
    let content = std::fs::read_to_string(path)?;
    let messages = decode(&content)?;

    tracing::debug!(
        target: "chatflow.chat.transcript",
        path = %path.display(),
        messages = messages.len(),
        "transcript loaded"
    );
    Ok(messages)
}
