// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};
use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use chatflow::chat::commands::{help_text, parse_command, ChatCommand};
use chatflow::chat::{ChatSession, SessionEvent, SessionSnapshot};
use chatflow::cli::ChatArgs;
use chatflow::config::Settings;
use chatflow::error::{ChatError, Result};
use chatflow::llm::message::{MessageDraft, Role};

/// How a reply ended, as seen by the terminal
#[derive(Debug, Clone, PartialEq)]
pub(super) enum ReplyOutcome {
    Finished,
    Failed(String),
    Aborted,
}

/// Prints the in-progress reply incrementally.
///
/// `Stream` events carry the whole reply so far; only the unseen suffix is
/// written.
#[derive(Debug, Default)]
pub(super) struct ReplyPrinter {
    printed: usize,
}

impl ReplyPrinter {
    /// Render one event. Returns the outcome once the reply has ended.
    pub(super) fn on_event(
        &mut self,
        event: &SessionEvent,
        out: &mut impl Write,
    ) -> io::Result<Option<ReplyOutcome>> {
        match event {
            SessionEvent::Stream { text } => {
                if let Some(unseen) = text.get(self.printed..) {
                    write!(out, "{unseen}")?;
                    out.flush()?;
                }
                self.printed = text.len();
                Ok(None)
            }
            SessionEvent::Finish { message } => {
                if let Some(unseen) = message.content.get(self.printed..) {
                    write!(out, "{unseen}")?;
                }
                writeln!(out)?;
                out.flush()?;
                self.printed = 0;
                Ok(Some(ReplyOutcome::Finished))
            }
            SessionEvent::Retry { attempt, delay } => {
                if self.printed > 0 {
                    writeln!(out)?;
                }
                self.printed = 0;
                eprintln!(
                    "[retrying, attempt {} in {:.1}s]",
                    attempt,
                    delay.as_secs_f64()
                );
                Ok(None)
            }
            SessionEvent::Abort => {
                writeln!(out)?;
                out.flush()?;
                self.printed = 0;
                eprintln!("[aborted]");
                Ok(Some(ReplyOutcome::Aborted))
            }
            SessionEvent::Error { message } => {
                if self.printed > 0 {
                    writeln!(out)?;
                }
                self.printed = 0;
                eprintln!("error: {message}");
                Ok(Some(ReplyOutcome::Failed(message.clone())))
            }
            SessionEvent::Update(_) => Ok(None),
        }
    }
}

/// Print the reply to stdout until it ends. Ctrl-C aborts it.
pub(super) async fn drive_reply(
    session: &ChatSession,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
) -> Result<ReplyOutcome> {
    let mut printer = ReplyPrinter::default();
    let mut stdout = io::stdout();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    return Err(ChatError::Session("event stream closed".to_string()));
                };
                if let Some(outcome) = printer.on_event(&event, &mut stdout)? {
                    return Ok(outcome);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                session.abort().await?;
            }
        }
    }
}

/// Drop notifications left over from earlier commands
pub(super) fn drain(events: &mut mpsc::UnboundedReceiver<SessionEvent>) {
    while events.try_recv().is_ok() {}
}

/// Run interactive chat mode
pub(super) async fn run_chat(args: ChatArgs, settings: Settings) -> Result<()> {
    let session = ChatSession::builder(settings).build()?;
    let mut events = session.subscribe();

    if let Some(ref path) = args.load {
        session.load(path).await?;
        println!(
            "Loaded {} messages from {}",
            session.snapshot().messages.len(),
            path.display()
        );
    }

    println!("chatflow {} - type /help for commands", env!("CARGO_PKG_VERSION"));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            println!();
            break;
        };

        let command = parse_command(&line);
        if command.is_exit() {
            break;
        }
        drain(&mut events);

        match command {
            ChatCommand::Message(text) => {
                if session.submit(text).await? {
                    drive_reply(&session, &mut events).await?;
                }
            }
            ChatCommand::Retry => {
                if session.retry().await? {
                    drive_reply(&session, &mut events).await?;
                } else {
                    println!("Nothing to retry.");
                }
            }
            ChatCommand::Reload => {
                if session.reload().await? {
                    drive_reply(&session, &mut events).await?;
                } else {
                    println!("No reply to regenerate.");
                }
            }
            ChatCommand::Abort => {
                if !session.abort().await? {
                    println!("Nothing to abort.");
                }
            }
            ChatCommand::Clear => {
                session.clear().await?;
                println!("Conversation cleared.");
            }
            ChatCommand::Status => print_status(&session.snapshot()),
            ChatCommand::System(text) => {
                session
                    .append(MessageDraft::new(Role::System, text))
                    .await?;
            }
            ChatCommand::Save(path) => report(save(&session, &path).await),
            ChatCommand::Load(path) => match session.load(&path).await {
                Ok(()) => println!(
                    "Loaded {} messages from {}",
                    session.snapshot().messages.len(),
                    path.display()
                ),
                Err(e) => eprintln!("error: {e}"),
            },
            ChatCommand::Help => println!("{}", help_text()),
            ChatCommand::MissingArgument(name) => {
                eprintln!("/{name} needs an argument")
            }
            ChatCommand::Unknown(input) => {
                eprintln!("Unknown command: {input} (try /help)")
            }
            ChatCommand::Empty | ChatCommand::Exit => {}
        }
    }

    if let Some(ref path) = args.save {
        report(save(&session, path).await);
    }
    session.shutdown().await
}

async fn save(session: &ChatSession, path: &Path) -> Result<String> {
    session.save(path).await?;
    Ok(format!(
        "Saved {} messages to {}",
        session.snapshot().messages.len(),
        path.display()
    ))
}

fn report(result: Result<String>) {
    match result {
        Ok(message) => println!("{message}"),
        Err(e) => eprintln!("error: {e}"),
    }
}

fn print_status(snapshot: &SessionSnapshot) {
    println!("status:      {}", snapshot.status);
    println!("messages:    {}", snapshot.messages.len());
    match snapshot.token_limit {
        Some(limit) => println!("tokens:      ~{} / {}", snapshot.token_count, limit),
        None => println!("tokens:      ~{}", snapshot.token_count),
    }
    println!("connection:  {:?}", snapshot.connection_status);
    if let Some(ref id) = snapshot.session_id {
        println!("session id:  {id}");
    }
    if let Some(ref error) = snapshot.error {
        println!("last error:  {error}");
    }
}
