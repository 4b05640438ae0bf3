//! Per-connection session lifecycle

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::hub::{BroadcastHub, ChannelKind};
use crate::registry::{ConnectionRegistry, SessionEntry};

/// Outcome of reading the next input event from a session.
///
/// The transport produces these; the session handler matches on them
/// exhaustively, so every lifecycle transition is visible in one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A complete line, terminators already removed by the transport.
    Line(String),
    /// Terminal resize notification; fully recoverable.
    Resized,
    /// Client interrupt; close quietly with no error surfaced anywhere.
    Break,
    /// Client closed its input stream.
    EndOfInput,
    /// Anything else that went wrong while reading or processing input.
    Error { kind: String, message: String },
}

/// Drives one session from establishment to close.
///
/// Constructed only after the transport has accepted authentication, so
/// rejected connections never touch the registry or the hub.
pub struct SessionHandler {
    entry: Arc<SessionEntry>,
    registry: Arc<ConnectionRegistry>,
    hub: Arc<BroadcastHub>,
    events: mpsc::Receiver<InputEvent>,
    command: Option<String>,
}

impl SessionHandler {
    pub fn new(
        entry: Arc<SessionEntry>,
        registry: Arc<ConnectionRegistry>,
        hub: Arc<BroadcastHub>,
        events: mpsc::Receiver<InputEvent>,
        command: Option<String>,
    ) -> Self {
        Self {
            entry,
            registry,
            hub,
            events,
            command,
        }
    }

    /// Run the session to completion: register, announce, relay, close.
    pub async fn run(mut self) {
        let username = self.entry.username.clone();
        self.registry.register(self.entry.clone()).await;
        info!("{} connected ({})", username, self.entry.id);
        self.hub
            .broadcast(&format!("[connected] {username}"), ChannelKind::Diagnostic)
            .await;

        match self.command.take() {
            Some(command) => {
                // One-shot invocation: the command is the chat line, and
                // the input stream is never read.
                let line = command.trim_end_matches(['\r', '\n']);
                self.hub
                    .broadcast(&format!("{username}: {line}"), ChannelKind::Primary)
                    .await;
            }
            None => self.relay_lines(&username).await,
        }

        self.close(&username).await;
    }

    async fn relay_lines(&mut self, username: &str) {
        loop {
            // A dropped sender means the transport went away; treat it
            // like end of input.
            let event = self.events.recv().await.unwrap_or(InputEvent::EndOfInput);
            match event {
                InputEvent::Line(line) => {
                    let line = line.trim_end_matches(['\r', '\n']);
                    // Empty lines are chat lines too; only an explicit
                    // break or end of input terminates the session.
                    self.hub
                        .broadcast(&format!("{username}: {line}"), ChannelKind::Primary)
                        .await;
                }
                InputEvent::Resized => {
                    debug!("{} resized terminal", username);
                }
                InputEvent::Break => break,
                InputEvent::EndOfInput => break,
                InputEvent::Error { kind, message } => {
                    let notice = format!("input error: {kind}: {message}\r\n");
                    if let Err(e) = self
                        .entry
                        .sink
                        .send(ChannelKind::Diagnostic, &notice)
                        .await
                    {
                        debug!("could not report error to {}: {}", username, e);
                    }
                    info!("{} closed after input error: {} {}", username, kind, message);
                    break;
                }
            }
        }
    }

    async fn close(&self, username: &str) {
        // Unregister before the departure notice so the leaver is not in
        // the farewell snapshot; repeats are tolerated by the registry.
        self.registry.unregister(self.entry.id).await;
        if let Err(e) = self.entry.sink.close(0).await {
            debug!("transport close for {} failed: {}", username, e);
        }
        info!("{} disconnected ({})", username, self.entry.id);
        self.hub
            .broadcast(&format!("[disconnected] {username}"), ChannelKind::Diagnostic)
            .await;
    }
}
