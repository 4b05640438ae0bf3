//! Per-connection russh handler bridging SSH callbacks to the room core

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use russh::server::{Auth, Handle, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec, Pty, Sig};
use russh_keys::PublicKeyBase64;
use russh_keys::key::PublicKey;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use partyline_core::{
    Authenticator, AuthorizedKey, BroadcastHub, ChannelKind, ConnectionRegistry, InputEvent,
    MessageSink, SessionEntry, SessionHandler,
};

use crate::lines::LineDecoder;

/// Capacity of the per-session input event queue.
const EVENT_QUEUE: usize = 64;

/// SSH_EXTENDED_DATA_STDERR, the stream raw-mode clients render as stderr.
const EXT_STDERR: u32 = 1;

/// One instance per incoming connection; translates the transport's
/// callback surface into the core's event and sink model.
pub struct ClientHandler {
    authenticator: Arc<Authenticator>,
    registry: Arc<ConnectionRegistry>,
    hub: Arc<BroadcastHub>,
    username: Option<String>,
    channel: Option<ChannelId>,
    events: Option<mpsc::Sender<InputEvent>>,
    pending: Option<mpsc::Receiver<InputEvent>>,
    decoder: LineDecoder,
    started: bool,
}

impl ClientHandler {
    pub fn new(
        authenticator: Arc<Authenticator>,
        registry: Arc<ConnectionRegistry>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            authenticator,
            registry,
            hub,
            username: None,
            channel: None,
            events: None,
            pending: None,
            decoder: LineDecoder::new(),
            started: false,
        }
    }

    /// Hand the session over to a core `SessionHandler` task. Called from
    /// the shell request (interactive) or the exec request (one-shot).
    fn start_session(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
        command: Option<String>,
    ) -> Result<()> {
        if self.started {
            debug!("ignoring duplicate session request");
            return Ok(());
        }
        let Some(username) = self.username.clone() else {
            bail!("session request before authentication");
        };
        let Some(events) = self.pending.take() else {
            bail!("session request before channel open");
        };
        let sink = Arc::new(ChannelSink {
            handle: session.handle(),
            channel,
        });
        let entry = Arc::new(SessionEntry::new(username, sink as Arc<dyn MessageSink>));
        let handler = SessionHandler::new(
            entry,
            self.registry.clone(),
            self.hub.clone(),
            events,
            command,
        );
        tokio::spawn(handler.run());
        self.started = true;
        Ok(())
    }

    async fn forward(&self, event: InputEvent) {
        if let Some(tx) = &self.events {
            // The session may already be closing; losing events then is fine.
            let _ = tx.send(event).await;
        }
    }
}

#[async_trait]
impl russh::server::Handler for ClientHandler {
    type Error = anyhow::Error;

    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &PublicKey,
    ) -> Result<Auth, Self::Error> {
        let candidate = AuthorizedKey {
            algorithm: public_key.name().to_string(),
            key_base64: public_key.public_key_base64(),
        };
        if self.authenticator.validate(user, &candidate) {
            self.username = Some(user.to_string());
            Ok(Auth::Accept)
        } else {
            Ok(Auth::Reject {
                proceed_with_methods: None,
            })
        }
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        if self.channel.is_some() {
            debug!("rejecting second session channel");
            return Ok(false);
        }
        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        self.channel = Some(channel.id());
        self.events = Some(tx);
        self.pending = Some(rx);
        Ok(true)
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.start_session(channel, session, None)?;
        session.channel_success(channel);
        Ok(())
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let command = String::from_utf8_lossy(data).into_owned();
        self.start_session(channel, session, Some(command))?;
        session.channel_success(channel);
        Ok(())
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        session.channel_success(channel);
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        channel: ChannelId,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        if Some(channel) == self.channel {
            self.forward(InputEvent::Resized).await;
        }
        Ok(())
    }

    async fn data(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        if Some(channel) != self.channel {
            return Ok(());
        }
        for event in self.decoder.push(data) {
            self.forward(event).await;
        }
        Ok(())
    }

    async fn signal(
        &mut self,
        channel: ChannelId,
        signal: Sig,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        if Some(channel) == self.channel && matches!(signal, Sig::INT) {
            self.forward(InputEvent::Break).await;
        }
        Ok(())
    }

    async fn channel_eof(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        if Some(channel) == self.channel {
            self.forward(InputEvent::EndOfInput).await;
        }
        Ok(())
    }

    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        if Some(channel) == self.channel {
            self.forward(InputEvent::EndOfInput).await;
            // Stop feeding a channel that no longer exists.
            self.events = None;
        }
        Ok(())
    }
}

/// Routes the core's two output streams onto the SSH channel: primary as
/// channel data, diagnostic as extended (stderr) data.
struct ChannelSink {
    handle: Handle,
    channel: ChannelId,
}

#[async_trait]
impl MessageSink for ChannelSink {
    async fn send(&self, kind: ChannelKind, text: &str) -> Result<()> {
        let data = CryptoVec::from_slice(text.as_bytes());
        let result = match kind {
            ChannelKind::Primary => self.handle.data(self.channel, data).await,
            ChannelKind::Diagnostic => {
                self.handle.extended_data(self.channel, EXT_STDERR, data).await
            }
        };
        if result.is_err() {
            warn!("write to channel {:?} rejected", self.channel);
            bail!("channel write rejected");
        }
        Ok(())
    }

    async fn close(&self, exit_status: u32) -> Result<()> {
        // Best effort: the peer may already be gone.
        let _ = self.handle.exit_status_request(self.channel, exit_status).await;
        let _ = self.handle.eof(self.channel).await;
        let _ = self.handle.close(self.channel).await;
        Ok(())
    }
}
