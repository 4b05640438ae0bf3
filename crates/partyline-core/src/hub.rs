//! Broadcast hub fanning messages out to every live session

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::registry::ConnectionRegistry;

/// Which of a session's two output streams a message belongs on.
///
/// The primary stream carries chat lines and ends in a bare line feed;
/// the diagnostic stream carries notices for raw-mode terminals and ends
/// in carriage return + line feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Primary,
    Diagnostic,
}

impl ChannelKind {
    pub fn terminator(self) -> &'static str {
        match self {
            ChannelKind::Primary => "\n",
            ChannelKind::Diagnostic => "\r\n",
        }
    }
}

/// Delivers a message to every session in the registry's snapshot.
pub struct BroadcastHub {
    registry: Arc<ConnectionRegistry>,
    /// Serializes fan-outs so two broadcasts never interleave their
    /// per-recipient writes. Writes to a slow recipient happen inside the
    /// broadcaster's turn; there is no backpressure handling.
    fanout: Mutex<()>,
    mirror_diagnostics: bool,
}

impl BroadcastHub {
    pub fn new(registry: Arc<ConnectionRegistry>, mirror_diagnostics: bool) -> Self {
        Self {
            registry,
            fanout: Mutex::new(()),
            mirror_diagnostics,
        }
    }

    /// Deliver `text` to every session live at call time.
    ///
    /// A failed write to one recipient is logged and skipped; the rest of
    /// the snapshot still receives the message.
    pub async fn broadcast(&self, text: &str, kind: ChannelKind) {
        let _turn = self.fanout.lock().await;
        let message = normalize(text, kind);
        if self.mirror_diagnostics && kind == ChannelKind::Diagnostic {
            info!("{}", message.trim_end());
        }
        let recipients = self.registry.snapshot().await;
        debug!(
            "broadcasting {:?} message to {} sessions",
            kind,
            recipients.len()
        );
        for entry in recipients {
            if let Err(e) = entry.sink.send(kind, &message).await {
                warn!("dropping write to {} ({}): {}", entry.username, entry.id, e);
            }
        }
    }
}

/// Strip any trailing terminator run and append the canonical one.
fn normalize(text: &str, kind: ChannelKind) -> String {
    let mut message = text.trim_end_matches(['\r', '\n']).to_string();
    message.push_str(kind.terminator());
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SessionEntry;
    use crate::sink::MessageSink;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSink {
        messages: StdMutex<Vec<(ChannelKind, String)>>,
        fail: bool,
    }

    impl RecordingSink {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn received(&self) -> Vec<(ChannelKind, String)> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send(&self, kind: ChannelKind, text: &str) -> Result<()> {
            if self.fail {
                return Err(anyhow!("sink unavailable"));
            }
            self.messages.lock().unwrap().push((kind, text.to_string()));
            Ok(())
        }

        async fn close(&self, _exit_status: u32) -> Result<()> {
            Ok(())
        }
    }

    async fn join(
        registry: &Arc<ConnectionRegistry>,
        username: &str,
        sink: Arc<RecordingSink>,
    ) -> Arc<SessionEntry> {
        let entry = Arc::new(SessionEntry::new(username, sink as Arc<dyn MessageSink>));
        registry.register(entry.clone()).await;
        entry
    }

    #[test]
    fn test_normalize_primary_terminator() {
        assert_eq!(normalize("hello", ChannelKind::Primary), "hello\n");
        assert_eq!(normalize("hello\r\n", ChannelKind::Primary), "hello\n");
        assert_eq!(normalize("hello\n\n", ChannelKind::Primary), "hello\n");
    }

    #[test]
    fn test_normalize_diagnostic_terminator() {
        assert_eq!(normalize("notice", ChannelKind::Diagnostic), "notice\r\n");
        assert_eq!(normalize("notice\n", ChannelKind::Diagnostic), "notice\r\n");
    }

    #[test]
    fn test_normalize_keeps_interior_whitespace() {
        assert_eq!(normalize("a  b\tc", ChannelKind::Primary), "a  b\tc\n");
        assert_eq!(normalize("", ChannelKind::Primary), "\n");
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_session() {
        let registry = Arc::new(ConnectionRegistry::new());
        let alice = Arc::new(RecordingSink::default());
        let bob = Arc::new(RecordingSink::default());
        join(&registry, "alice", alice.clone()).await;
        join(&registry, "bob", bob.clone()).await;

        let hub = BroadcastHub::new(registry, false);
        hub.broadcast("alice: hi", ChannelKind::Primary).await;

        for sink in [alice, bob] {
            assert_eq!(
                sink.received(),
                vec![(ChannelKind::Primary, "alice: hi\n".to_string())]
            );
        }
    }

    #[tokio::test]
    async fn test_one_failing_recipient_does_not_abort_the_rest() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broken = Arc::new(RecordingSink::failing());
        let bob = Arc::new(RecordingSink::default());
        join(&registry, "alice", broken).await;
        join(&registry, "bob", bob.clone()).await;

        let hub = BroadcastHub::new(registry, false);
        hub.broadcast("still here", ChannelKind::Primary).await;

        assert_eq!(
            bob.received(),
            vec![(ChannelKind::Primary, "still here\n".to_string())]
        );
    }

    #[tokio::test]
    async fn test_diagnostic_broadcast_uses_crlf() {
        let registry = Arc::new(ConnectionRegistry::new());
        let alice = Arc::new(RecordingSink::default());
        join(&registry, "alice", alice.clone()).await;

        // Mirroring enabled to exercise the operator-log path as well.
        let hub = BroadcastHub::new(registry, true);
        hub.broadcast("[connected] bob", ChannelKind::Diagnostic).await;

        assert_eq!(
            alice.received(),
            vec![(ChannelKind::Diagnostic, "[connected] bob\r\n".to_string())]
        );
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_room_is_a_no_op() {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = BroadcastHub::new(registry, false);
        hub.broadcast("anyone?", ChannelKind::Primary).await;
    }
}
