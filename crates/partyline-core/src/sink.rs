//! Output boundary between the room and the transport

use anyhow::Result;
use async_trait::async_trait;

use crate::hub::ChannelKind;

/// Where a session's outbound text goes.
///
/// The SSH binding implements this over the server-side channel handle;
/// tests implement it with in-memory recorders.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Write one already-terminated message to the given channel.
    async fn send(&self, kind: ChannelKind, text: &str) -> Result<()>;

    /// Ask the transport to end the session with the given exit status.
    async fn close(&self, exit_status: u32) -> Result<()>;
}
