//! Registry of currently live sessions

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::sink::MessageSink;

/// One live, authenticated connection.
///
/// Owned by its `SessionHandler`; the registry and broadcast snapshots
/// hold references only.
pub struct SessionEntry {
    pub id: Uuid,
    pub username: String,
    pub sink: Arc<dyn MessageSink>,
    pub connected_at: DateTime<Utc>,
}

impl SessionEntry {
    pub fn new(username: impl Into<String>, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            sink,
            connected_at: Utc::now(),
        }
    }
}

/// The set of sessions between establishment and close.
///
/// Mutated only by the session that is itself entering or leaving; read
/// by the hub via `snapshot`.
#[derive(Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<SessionEntry>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, entry: Arc<SessionEntry>) {
        let mut sessions = self.sessions.write().await;
        debug!("registering session {} for {}", entry.id, entry.username);
        sessions.insert(entry.id, entry);
    }

    /// Remove a session. Safe to call repeatedly or for an id that was
    /// never registered; returns whether the session was still present.
    pub async fn unregister(&self, id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(&id).is_some();
        if removed {
            debug!("unregistered session {}", id);
        }
        removed
    }

    /// The sessions live at this instant. Arrivals after the call are not
    /// included; departures after the call are still written to, and the
    /// hub swallows those failures.
    pub async fn snapshot(&self) -> Vec<Arc<SessionEntry>> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
