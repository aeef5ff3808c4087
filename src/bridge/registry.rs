//! Pending-Session Registry: holds SSH sessions that have completed the
//! handshake but have not yet been claimed by a browser WebSocket.
//!
//! Backed by `dashmap::DashMap`, narrowed to the Pending-only lifecycle this
//! gateway needs: no state machine, no persistence, no connection limiting.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use super::session::Session;
use crate::reactor;

/// How long an SSH session may sit unclaimed before it is recycled.
pub const ATTACH_WINDOW: Duration = Duration::from_secs(3);

pub struct Registry {
    pending: Arc<DashMap<String, Session>>,
    attach_window: Duration,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            attach_window: ATTACH_WINDOW,
        }
    }

    #[cfg(test)]
    pub fn with_attach_window(attach_window: Duration) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            attach_window,
        }
    }

    /// Inserts a freshly-connected session and schedules its recycle timer,
    /// returning the id a browser must present to `GET /ws` to claim it.
    /// The session's own id (see [`Session::id`]) is used as the registry
    /// key, so logging inside the session and registry lookups always
    /// agree on the same identifier.
    pub fn insert(&self, session: Session) -> String {
        let id = session.id().to_string();
        self.pending.insert(id.clone(), session);
        self.schedule_recycle(id.clone());
        id
    }

    /// Mints a fresh session id, for callers building a [`Session`] before
    /// handing it to [`Registry::insert`].
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    fn schedule_recycle(&self, id: String) {
        let pending = self.pending.clone();
        reactor::call_later(self.attach_window, async move {
            if let Some((_, mut session)) = pending.remove(&id) {
                debug!("recycling orphaned pending session {}", id);
                session.close().await;
            }
        });
    }

    /// Removes and returns the session for `id`, if it is still pending.
    /// Once popped, the id can never be re-inserted or popped again —
    /// `insert` always mints a fresh id.
    pub fn pop(&self, id: &str) -> Option<Session> {
        self.pending.remove(id).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::session::SshChannel;
    use crate::ssh::SshError;
    use async_trait::async_trait;

    struct NoopChannel;

    #[async_trait]
    impl SshChannel for NoopChannel {
        async fn send(&mut self, data: &[u8]) -> Result<usize, SshError> {
            Ok(data.len())
        }
        async fn recv(&mut self) -> Option<Result<Vec<u8>, SshError>> {
            std::future::pending().await
        }
        async fn close(&mut self) {}
    }

    fn session(id: &str) -> Session {
        Session::new(id.to_string(), Box::new(NoopChannel))
    }

    #[tokio::test]
    async fn pop_removes_and_disjoint_from_future_lookups() {
        let registry = Registry::new();
        let id = registry.insert(session("a"));

        assert!(registry.pop(&id).is_some());
        assert!(registry.pop(&id).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn orphaned_session_is_recycled_after_attach_window() {
        let registry = Registry::with_attach_window(Duration::from_millis(20));
        let id = registry.insert(session("a"));

        assert_eq!(registry.len(), 1);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(registry.pop(&id).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn attaching_before_recycle_removes_it_from_the_registry() {
        let registry = Registry::with_attach_window(Duration::from_millis(50));
        let id = registry.insert(session("a"));

        let popped = registry.pop(&id);
        assert!(popped.is_some());

        // The recycle timer still fires, but finds nothing to remove.
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(registry.is_empty());
    }
}
