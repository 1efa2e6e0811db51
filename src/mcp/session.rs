//! Session table for the SSE transport.
//!
//! Each open event stream owns one entry, keyed by a generated session id.
//! The entry holds the sending half of the session's inbound queue; the
//! companion `/messages` endpoint forwards client messages through it. The
//! entry is removed by [`SessionGuard`] when the stream is dropped, whatever
//! the reason.

use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;

/// Session-level errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Unknown session")]
    Unknown,
}

/// Open SSE sessions, shared by all endpoint handlers
#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    sessions: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<Value>>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session; dropping the guard unregisters it
    pub fn open(&self) -> (SessionGuard, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);

        let id = loop {
            let candidate = uuid::Uuid::new_v4().to_string();
            if let Entry::Vacant(slot) = sessions.entry(candidate.clone()) {
                slot.insert(tx);
                break candidate;
            }
        };

        let guard = SessionGuard {
            id,
            table: self.clone(),
        };
        (guard, rx)
    }

    /// Queue a message for a session, in arrival order
    pub fn forward(&self, session_id: &str, message: Value) -> Result<(), SessionError> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let sender = sessions.get(session_id).ok_or(SessionError::Unknown)?;
        sender.send(message).map_err(|_| SessionError::Unknown)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, session_id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .is_some()
    }
}

/// Keeps a session registered for as long as it is alive
#[derive(Debug)]
pub struct SessionGuard {
    id: String,
    table: SessionTable,
}

impl SessionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.table.remove(&self.id) {
            tracing::info!(session_id = %self.id, "SSE session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_open_registers_unique_ids() {
        let table = SessionTable::new();
        let (a, _rx_a) = table.open();
        let (b, _rx_b) = table.open();

        assert_ne!(a.id(), b.id());
        assert!(table.contains(a.id()));
        assert!(table.contains(b.id()));
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_forward_preserves_order() {
        let table = SessionTable::new();
        let (guard, mut rx) = table.open();

        for n in 0..3 {
            assert_ok!(table.forward(guard.id(), json!({ "n": n })));
        }

        for n in 0..3 {
            assert_eq!(rx.recv().await.unwrap(), json!({ "n": n }));
        }
    }

    #[test]
    fn test_unknown_session() {
        let table = SessionTable::new();
        assert_eq!(
            table.forward("missing", json!({})),
            Err(SessionError::Unknown)
        );
    }

    #[test]
    fn test_drop_removes_entry() {
        let table = SessionTable::new();
        let (guard, rx) = table.open();
        let id = guard.id().to_string();

        drop(guard);
        assert!(!table.contains(&id));
        assert!(table.is_empty());
        assert_err!(table.forward(&id, json!({})));
        drop(rx);
    }

    #[test]
    fn test_closed_receiver_rejects_forward() {
        let table = SessionTable::new();
        let (guard, rx) = table.open();
        drop(rx);

        assert_eq!(
            table.forward(guard.id(), json!({})),
            Err(SessionError::Unknown)
        );
    }
}
