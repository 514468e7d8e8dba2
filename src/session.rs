//! Per-connection session state: transaction mode and the queued command
//! frames between MULTI and EXEC/DISCARD.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::resp::RespValue;

#[derive(Debug, Default)]
struct Session {
    in_transaction: bool,
    queued: Vec<RespValue>,
}

/// Sessions keyed by connection ID. Created lazily on first use, removed when
/// the connection closes.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<u64, Session>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters transaction mode. Re-entering resets the queue.
    pub async fn begin_transaction(&self, conn_id: u64) {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.entry(conn_id).or_default();
        session.in_transaction = true;
        session.queued.clear();
    }

    pub async fn in_transaction(&self, conn_id: u64) -> bool {
        let sessions = self.sessions.lock().await;
        sessions
            .get(&conn_id)
            .map(|s| s.in_transaction)
            .unwrap_or(false)
    }

    /// Appends a frame to the transaction queue. Returns false when the
    /// connection is not in a transaction.
    pub async fn queue_frame(&self, conn_id: u64, frame: RespValue) -> bool {
        let mut sessions = self.sessions.lock().await;

        match sessions.get_mut(&conn_id) {
            Some(session) if session.in_transaction => {
                session.queued.push(frame);
                true
            }
            _ => false,
        }
    }

    /// Leaves transaction mode and returns the queued frames, or `None` when no
    /// transaction was open (EXEC without MULTI).
    pub async fn take_transaction(&self, conn_id: u64) -> Option<Vec<RespValue>> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&conn_id)?;

        if !session.in_transaction {
            return None;
        }

        session.in_transaction = false;
        Some(std::mem::take(&mut session.queued))
    }

    /// Leaves transaction mode and drops the queue. Returns false when no
    /// transaction was open (DISCARD without MULTI).
    pub async fn discard_transaction(&self, conn_id: u64) -> bool {
        let mut sessions = self.sessions.lock().await;

        match sessions.get_mut(&conn_id) {
            Some(session) if session.in_transaction => {
                session.in_transaction = false;
                session.queued.clear();
                true
            }
            _ => false,
        }
    }

    /// Drops all state for a closed connection.
    pub async fn remove(&self, conn_id: u64) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(&conn_id);
    }
}
