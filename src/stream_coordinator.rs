//! Wake-up registry for blocked stream readers.
//!
//! A blocking XREAD registers one waiter per `(key, start ID)` pair. When a
//! write lands on a stream, the coordinator walks that key's waiters, delivers
//! the entries strictly newer than each waiter's start ID, and drops satisfied
//! waiters. Unsatisfied waiters stay registered until their call times out and
//! removes them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::stream::{Stream, StreamEntry, StreamId};

/// Entries delivered to one blocked reader: the stream key plus everything
/// newer than the reader's start ID.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDelivery {
    pub key: String,
    pub entries: Vec<StreamEntry>,
}

struct Waiter {
    token: u64,
    start: StreamId,
    tx: mpsc::Sender<StreamDelivery>,
}

/// Handle returned by [`StreamCoordinator::register`]; used to receive the
/// delivery and to deregister on cancellation.
pub struct Registration {
    pub key: String,
    pub token: u64,
    pub rx: mpsc::Receiver<StreamDelivery>,
}

/// Registry of blocked readers keyed by stream key.
#[derive(Default)]
pub struct StreamCoordinator {
    waiters: Mutex<HashMap<String, Vec<Waiter>>>,
    next_token: AtomicU64,
}

impl StreamCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a blocked reader for `key`, waiting for entries strictly newer
    /// than `start`. The caller resolves `$` to the current tail before
    /// registering.
    pub async fn register(&self, key: &str, start: StreamId) -> Registration {
        // Capacity 1: delivery never blocks the notifying writer.
        let (tx, rx) = mpsc::channel(1);
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        let mut waiters = self.waiters.lock().await;
        waiters.entry(key.to_string()).or_default().push(Waiter {
            token,
            start,
            tx,
        });

        Registration {
            key: key.to_string(),
            token,
            rx,
        }
    }

    /// Removes a waiter by its registration token. A no-op if delivery already
    /// removed it.
    pub async fn remove(&self, key: &str, token: u64) {
        let mut waiters = self.waiters.lock().await;

        if let Some(list) = waiters.get_mut(key) {
            list.retain(|w| w.token != token);
            if list.is_empty() {
                waiters.remove(key);
            }
        }
    }

    /// Called after an entry is appended to `key`, with a snapshot of the
    /// stream taken outside the store's lock. Satisfied waiters receive their
    /// entries and are dropped; waiters with nothing new stay registered.
    pub async fn notify(&self, key: &str, stream: &Stream) {
        let mut waiters = self.waiters.lock().await;

        let Some(list) = waiters.get_mut(key) else {
            return;
        };

        list.retain(|waiter| {
            let entries = stream.entries_after(waiter.start);
            if entries.is_empty() {
                return true;
            }

            // try_send rather than send: the channel is capacity 1 and this
            // waiter has never been delivered to, so failure means the reader
            // is gone and the waiter can be dropped either way.
            waiter
                .tx
                .try_send(StreamDelivery {
                    key: key.to_string(),
                    entries,
                })
                .ok();
            false
        });

        if list.is_empty() {
            waiters.remove(key);
        }
    }

    /// Number of registered waiters for `key`.
    pub async fn waiting_on(&self, key: &str) -> usize {
        let waiters = self.waiters.lock().await;
        waiters.get(key).map(|list| list.len()).unwrap_or(0)
    }
}
