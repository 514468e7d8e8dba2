//! The concurrent key/value store.
//!
//! A single reader/writer lock guards the whole map. Readers treat expired
//! entries as absent even before the background reaper removes them; reads that
//! observe an expired entry schedule its deletion after releasing the read lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use tokio::sync::RwLock;
use tracing::debug;

use crate::stream::{RequestedId, Stream, StreamEntry, StreamId, StreamIdError};

/// A stored value: either a plain string or a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Stream(Stream),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Timestamp>,
}

impl Entry {
    fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }
}

/// Concurrent map from key to value with per-key expiry.
#[derive(Debug, Default)]
pub struct Store {
    inner: RwLock<HashMap<String, Entry>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value under `key`. A `ttl` sets the expiry to now + ttl;
    /// `None` clears any existing expiry.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| {
            Timestamp::now()
                .checked_add(ttl)
                .unwrap_or(Timestamp::MAX)
        });

        let mut map = self.inner.write().await;
        map.insert(key.to_string(), Entry { value, expires_at });
    }

    /// Inserts an entry with an absolute expiry instant, as read from a
    /// snapshot file. Entries already past their expiry are skipped.
    pub async fn load(&self, key: String, value: Value, expires_at: Option<Timestamp>) {
        if expires_at.is_some_and(|deadline| Timestamp::now() > deadline) {
            return;
        }

        let mut map = self.inner.write().await;
        map.insert(key, Entry { value, expires_at });
    }

    /// String value under `key`, if the key exists, is unexpired, and holds a
    /// string.
    pub async fn get(&self, key: &str) -> Option<String> {
        match self.live_value(key).await? {
            Value::String(s) => Some(s),
            Value::Stream(_) => None,
        }
    }

    /// Stream under `key`, if the key exists, is unexpired, and holds a stream.
    /// Returns a snapshot; the live stream only changes under the write lock.
    pub async fn get_stream(&self, key: &str) -> Option<Stream> {
        match self.live_value(key).await? {
            Value::Stream(s) => Some(s),
            Value::String(_) => None,
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.live_value(key).await.is_some()
    }

    /// Snapshot of all unexpired keys.
    pub async fn keys(&self) -> Vec<String> {
        let now = Timestamp::now();
        let map = self.inner.read().await;

        map.iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Observed type of `key`: `"string"`, `"stream"`, or `"none"`.
    pub async fn type_of(&self, key: &str) -> &'static str {
        match self.live_value(key).await {
            Some(Value::String(_)) => "string",
            Some(Value::Stream(_)) => "stream",
            None => "none",
        }
    }

    /// Appends an entry to the stream under `key`, creating the stream when the
    /// key is absent. Fetch, ID validation against the current tail, and the
    /// append all happen under one write-lock acquisition.
    ///
    /// Returns the assigned ID and a snapshot of the stream after the append,
    /// so the caller can notify blocked readers without holding the lock.
    pub async fn append_stream_entry(
        &self,
        key: &str,
        requested: RequestedId,
        fields: Vec<(String, String)>,
        now_ms: u64,
    ) -> Result<(StreamId, Stream), StreamAppendError> {
        let mut map = self.inner.write().await;

        let mut stream = match map.get(key) {
            Some(entry) if entry.is_expired_at(Timestamp::now()) => Stream::new(),
            Some(entry) => match &entry.value {
                Value::Stream(stream) => stream.clone(),
                Value::String(_) => return Err(StreamAppendError::WrongType),
            },
            None => Stream::new(),
        };

        let id = stream.resolve_id(requested, now_ms)?;
        stream.entries.push(StreamEntry { id, fields });

        map.insert(
            key.to_string(),
            Entry {
                value: Value::Stream(stream.clone()),
                expires_at: None,
            },
        );

        Ok((id, stream))
    }

    /// Number of live entries. Test and INFO plumbing.
    pub async fn len(&self) -> usize {
        let now = Timestamp::now();
        let map = self.inner.read().await;
        map.values().filter(|e| !e.is_expired_at(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Fetches the live value under `key`, treating expired entries as absent.
    /// An expired entry is deleted after the read lock is dropped.
    async fn live_value(&self, key: &str) -> Option<Value> {
        let expired = {
            let map = self.inner.read().await;
            let entry = map.get(key)?;

            if !entry.is_expired_at(Timestamp::now()) {
                return Some(entry.value.clone());
            }

            true
        };

        if expired {
            self.remove_if_expired(key).await;
        }

        None
    }

    async fn remove_if_expired(&self, key: &str) {
        let mut map = self.inner.write().await;

        if map
            .get(key)
            .is_some_and(|entry| entry.is_expired_at(Timestamp::now()))
        {
            map.remove(key);
        }
    }

    /// Removes every entry whose expiry has passed. One reaper pass.
    pub async fn purge_expired(&self) -> usize {
        let now = Timestamp::now();
        let mut map = self.inner.write().await;

        let before = map.len();
        map.retain(|_, entry| !entry.is_expired_at(now));
        before - map.len()
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum StreamAppendError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("{0}")]
    Id(#[from] StreamIdError),
}

/// Background task that wakes every 100 ms and purges expired entries.
pub fn spawn_expiry_reaper(store: Arc<Store>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(100));

        loop {
            ticker.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                debug!(purged, "expiry reaper removed keys");
            }
        }
    })
}
