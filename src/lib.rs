//! An in-memory key/value server speaking a RESP subset.
//!
//! One process runs either as a primary, serving reads and writes and fanning
//! writes out to its replicas, or as a replica ingesting the primary's command
//! stream. Supported features:
//!
//! - String values with per-key expiry (SET with EX/PX/NX/XX, GET, INCR, KEYS,
//!   TYPE)
//! - Streams with strictly ordered IDs (XADD, XRANGE, XREAD including blocking
//!   reads)
//! - Transactions (MULTI, EXEC, DISCARD)
//! - Master/replica replication: PSYNC full resync, command propagation,
//!   offset acknowledgement, WAIT
//! - RDB snapshot loading at startup
//!
//! Concurrency is one tokio task per connection plus background tasks for the
//! expiry reaper and, on replicas, the replication driver. All shared state
//! hangs off [`context::ServerContext`].

pub mod commands;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod rdb;
pub mod registry;
pub mod replica;
pub mod replication;
pub mod resp;
pub mod session;
pub mod store;
pub mod stream;
pub mod stream_coordinator;
