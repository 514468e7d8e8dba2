//! Shared server state threaded through handlers and background tasks.
//!
//! There are no global singletons: everything a handler can touch hangs off a
//! [`ServerContext`], which makes tests trivial to isolate.

use std::sync::Arc;

use rand::distr::{Alphanumeric, SampleString};
use tokio::sync::RwLock;

use crate::config::ServerConfig;
use crate::registry::CommandRegistry;
use crate::replica::ReplicaTable;
use crate::session::SessionTable;
use crate::store::Store;
use crate::stream_coordinator::StreamCoordinator;

/// Role of this process in replication.
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    Primary,
    Replica { host: String, port: u16 },
}

impl Role {
    /// Redis wire terminology: primaries report "master", replicas "slave".
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primary => "master",
            Role::Replica { .. } => "slave",
        }
    }
}

pub struct ServerContext {
    pub config: ServerConfig,
    pub role: Role,
    /// 40-character replication ID generated at startup.
    pub repl_id: String,
    pub store: Arc<Store>,
    pub streams: StreamCoordinator,
    pub replicas: ReplicaTable,
    pub sessions: SessionTable,
    pub registry: CommandRegistry,
    /// Bytes of the command stream broadcast to replicas since startup.
    master_offset: RwLock<u64>,
    /// Bytes of the primary's propagation stream this replica has consumed.
    local_offset: RwLock<u64>,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let role = match &config.replicaof {
            Some((host, port)) => Role::Replica {
                host: host.clone(),
                port: *port,
            },
            None => Role::Primary,
        };

        Arc::new(Self {
            config,
            role,
            repl_id: Alphanumeric.sample_string(&mut rand::rng(), 40),
            store: Arc::new(Store::new()),
            streams: StreamCoordinator::new(),
            replicas: ReplicaTable::new(),
            sessions: SessionTable::new(),
            registry: CommandRegistry::new(),
            master_offset: RwLock::new(0),
            local_offset: RwLock::new(0),
        })
    }

    pub fn is_primary(&self) -> bool {
        self.role == Role::Primary
    }

    pub async fn master_offset(&self) -> u64 {
        *self.master_offset.read().await
    }

    pub async fn advance_master_offset(&self, bytes: u64) -> u64 {
        let mut offset = self.master_offset.write().await;
        *offset += bytes;
        *offset
    }

    pub async fn local_offset(&self) -> u64 {
        *self.local_offset.read().await
    }

    pub async fn advance_local_offset(&self, bytes: u64) -> u64 {
        let mut offset = self.local_offset.write().await;
        *offset += bytes;
        *offset
    }
}
