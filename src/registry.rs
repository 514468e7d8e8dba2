//! Command registry: uppercase name → handler kind, plus the write flag that
//! drives replication fan-out.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandKind {
    Ping,
    Echo,
    Get,
    Set,
    Incr,
    Keys,
    Type,
    Config,
    Info,
    Xadd,
    Xrange,
    Xread,
    Replconf,
    Psync,
    Wait,
    Multi,
    Exec,
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandSpec {
    pub kind: CommandKind,
    /// Write commands advance the master offset and are broadcast to replicas.
    pub is_write: bool,
}

pub struct CommandRegistry {
    commands: HashMap<&'static str, CommandSpec>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            commands: HashMap::new(),
        };

        registry.register("PING", CommandKind::Ping, false);
        registry.register("ECHO", CommandKind::Echo, false);
        registry.register("GET", CommandKind::Get, false);
        registry.register("SET", CommandKind::Set, true);
        registry.register("INCR", CommandKind::Incr, true);
        registry.register("KEYS", CommandKind::Keys, false);
        registry.register("TYPE", CommandKind::Type, false);
        registry.register("CONFIG", CommandKind::Config, false);
        registry.register("INFO", CommandKind::Info, false);
        registry.register("XADD", CommandKind::Xadd, true);
        registry.register("XRANGE", CommandKind::Xrange, false);
        registry.register("XREAD", CommandKind::Xread, false);
        registry.register("REPLCONF", CommandKind::Replconf, false);
        registry.register("PSYNC", CommandKind::Psync, false);
        registry.register("WAIT", CommandKind::Wait, false);
        registry.register("MULTI", CommandKind::Multi, false);
        registry.register("EXEC", CommandKind::Exec, false);
        registry.register("DISCARD", CommandKind::Discard, false);

        registry
    }

    fn register(&mut self, name: &'static str, kind: CommandKind, is_write: bool) {
        self.commands.insert(name, CommandSpec { kind, is_write });
    }

    /// Looks up a command by its already-uppercased name.
    pub fn get(&self, name: &str) -> Option<CommandSpec> {
        self.commands.get(name).copied()
    }

    pub fn is_write(&self, name: &str) -> bool {
        self.get(name).is_some_and(|spec| spec.is_write)
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
