//! Command-level errors.
//!
//! Display strings are exactly what clients see on the wire, so rendering a
//! reply is just `RespValue::Error(error.to_string())`.

use thiserror::Error;

use crate::resp::RespValue;
use crate::store::StreamAppendError;
use crate::stream::StreamIdError;

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),
    #[error("ERR syntax error")]
    SyntaxError,
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,
    #[error("ERR timeout is not a valid integer or out of range")]
    InvalidTimeout,
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("ERR {0}")]
    StreamId(#[from] StreamIdError),
    #[error("ERR $ ID is only valid with BLOCK option")]
    DollarWithoutBlock,
    #[error("ERR EXEC without MULTI")]
    ExecWithoutMulti,
    #[error("ERR DISCARD without MULTI")]
    DiscardWithoutMulti,
    #[error("ERR only replication section is supported")]
    UnknownInfoSection,
    #[error("ERR unknown subcommand '{0}'. Try CONFIG GET")]
    UnknownConfigSubcommand(String),
    #[error("ERR invalid keys pattern")]
    InvalidKeysPattern,
    #[error("ERR invalid replication id")]
    InvalidReplicationId,
}

impl CommandError {
    /// The RESP error frame for this failure.
    pub fn as_reply(&self) -> RespValue {
        RespValue::Error(self.to_string())
    }
}

impl From<StreamAppendError> for CommandError {
    fn from(error: StreamAppendError) -> Self {
        match error {
            StreamAppendError::WrongType => CommandError::WrongType,
            StreamAppendError::Id(id_error) => CommandError::StreamId(id_error),
        }
    }
}
