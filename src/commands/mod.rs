//! Command handlers.
//!
//! Every handler follows the same shape: an `Arguments` struct with a `parse`
//! constructor that validates arity and value ranges, and an async handler that
//! runs against the [`ServerContext`] and produces a [`HandlerOutput`].

mod command_error;
mod config_get;
mod echo;
mod get;
mod incr;
mod info;
mod keys;
mod ping;
mod psync;
mod replconf;
mod set;
mod stream_utils;
mod transactions;
mod type_command;
mod wait;
mod xadd;
mod xrange;
mod xread;

use std::sync::Arc;

pub use command_error::CommandError;

use crate::context::ServerContext;
use crate::registry::CommandKind;
use crate::resp::RespValue;

/// What a handler hands back to the dispatcher: an optional reply frame and
/// optional raw bytes appended verbatim after it. The raw bytes exist for
/// PSYNC, whose snapshot block must follow the reply without normal framing.
/// A `None` reply means nothing is written (REPLCONF ACK).
#[derive(Debug, PartialEq)]
pub struct HandlerOutput {
    pub reply: Option<RespValue>,
    pub extra_bytes: Option<Vec<u8>>,
}

impl HandlerOutput {
    pub fn reply(value: RespValue) -> Self {
        Self {
            reply: Some(value),
            extra_bytes: None,
        }
    }

    pub fn reply_with_bytes(value: RespValue, bytes: Vec<u8>) -> Self {
        Self {
            reply: Some(value),
            extra_bytes: Some(bytes),
        }
    }

    pub fn silent() -> Self {
        Self {
            reply: None,
            extra_bytes: None,
        }
    }
}

/// Runs one command against the server state. The caller has already handled
/// transaction queueing; this is the point where a command actually executes.
pub async fn execute(
    ctx: &Arc<ServerContext>,
    conn_id: u64,
    name: &str,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    let Some(spec) = ctx.registry.get(name) else {
        return Err(CommandError::UnknownCommand(name.to_string()));
    };

    match spec.kind {
        CommandKind::Ping => ping::ping(args),
        CommandKind::Echo => echo::echo(args),
        CommandKind::Get => get::get(ctx, args).await,
        CommandKind::Set => set::set(ctx, args).await,
        CommandKind::Incr => incr::incr(ctx, args).await,
        CommandKind::Keys => keys::keys(ctx, args).await,
        CommandKind::Type => type_command::type_command(ctx, args).await,
        CommandKind::Config => config_get::config(ctx, args),
        CommandKind::Info => info::info(ctx, args).await,
        CommandKind::Xadd => xadd::xadd(ctx, args).await,
        CommandKind::Xrange => xrange::xrange(ctx, args).await,
        CommandKind::Xread => xread::xread(ctx, args).await,
        CommandKind::Replconf => replconf::replconf(ctx, conn_id, args).await,
        CommandKind::Psync => psync::psync(ctx, args).await,
        CommandKind::Wait => wait::wait(ctx, args).await,
        CommandKind::Multi => transactions::multi(ctx, conn_id, args).await,
        CommandKind::Exec => transactions::exec(ctx, conn_id, args).await,
        CommandKind::Discard => transactions::discard(ctx, conn_id, args).await,
    }
}
