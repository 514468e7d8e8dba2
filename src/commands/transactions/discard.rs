use std::sync::Arc;

use crate::commands::{CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::resp::RespValue;

/// DISCARD drops the queued commands and leaves transaction mode. Outside a
/// transaction it is an error.
pub async fn discard(
    ctx: &Arc<ServerContext>,
    conn_id: u64,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    if !args.is_empty() {
        return Err(CommandError::WrongArity("discard"));
    }

    if !ctx.sessions.discard_transaction(conn_id).await {
        return Err(CommandError::DiscardWithoutMulti);
    }

    Ok(HandlerOutput::reply(RespValue::SimpleString(
        "OK".to_string(),
    )))
}
