use std::sync::Arc;

use crate::commands::{self, CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::dispatcher::propagate_write;
use crate::resp::RespValue;

/// EXEC runs the queued commands in order and replies the array of their
/// individual replies. A failing command contributes its error reply and the
/// queue keeps executing. Queued writes propagate to replicas exactly as they
/// would outside a transaction. EXEC outside a transaction is an error.
pub async fn exec(
    ctx: &Arc<ServerContext>,
    conn_id: u64,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    if !args.is_empty() {
        return Err(CommandError::WrongArity("exec"));
    }

    let Some(queued) = ctx.sessions.take_transaction(conn_id).await else {
        return Err(CommandError::ExecWithoutMulti);
    };

    let mut replies = Vec::with_capacity(queued.len());
    for frame in queued {
        replies.push(run_queued(ctx, conn_id, frame).await);
    }

    Ok(HandlerOutput::reply(RespValue::Array(replies)))
}

/// Executes one queued frame and folds its outcome into a single reply frame.
/// MULTI/EXEC/DISCARD never reach the queue; the dispatcher handles them
/// directly even inside a transaction.
async fn run_queued(ctx: &Arc<ServerContext>, conn_id: u64, frame: RespValue) -> RespValue {
    let Some((name, args)) = frame.as_command() else {
        return RespValue::Error("ERR invalid command format".to_string());
    };

    let is_write = ctx.registry.is_write(&name);

    // Boxed: EXEC dispatches through the same entry point that dispatched it.
    let result = Box::pin(commands::execute(ctx, conn_id, &name, args)).await;

    match result {
        Ok(output) => {
            if is_write && ctx.is_primary() {
                propagate_write(ctx, &frame).await;
            }

            output
                .reply
                .unwrap_or_else(|| RespValue::SimpleString("OK".to_string()))
        }
        Err(error) => error.as_reply(),
    }
}
