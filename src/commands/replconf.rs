use std::sync::Arc;

use tracing::debug;

use crate::commands::{CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::resp::RespValue;

/// REPLCONF subcommands, stateless on the primary side:
///
/// - `LISTENING-PORT` / `CAPA`: handshake steps, reply `+OK`.
/// - `GETACK *`: reply a `REPLCONF ACK <offset>` array reporting this
///   process's propagation offset (zero on a primary by construction).
/// - `ACK <offset>`: record the replica's acknowledged offset; no reply.
pub async fn replconf(
    ctx: &Arc<ServerContext>,
    conn_id: u64,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    let subcommand = args.first().ok_or(CommandError::WrongArity("replconf"))?;

    match subcommand.to_uppercase().as_str() {
        "GETACK" => {
            let offset = ctx.local_offset().await;

            Ok(HandlerOutput::reply(RespValue::command([
                "REPLCONF".to_string(),
                "ACK".to_string(),
                offset.to_string(),
            ])))
        }
        "ACK" => {
            let offset = args
                .get(1)
                .and_then(|raw| raw.parse::<u64>().ok())
                .ok_or(CommandError::NotAnInteger)?;

            debug!(conn_id, offset, "replica acknowledged offset");
            ctx.replicas.update_ack(conn_id, offset).await;

            Ok(HandlerOutput::silent())
        }
        "LISTENING-PORT" | "CAPA" => Ok(HandlerOutput::reply(RespValue::SimpleString(
            "OK".to_string(),
        ))),
        _ => Ok(HandlerOutput::reply(RespValue::SimpleString(
            "OK".to_string(),
        ))),
    }
}
