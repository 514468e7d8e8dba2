use std::sync::Arc;

use crate::commands::{CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::rdb::EMPTY_RDB;
use crate::resp::RespValue;

pub struct PsyncArguments {
    repl_id: String,
}

impl PsyncArguments {
    pub fn parse(args: Vec<String>) -> Result<Self, CommandError> {
        let [repl_id, _offset]: [String; 2] = args
            .try_into()
            .map_err(|_| CommandError::WrongArity("psync"))?;

        Ok(Self { repl_id })
    }
}

/// `PSYNC ? -1` replies `+FULLRESYNC <repl_id> <offset>` followed by the raw
/// snapshot block. The block is bulk-string framed without the trailing CRLF,
/// which is why it travels as extra bytes rather than a regular frame. The
/// dispatcher registers the connection as a replica after writing both.
pub async fn psync(
    ctx: &Arc<ServerContext>,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    let arguments = PsyncArguments::parse(args)?;

    if arguments.repl_id != "?" && arguments.repl_id != ctx.repl_id {
        return Err(CommandError::InvalidReplicationId);
    }

    let reply = RespValue::SimpleString(format!(
        "FULLRESYNC {} {}",
        ctx.repl_id,
        ctx.master_offset().await
    ));

    let mut block = format!("${}\r\n", EMPTY_RDB.len()).into_bytes();
    block.extend_from_slice(&EMPTY_RDB);

    Ok(HandlerOutput::reply_with_bytes(reply, block))
}
