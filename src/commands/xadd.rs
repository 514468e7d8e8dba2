use std::sync::Arc;

use jiff::Timestamp;

use crate::commands::{CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::resp::RespValue;
use crate::stream::RequestedId;

#[derive(Debug, PartialEq)]
pub struct XaddArguments {
    key: String,
    id: RequestedId,
    fields: Vec<(String, String)>,
}

impl XaddArguments {
    /// `XADD key id field value [field value ...]`. At least one field/value
    /// pair, and pairs must be complete.
    pub fn parse(args: Vec<String>) -> Result<Self, CommandError> {
        if args.len() < 4 || args[2..].len() % 2 != 0 {
            return Err(CommandError::WrongArity("xadd"));
        }

        let id = RequestedId::parse(&args[1])?;

        let fields = args[2..]
            .chunks(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();

        Ok(Self {
            key: args[0].clone(),
            id,
            fields,
        })
    }
}

/// XADD appends an entry and replies the assigned ID as a bulk string. The
/// append happens under the store's write lock; blocked readers are notified
/// afterwards from the returned snapshot, outside any lock.
pub async fn xadd(
    ctx: &Arc<ServerContext>,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    let arguments = XaddArguments::parse(args)?;
    let now_ms = Timestamp::now().as_millisecond().max(0) as u64;

    let (id, snapshot) = ctx
        .store
        .append_stream_entry(&arguments.key, arguments.id, arguments.fields, now_ms)
        .await?;

    ctx.streams.notify(&arguments.key, &snapshot).await;

    Ok(HandlerOutput::reply(RespValue::BulkString(id.to_string())))
}
