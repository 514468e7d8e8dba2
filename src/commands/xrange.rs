use std::sync::Arc;

use crate::commands::stream_utils::encode_entry;
use crate::commands::{CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::resp::RespValue;
use crate::stream::StreamId;

#[derive(Debug, PartialEq)]
pub struct XrangeArguments {
    key: String,
    start: StreamId,
    end: StreamId,
}

impl XrangeArguments {
    /// `XRANGE key start end`. `-`/`+` are the open bounds; a one-part ID means
    /// sequence 0 on the start side and the maximum sequence on the end side.
    pub fn parse(args: Vec<String>) -> Result<Self, CommandError> {
        let [key, start, end]: [String; 3] = args
            .try_into()
            .map_err(|_| CommandError::WrongArity("xrange"))?;

        Ok(Self {
            key,
            start: StreamId::parse_range_bound(&start, false)?,
            end: StreamId::parse_range_bound(&end, true)?,
        })
    }
}

/// XRANGE replies the inclusive ID range as an array of `[id, fields]` pairs.
/// A missing or non-stream key yields an empty array.
pub async fn xrange(
    ctx: &Arc<ServerContext>,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    let arguments = XrangeArguments::parse(args)?;

    let entries = match ctx.store.get_stream(&arguments.key).await {
        Some(stream) => stream
            .range(arguments.start, arguments.end)
            .into_iter()
            .map(encode_entry)
            .collect(),
        None => Vec::new(),
    };

    Ok(HandlerOutput::reply(RespValue::Array(entries)))
}
