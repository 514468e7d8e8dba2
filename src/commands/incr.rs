use std::sync::Arc;

use crate::commands::{CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::resp::RespValue;
use crate::store::Value;

pub struct IncrArguments {
    pub key: String,
}

impl IncrArguments {
    pub fn parse(args: Vec<String>) -> Result<Self, CommandError> {
        let [key] = args
            .try_into()
            .map_err(|_| CommandError::WrongArity("incr"))?;
        Ok(Self { key })
    }
}

/// INCR treats an absent key as 0 and replies the incremented integer. A value
/// that does not parse as a signed 64-bit integer is an error.
pub async fn incr(
    ctx: &Arc<ServerContext>,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    let arguments = IncrArguments::parse(args)?;

    let current = match ctx.store.get(&arguments.key).await {
        Some(value) => value
            .parse::<i64>()
            .map_err(|_| CommandError::NotAnInteger)?,
        None => 0,
    };

    let next = current.checked_add(1).ok_or(CommandError::NotAnInteger)?;

    ctx.store
        .set(&arguments.key, Value::String(next.to_string()), None)
        .await;

    Ok(HandlerOutput::reply(RespValue::Integer(next)))
}
