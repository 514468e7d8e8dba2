use crate::commands::{CommandError, HandlerOutput};
use crate::resp::RespValue;

pub fn echo(args: Vec<String>) -> Result<HandlerOutput, CommandError> {
    let message = args.first().ok_or(CommandError::WrongArity("echo"))?;

    Ok(HandlerOutput::reply(RespValue::BulkString(message.clone())))
}
