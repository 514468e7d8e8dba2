use crate::commands::{CommandError, HandlerOutput};
use crate::resp::RespValue;

/// PING with no argument replies `+PONG`; with one argument it echoes the
/// argument as a bulk string.
pub fn ping(args: Vec<String>) -> Result<HandlerOutput, CommandError> {
    match args.first() {
        None => Ok(HandlerOutput::reply(RespValue::SimpleString(
            "PONG".to_string(),
        ))),
        Some(message) => Ok(HandlerOutput::reply(RespValue::BulkString(
            message.clone(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping() {
        assert_eq!(
            ping(vec![]).unwrap().reply,
            Some(RespValue::SimpleString("PONG".to_string()))
        );
        assert_eq!(
            ping(vec!["hello".to_string()]).unwrap().reply,
            Some(RespValue::BulkString("hello".to_string()))
        );
    }
}
