use std::sync::Arc;
use std::time::Duration;

use crate::commands::{CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::resp::RespValue;
use crate::store::Value;

/// Existence condition carried by NX/XX.
#[derive(Debug, PartialEq, Clone, Copy)]
enum SetCondition {
    Always,
    IfAbsent,
    IfPresent,
}

#[derive(Debug, PartialEq)]
pub struct SetArguments {
    key: String,
    value: String,
    ttl: Option<Duration>,
    condition: SetCondition,
}

impl SetArguments {
    /// `SET key value [EX seconds | PX milliseconds] [NX | XX]`. Combining NX
    /// with XX is a syntax error; a TTL must be a positive integer.
    pub fn parse(args: Vec<String>) -> Result<Self, CommandError> {
        if args.len() < 2 {
            return Err(CommandError::WrongArity("set"));
        }

        let mut ttl = None;
        let mut condition = SetCondition::Always;

        let mut options = args[2..].iter();
        while let Some(option) = options.next() {
            match option.to_uppercase().as_str() {
                "PX" => {
                    let value = options.next().ok_or(CommandError::SyntaxError)?;
                    ttl = Some(Duration::from_millis(parse_ttl(value)?));
                }
                "EX" => {
                    let value = options.next().ok_or(CommandError::SyntaxError)?;
                    ttl = Some(Duration::from_secs(parse_ttl(value)?));
                }
                "NX" => {
                    if condition == SetCondition::IfPresent {
                        return Err(CommandError::SyntaxError);
                    }
                    condition = SetCondition::IfAbsent;
                }
                "XX" => {
                    if condition == SetCondition::IfAbsent {
                        return Err(CommandError::SyntaxError);
                    }
                    condition = SetCondition::IfPresent;
                }
                _ => return Err(CommandError::SyntaxError),
            }
        }

        Ok(Self {
            key: args[0].clone(),
            value: args[1].clone(),
            ttl,
            condition,
        })
    }
}

fn parse_ttl(value: &str) -> Result<u64, CommandError> {
    let parsed = value
        .parse::<i64>()
        .map_err(|_| CommandError::NotAnInteger)?;

    if parsed <= 0 {
        return Err(CommandError::NotAnInteger);
    }

    Ok(parsed as u64)
}

/// SET replies `+OK`, or a null bulk string when an NX/XX condition fails.
pub async fn set(
    ctx: &Arc<ServerContext>,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    let arguments = SetArguments::parse(args)?;

    let condition_met = match arguments.condition {
        SetCondition::Always => true,
        SetCondition::IfAbsent => !ctx.store.exists(&arguments.key).await,
        SetCondition::IfPresent => ctx.store.exists(&arguments.key).await,
    };

    if !condition_met {
        return Ok(HandlerOutput::reply(RespValue::NullBulkString));
    }

    ctx.store
        .set(&arguments.key, Value::String(arguments.value), arguments.ttl)
        .await;

    Ok(HandlerOutput::reply(RespValue::SimpleString(
        "OK".to_string(),
    )))
}
