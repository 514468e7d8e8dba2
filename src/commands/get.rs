use std::sync::Arc;

use crate::commands::{CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::resp::RespValue;

pub struct GetArguments {
    pub key: String,
}

impl GetArguments {
    pub fn parse(args: Vec<String>) -> Result<Self, CommandError> {
        let [key] = args.try_into().map_err(|_| CommandError::WrongArity("get"))?;
        Ok(Self { key })
    }
}

/// GET replies the string value, or a null bulk string when the key is absent,
/// expired, or holds a stream.
pub async fn get(
    ctx: &Arc<ServerContext>,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    let arguments = GetArguments::parse(args)?;

    let reply = match ctx.store.get(&arguments.key).await {
        Some(value) => RespValue::BulkString(value),
        None => RespValue::NullBulkString,
    };

    Ok(HandlerOutput::reply(reply))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::ServerConfig;
    use crate::store::Value;

    #[tokio::test]
    async fn test_get() {
        let ctx = ServerContext::new(ServerConfig::default());
        ctx.store
            .set("k", Value::String("v".to_string()), None)
            .await;

        let hit = get(&ctx, vec!["k".to_string()]).await.unwrap();
        assert_eq!(hit.reply, Some(RespValue::BulkString("v".to_string())));

        let miss = get(&ctx, vec!["other".to_string()]).await.unwrap();
        assert_eq!(miss.reply, Some(RespValue::NullBulkString));

        assert_eq!(
            get(&ctx, vec![]).await,
            Err(CommandError::WrongArity("get"))
        );
    }
}
