use std::sync::Arc;

use crate::commands::{CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::resp::RespValue;

pub struct TypeArguments {
    pub key: String,
}

impl TypeArguments {
    pub fn parse(args: Vec<String>) -> Result<Self, CommandError> {
        let [key] = args
            .try_into()
            .map_err(|_| CommandError::WrongArity("type"))?;
        Ok(Self { key })
    }
}

/// TYPE replies the observed type as a simple string: `string`, `stream`, or
/// `none` for missing and expired keys.
pub async fn type_command(
    ctx: &Arc<ServerContext>,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    let arguments = TypeArguments::parse(args)?;
    let observed = ctx.store.type_of(&arguments.key).await;

    Ok(HandlerOutput::reply(RespValue::SimpleString(
        observed.to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::ServerConfig;
    use crate::store::Value;
    use crate::stream::{RequestedId, StreamId};

    #[tokio::test]
    async fn test_type_command() {
        let ctx = ServerContext::new(ServerConfig::default());
        ctx.store
            .set("s", Value::String("v".to_string()), None)
            .await;
        ctx.store
            .append_stream_entry("x", RequestedId::Explicit(StreamId::new(1, 1)), vec![], 0)
            .await
            .unwrap();

        let test_cases = vec![("s", "string"), ("x", "stream"), ("nope", "none")];

        for (key, expected) in test_cases {
            let output = type_command(&ctx, vec![key.to_string()]).await.unwrap();
            assert_eq!(
                output.reply,
                Some(RespValue::SimpleString(expected.to_string())),
                "key {:?}",
                key
            );
        }
    }
}
