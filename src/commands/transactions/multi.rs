use std::sync::Arc;

use crate::commands::{CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::resp::RespValue;

/// MULTI enters transaction mode for this connection. A nested MULTI re-enters
/// and resets the queue.
pub async fn multi(
    ctx: &Arc<ServerContext>,
    conn_id: u64,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    if !args.is_empty() {
        return Err(CommandError::WrongArity("multi"));
    }

    ctx.sessions.begin_transaction(conn_id).await;

    Ok(HandlerOutput::reply(RespValue::SimpleString(
        "OK".to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::ServerConfig;

    #[tokio::test]
    async fn test_multi() {
        let ctx = ServerContext::new(ServerConfig::default());

        let output = multi(&ctx, 1, vec![]).await.unwrap();
        assert_eq!(output.reply, Some(RespValue::SimpleString("OK".to_string())));
        assert!(ctx.sessions.in_transaction(1).await);

        assert_eq!(
            multi(&ctx, 1, vec!["extra".to_string()]).await,
            Err(CommandError::WrongArity("multi"))
        );
    }
}
