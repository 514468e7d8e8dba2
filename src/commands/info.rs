use std::sync::Arc;

use crate::commands::{CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::resp::RespValue;

/// `INFO replication` replies a bulk string of `field:value` lines. Primaries
/// report their replication ID, master offset, and connected replica count;
/// replicas report only their role.
pub async fn info(
    ctx: &Arc<ServerContext>,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    let section = args.first().ok_or(CommandError::WrongArity("info"))?;

    if !section.eq_ignore_ascii_case("replication") {
        return Err(CommandError::UnknownInfoSection);
    }

    let body = if ctx.is_primary() {
        format!(
            "role:{}\r\nmaster_replid:{}\r\nmaster_repl_offset:{}\r\nconnected_slaves:{}",
            ctx.role.as_str(),
            ctx.repl_id,
            ctx.master_offset().await,
            ctx.replicas.len().await,
        )
    } else {
        format!("role:{}", ctx.role.as_str())
    };

    Ok(HandlerOutput::reply(RespValue::BulkString(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::ServerConfig;

    #[tokio::test]
    async fn test_info_on_primary() {
        let ctx = ServerContext::new(ServerConfig::default());
        ctx.advance_master_offset(120).await;

        let output = info(&ctx, vec!["replication".to_string()]).await.unwrap();
        let Some(RespValue::BulkString(body)) = output.reply else {
            panic!("expected bulk string");
        };

        assert!(body.contains("role:master"));
        assert!(body.contains(&format!("master_replid:{}", ctx.repl_id)));
        assert!(body.contains("master_repl_offset:120"));
        assert!(body.contains("connected_slaves:0"));
    }

    #[tokio::test]
    async fn test_info_on_replica() {
        let ctx = ServerContext::new(ServerConfig {
            replicaof: Some(("localhost".to_string(), 6379)),
            ..ServerConfig::default()
        });

        let output = info(&ctx, vec!["REPLICATION".to_string()]).await.unwrap();
        assert_eq!(
            output.reply,
            Some(RespValue::BulkString("role:slave".to_string()))
        );
    }

    #[tokio::test]
    async fn test_info_rejects_other_sections() {
        let ctx = ServerContext::new(ServerConfig::default());
        assert_eq!(
            info(&ctx, vec!["memory".to_string()]).await,
            Err(CommandError::UnknownInfoSection)
        );
    }
}
