use std::sync::Arc;

use crate::commands::{CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::resp::RespValue;

/// `CONFIG GET name`. Recognized names are `dir` and `dbfilename`; `*` returns
/// both; anything else is an empty array. Other CONFIG subcommands are errors.
pub fn config(
    ctx: &Arc<ServerContext>,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    let subcommand = args.first().ok_or(CommandError::WrongArity("config"))?;

    if !subcommand.eq_ignore_ascii_case("get") {
        return Err(CommandError::UnknownConfigSubcommand(
            subcommand.to_uppercase(),
        ));
    }

    let name = args
        .get(1)
        .ok_or(CommandError::WrongArity("config|get"))?
        .to_lowercase();

    let mut pairs = Vec::new();
    if name == "dir" || name == "*" {
        pairs.push(RespValue::BulkString("dir".to_string()));
        pairs.push(RespValue::BulkString(ctx.config.dir.clone()));
    }
    if name == "dbfilename" || name == "*" {
        pairs.push(RespValue::BulkString("dbfilename".to_string()));
        pairs.push(RespValue::BulkString(ctx.config.dbfilename.clone()));
    }

    Ok(HandlerOutput::reply(RespValue::Array(pairs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::ServerConfig;

    fn context() -> Arc<ServerContext> {
        ServerContext::new(ServerConfig {
            dir: "/data".to_string(),
            dbfilename: "snap.rdb".to_string(),
            ..ServerConfig::default()
        })
    }

    fn bulk(parts: &[&str]) -> RespValue {
        RespValue::Array(
            parts
                .iter()
                .map(|p| RespValue::BulkString(p.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_config_get() {
        let ctx = context();

        let test_cases = vec![
            (vec!["GET", "dir"], bulk(&["dir", "/data"])),
            (vec!["get", "DBFILENAME"], bulk(&["dbfilename", "snap.rdb"])),
            (
                vec!["GET", "*"],
                bulk(&["dir", "/data", "dbfilename", "snap.rdb"]),
            ),
            (vec!["GET", "maxmemory"], bulk(&[])),
        ];

        for (input, expected) in test_cases {
            let args: Vec<String> = input.iter().map(|s| s.to_string()).collect();
            let output = config(&ctx, args).unwrap();
            assert_eq!(output.reply, Some(expected), "args {:?}", input);
        }
    }

    #[test]
    fn test_config_unknown_subcommand() {
        let ctx = context();
        assert_eq!(
            config(&ctx, vec!["SET".to_string(), "dir".to_string()]),
            Err(CommandError::UnknownConfigSubcommand("SET".to_string()))
        );
    }
}
