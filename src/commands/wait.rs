use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::commands::{CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::resp::RespValue;

#[derive(Debug, PartialEq)]
pub struct WaitArguments {
    replicas_wanted: usize,
    /// `None` for a zero timeout: poll once and return.
    timeout: Option<Duration>,
}

impl WaitArguments {
    pub fn parse(args: Vec<String>) -> Result<Self, CommandError> {
        let [count, timeout]: [String; 2] = args
            .try_into()
            .map_err(|_| CommandError::WrongArity("wait"))?;

        let replicas_wanted = count
            .parse::<usize>()
            .map_err(|_| CommandError::NotAnInteger)?;
        let timeout_ms = timeout
            .parse::<u64>()
            .map_err(|_| CommandError::NotAnInteger)?;

        Ok(Self {
            replicas_wanted,
            timeout: match timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        })
    }
}

/// WAIT broadcasts `REPLCONF GETACK *` to all replicas, snapshots the master
/// offset, and polls the replica table every 10 ms until enough replicas have
/// acknowledged that offset or the timeout elapses. The reply is the
/// acknowledged count at exit. With no replicas connected the reply is 0.
pub async fn wait(
    ctx: &Arc<ServerContext>,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    let arguments = WaitArguments::parse(args)?;

    if ctx.replicas.is_empty().await {
        return Ok(HandlerOutput::reply(RespValue::Integer(0)));
    }

    let getack = RespValue::command(["REPLCONF", "GETACK", "*"]);
    ctx.replicas.broadcast(getack.encode().as_bytes()).await;

    let target = ctx.master_offset().await;
    let deadline = arguments.timeout.map(|t| Instant::now() + t);

    loop {
        let acked = ctx.replicas.count_acked(target).await;

        if acked >= arguments.replicas_wanted {
            return Ok(HandlerOutput::reply(RespValue::Integer(acked as i64)));
        }

        match deadline {
            Some(deadline) if Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            _ => {
                return Ok(HandlerOutput::reply(RespValue::Integer(acked as i64)));
            }
        }
    }
}
