use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::commands::stream_utils::encode_key_entries;
use crate::commands::{CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::resp::RespValue;
use crate::stream::StreamId;
use crate::stream_coordinator::StreamDelivery;

/// Where a read starts for one stream key.
#[derive(Debug, Clone, PartialEq)]
enum ReadStart {
    /// `$`: only entries appended after the call; resolved to the stream's
    /// current tail at registration time. Only valid with BLOCK.
    Latest,
    After(StreamId),
}

#[derive(Debug, PartialEq)]
pub struct XreadArguments {
    /// `None` = non-blocking, `Some(None)` = BLOCK 0 (wait indefinitely),
    /// `Some(Some(d))` = BLOCK with a deadline.
    block: Option<Option<Duration>>,
    pairs: Vec<(String, ReadStart)>,
}

impl XreadArguments {
    /// `XREAD [BLOCK ms] STREAMS key [key ...] id [id ...]`
    pub fn parse(args: Vec<String>) -> Result<Self, CommandError> {
        if args.len() < 3 {
            return Err(CommandError::WrongArity("xread"));
        }

        let mut cursor = 0;
        let mut block = None;

        if args[cursor].eq_ignore_ascii_case("block") {
            let raw = args.get(cursor + 1).ok_or(CommandError::SyntaxError)?;
            let ms = raw.parse::<u64>().map_err(|_| CommandError::InvalidTimeout)?;

            block = Some(match ms {
                0 => None,
                _ => Some(Duration::from_millis(ms)),
            });
            cursor += 2;
        }

        if !args
            .get(cursor)
            .is_some_and(|a| a.eq_ignore_ascii_case("streams"))
        {
            return Err(CommandError::SyntaxError);
        }
        cursor += 1;

        let rest = &args[cursor..];
        if rest.is_empty() || rest.len() % 2 != 0 {
            return Err(CommandError::SyntaxError);
        }

        let count = rest.len() / 2;
        let mut pairs = Vec::with_capacity(count);

        for i in 0..count {
            let start = match rest[count + i].as_str() {
                "$" => {
                    if block.is_none() {
                        return Err(CommandError::DollarWithoutBlock);
                    }
                    ReadStart::Latest
                }
                raw => ReadStart::After(StreamId::parse_range_bound(raw, false)?),
            };
            pairs.push((rest[i].clone(), start));
        }

        Ok(Self { block, pairs })
    }
}

/// XREAD replies, per requested stream, the entries strictly newer than the
/// given ID. With BLOCK and no immediate results, the call suspends until the
/// first stream delivers or the timeout fires; a timeout replies a null bulk
/// string. Without BLOCK and no results, the reply is a null array.
pub async fn xread(
    ctx: &Arc<ServerContext>,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    let arguments = XreadArguments::parse(args)?;

    // Resolve `$` to the tail as of now; an absent stream resolves to 0-0.
    let mut resolved: Vec<(String, StreamId)> = Vec::with_capacity(arguments.pairs.len());
    for (key, start) in &arguments.pairs {
        let start = match start {
            ReadStart::After(id) => *id,
            ReadStart::Latest => ctx
                .store
                .get_stream(key)
                .await
                .map(|s| s.last_id())
                .unwrap_or(StreamId::ZERO),
        };
        resolved.push((key.clone(), start));
    }

    if let Some(reply) = scan(ctx, &resolved).await {
        return Ok(HandlerOutput::reply(reply));
    }

    let Some(deadline) = arguments.block else {
        return Ok(HandlerOutput::reply(RespValue::NullArray));
    };

    block_until_delivery(ctx, &resolved, deadline).await
}

/// One pass over the requested streams. `Some` when at least one stream has
/// newer entries.
async fn scan(ctx: &Arc<ServerContext>, resolved: &[(String, StreamId)]) -> Option<RespValue> {
    let mut results = Vec::new();

    for (key, start) in resolved {
        let Some(stream) = ctx.store.get_stream(key).await else {
            continue;
        };

        let entries = stream.entries_after(*start);
        if !entries.is_empty() {
            results.push(encode_key_entries(key, &entries));
        }
    }

    if results.is_empty() {
        None
    } else {
        Some(RespValue::Array(results))
    }
}

/// Registers a waiter per key and suspends until the first delivery or the
/// deadline. Exactly one of the two wins; registrations are removed on both
/// paths before returning.
async fn block_until_delivery(
    ctx: &Arc<ServerContext>,
    resolved: &[(String, StreamId)],
    deadline: Option<Duration>,
) -> Result<HandlerOutput, CommandError> {
    let (first_tx, mut first_rx) = mpsc::channel::<StreamDelivery>(1);
    let mut registrations = Vec::with_capacity(resolved.len());

    for (key, start) in resolved {
        let mut registration = ctx.streams.register(key, *start).await;
        let tx = first_tx.clone();

        registrations.push((registration.key.clone(), registration.token));

        // Fan-in: forward this key's delivery into the shared channel. Losing
        // forwarders find it full and drop their delivery.
        tokio::spawn(async move {
            if let Some(delivery) = registration.rx.recv().await {
                let _ = tx.try_send(delivery);
            }
        });
    }
    drop(first_tx);

    // An append between the initial scan and registration would otherwise be
    // missed until the next write; re-scan now that the waiters are in place.
    if let Some(reply) = scan(ctx, resolved).await {
        remove_registrations(ctx, &registrations).await;
        return Ok(HandlerOutput::reply(reply));
    }

    let winner = match deadline {
        Some(duration) => tokio::time::timeout(duration, first_rx.recv())
            .await
            .unwrap_or(None),
        None => first_rx.recv().await,
    };

    remove_registrations(ctx, &registrations).await;

    let reply = match winner {
        Some(delivery) => RespValue::Array(vec![encode_key_entries(
            &delivery.key,
            &delivery.entries,
        )]),
        None => RespValue::NullBulkString,
    };

    Ok(HandlerOutput::reply(reply))
}

async fn remove_registrations(ctx: &Arc<ServerContext>, registrations: &[(String, u64)]) {
    for (key, token) in registrations {
        ctx.streams.remove(key, *token).await;
    }
}
