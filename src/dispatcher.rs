//! Per-connection command loop and the listener that feeds it.
//!
//! The dispatcher decodes frames, routes them through the registry, writes the
//! reply (plus any raw trailing bytes), and performs the two post-reply side
//! effects: registering a PSYNC connection as a replica, and fanning out write
//! commands to the replica table.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::commands::{self, HandlerOutput};
use crate::context::ServerContext;
use crate::replica::SharedWriter;
use crate::resp::RespValue;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Accept loop: one task per connection.
pub async fn serve(ctx: Arc<ServerContext>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
                debug!(conn_id, %peer, "accepted connection");

                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    handle_connection(ctx, stream, conn_id).await;
                });
            }
            Err(err) => {
                error!(%err, "failed to accept connection");
            }
        }
    }
}

/// Reads frames off one connection until EOF or a protocol error, dispatching
/// each through the command registry.
pub async fn handle_connection(ctx: Arc<ServerContext>, stream: TcpStream, conn_id: u64) {
    let (mut reader, writer) = stream.into_split();
    let writer: SharedWriter = Arc::new(Mutex::new(writer));
    let mut buffer = BytesMut::with_capacity(4 * 1024);

    loop {
        let frame = match read_frame(&mut reader, &mut buffer).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                debug!(conn_id, %err, "closing connection on protocol error");
                break;
            }
        };

        process_frame(&ctx, conn_id, &writer, frame).await;
    }

    ctx.sessions.remove(conn_id).await;
    ctx.replicas.remove(conn_id).await;
    debug!(conn_id, "connection closed");
}

/// Fills `buffer` from the socket until one complete frame can be decoded.
/// `Ok(None)` is a clean EOF.
async fn read_frame(
    reader: &mut OwnedReadHalf,
    buffer: &mut BytesMut,
) -> Result<Option<RespValue>, crate::resp::RespError> {
    loop {
        if let Some(frame) = RespValue::decode(buffer)? {
            return Ok(Some(frame));
        }

        match reader.read_buf(buffer).await {
            Ok(0) => return Ok(None),
            Ok(_) => continue,
            Err(_) => return Ok(None),
        }
    }
}

/// Routes one decoded frame: transaction queueing, handler dispatch, reply
/// write, then the post-reply side effects.
async fn process_frame(
    ctx: &Arc<ServerContext>,
    conn_id: u64,
    writer: &SharedWriter,
    frame: RespValue,
) {
    let Some((name, args)) = frame.as_command() else {
        let reply = RespValue::Error("ERR invalid command format".to_string());
        write_reply(writer, &HandlerOutput::reply(reply)).await;
        return;
    };

    // Inside a transaction everything except the transaction controls is
    // queued rather than executed.
    if ctx.sessions.in_transaction(conn_id).await
        && !matches!(name.as_str(), "MULTI" | "EXEC" | "DISCARD")
    {
        ctx.sessions.queue_frame(conn_id, frame).await;
        let queued = RespValue::SimpleString("QUEUED".to_string());
        write_reply(writer, &HandlerOutput::reply(queued)).await;
        return;
    }

    let output = match commands::execute(ctx, conn_id, &name, args).await {
        Ok(output) => output,
        Err(err) => HandlerOutput::reply(err.as_reply()),
    };

    write_reply(writer, &output).await;

    if name == "PSYNC" && output.extra_bytes.is_some() {
        ctx.replicas.add(conn_id, Arc::clone(writer)).await;
        debug!(conn_id, "registered replica after full resync");
    }

    if ctx.registry.is_write(&name) && ctx.is_primary() {
        propagate_write(ctx, &frame).await;
    }
}

/// Advances the master offset by the frame's canonical length and broadcasts
/// the frame to every replica. Failed replicas are dropped by the table.
pub async fn propagate_write(ctx: &ServerContext, frame: &RespValue) {
    let encoded = frame.encode();
    let offset = ctx.advance_master_offset(encoded.len() as u64).await;

    debug!(offset, bytes = encoded.len(), "propagating write");
    ctx.replicas.broadcast(encoded.as_bytes()).await;
}

async fn write_reply(writer: &SharedWriter, output: &HandlerOutput) {
    let mut bytes = Vec::new();
    if let Some(reply) = &output.reply {
        bytes.extend_from_slice(reply.encode().as_bytes());
    }
    if let Some(extra) = &output.extra_bytes {
        bytes.extend_from_slice(extra);
    }

    if bytes.is_empty() {
        return;
    }

    let mut guard = writer.lock().await;
    let result = async {
        guard.write_all(&bytes).await?;
        guard.flush().await
    }
    .await;

    if let Err(err) = result {
        warn!(%err, "failed to write reply");
    }
}
