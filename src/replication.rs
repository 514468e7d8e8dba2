//! Replica-side replication driver.
//!
//! Connects to the primary at startup, walks the PING/REPLCONF/PSYNC
//! handshake, ingests the snapshot block, then applies the propagated command
//! stream against the local store while tracking the consumed byte offset.
//! `REPLCONF GETACK *` is answered with the offset as measured before the
//! GETACK frame itself was consumed.

use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::commands;
use crate::context::ServerContext;
use crate::resp::{RespError, RespValue, decode_rdb_payload};

/// Connection ID under which propagated commands run. Never collides with
/// client connections, whose IDs start at 1.
const PRIMARY_LINK_CONN_ID: u64 = 0;

#[derive(Error, Debug, PartialEq)]
pub enum ReplicationError {
    #[error("I/O error talking to primary: {0}")]
    Io(String),
    #[error("primary closed the connection")]
    ConnectionClosed,
    #[error("protocol error from primary: {0}")]
    Protocol(#[from] RespError),
    #[error("unexpected reply from primary: {0}")]
    UnexpectedReply(String),
}

/// Runs the driver until the primary connection drops. EOF is a silent close;
/// per-frame parse failures inside the propagation loop are logged and the
/// next frame is attempted.
pub async fn run(ctx: Arc<ServerContext>, host: &str, port: u16) -> Result<(), ReplicationError> {
    let address = format!("{}:{}", host, port);
    let mut stream = TcpStream::connect(&address)
        .await
        .map_err(|e| ReplicationError::Io(e.to_string()))?;
    let mut buffer = BytesMut::with_capacity(4 * 1024);

    handshake(&ctx, &mut stream, &mut buffer).await?;

    let snapshot = read_snapshot_block(&mut stream, &mut buffer).await?;
    info!(
        primary = %address,
        snapshot_bytes = snapshot.len(),
        "full resync complete, entering propagation loop"
    );

    propagation_loop(&ctx, stream, buffer).await
}

/// PING → REPLCONF listening-port → REPLCONF capa psync2 → PSYNC ? -1.
async fn handshake(
    ctx: &Arc<ServerContext>,
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
) -> Result<(), ReplicationError> {
    let pong = exchange(stream, buffer, RespValue::command(["PING"])).await?;
    expect_simple(&pong, "PONG")?;

    let port_ack = exchange(
        stream,
        buffer,
        RespValue::command([
            "REPLCONF".to_string(),
            "listening-port".to_string(),
            ctx.config.port.to_string(),
        ]),
    )
    .await?;
    expect_simple(&port_ack, "OK")?;

    let capa_ack = exchange(
        stream,
        buffer,
        RespValue::command(["REPLCONF", "capa", "psync2"]),
    )
    .await?;
    expect_simple(&capa_ack, "OK")?;

    let resync = exchange(stream, buffer, RespValue::command(["PSYNC", "?", "-1"])).await?;
    let RespValue::SimpleString(line) = &resync else {
        return Err(ReplicationError::UnexpectedReply(format!("{:?}", resync)));
    };

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 3 || parts[0] != "FULLRESYNC" {
        return Err(ReplicationError::UnexpectedReply(line.clone()));
    }

    debug!(repl_id = parts[1], offset = parts[2], "primary accepted full resync");
    Ok(())
}

fn expect_simple(reply: &RespValue, expected: &str) -> Result<(), ReplicationError> {
    if *reply != RespValue::SimpleString(expected.to_string()) {
        return Err(ReplicationError::UnexpectedReply(format!("{:?}", reply)));
    }
    Ok(())
}

/// Writes one command and reads one reply frame.
async fn exchange(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
    command: RespValue,
) -> Result<RespValue, ReplicationError> {
    stream
        .write_all(command.encode().as_bytes())
        .await
        .map_err(|e| ReplicationError::Io(e.to_string()))?;
    stream
        .flush()
        .await
        .map_err(|e| ReplicationError::Io(e.to_string()))?;

    read_frame(stream, buffer)
        .await?
        .ok_or(ReplicationError::ConnectionClosed)
}

async fn read_frame(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
) -> Result<Option<RespValue>, ReplicationError> {
    loop {
        if let Some(frame) = RespValue::decode(buffer)? {
            return Ok(Some(frame));
        }

        match stream.read_buf(buffer).await {
            Ok(0) => return Ok(None),
            Ok(_) => continue,
            Err(e) => return Err(ReplicationError::Io(e.to_string())),
        }
    }
}

/// Reads the `$<len>\r\n<bytes>` snapshot block that follows FULLRESYNC. The
/// block carries no trailing CRLF.
async fn read_snapshot_block(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
) -> Result<Vec<u8>, ReplicationError> {
    loop {
        if let Some(payload) = decode_rdb_payload(buffer)? {
            return Ok(payload);
        }

        match stream.read_buf(buffer).await {
            Ok(0) => return Err(ReplicationError::ConnectionClosed),
            Ok(_) => continue,
            Err(e) => return Err(ReplicationError::Io(e.to_string())),
        }
    }
}

/// Applies the primary's command stream. Every frame advances the local offset
/// by its canonical encoded length, after any GETACK reply has been written.
async fn propagation_loop(
    ctx: &Arc<ServerContext>,
    mut stream: TcpStream,
    mut buffer: BytesMut,
) -> Result<(), ReplicationError> {
    loop {
        let frame = match read_frame(&mut stream, &mut buffer).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("primary connection closed");
                return Ok(());
            }
            Err(ReplicationError::Protocol(err)) => {
                // Best effort: drop the malformed prefix and try the next frame.
                warn!(%err, "skipping malformed frame from primary");
                buffer.clear();
                continue;
            }
            Err(err) => return Err(err),
        };

        let frame_len = frame.encoded_len();

        if is_getack(&frame) {
            let offset = ctx.local_offset().await;
            let ack = RespValue::command([
                "REPLCONF".to_string(),
                "ACK".to_string(),
                offset.to_string(),
            ]);

            if let Err(e) = stream.write_all(ack.encode().as_bytes()).await {
                warn!(error = %e, "failed to send ACK to primary");
            }
        } else if is_ack(&frame) {
            // Primaries do not send ACKs; ignore if one shows up.
        } else {
            apply_propagated(ctx, &frame).await;
        }

        ctx.advance_local_offset(frame_len).await;
    }
}

/// Runs one propagated command against the local state. No reply is written to
/// the primary; failures and unknown commands are logged and skipped.
async fn apply_propagated(ctx: &Arc<ServerContext>, frame: &RespValue) {
    let Some((name, args)) = frame.as_command() else {
        warn!("ignoring non-command frame from primary");
        return;
    };

    match commands::execute(ctx, PRIMARY_LINK_CONN_ID, &name, args).await {
        Ok(_) => debug!(command = %name, "applied propagated command"),
        Err(err) => warn!(command = %name, %err, "propagated command failed"),
    }
}

fn is_getack(frame: &RespValue) -> bool {
    matches!(
        frame.as_command(),
        Some((name, args)) if name == "REPLCONF"
            && args.len() == 2
            && args[0].eq_ignore_ascii_case("GETACK")
            && args[1] == "*"
    )
}

fn is_ack(frame: &RespValue) -> bool {
    matches!(
        frame.as_command(),
        Some((name, args)) if name == "REPLCONF"
            && args.first().is_some_and(|a| a.eq_ignore_ascii_case("ACK"))
    )
}
