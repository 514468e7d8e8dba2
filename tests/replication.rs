//! Primary/replica end-to-end tests: a real primary and a real replica wired
//! over loopback sockets, exercising the handshake, propagation, offset
//! acknowledgement, and WAIT.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use rudis::config::ServerConfig;
use rudis::context::ServerContext;
use rudis::dispatcher;
use rudis::replication;
use rudis::resp::{RespValue, decode_rdb_payload};

async fn start_primary() -> (Arc<ServerContext>, SocketAddr) {
    let ctx = ServerContext::new(ServerConfig::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(dispatcher::serve(Arc::clone(&ctx), listener));
    (ctx, addr)
}

/// Starts a full replica process: driver task plus its own client listener.
async fn start_replica(primary: SocketAddr) -> (Arc<ServerContext>, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let ctx = ServerContext::new(ServerConfig {
        port: addr.port(),
        replicaof: Some((primary.ip().to_string(), primary.port())),
        ..ServerConfig::default()
    });

    let driver_ctx = Arc::clone(&ctx);
    let host = primary.ip().to_string();
    tokio::spawn(async move {
        let _ = replication::run(driver_ctx, &host, primary.port()).await;
    });
    tokio::spawn(dispatcher::serve(Arc::clone(&ctx), listener));

    (ctx, addr)
}

/// Polls `condition` against `ctx` until it holds or the retry budget runs out.
async fn wait_until<F, Fut>(ctx: &Arc<ServerContext>, condition: F, what: &str)
where
    F: Fn(Arc<ServerContext>) -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..150 {
        if condition(Arc::clone(ctx)).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {}", what);
}

async fn read_frame(stream: &mut TcpStream, buffer: &mut BytesMut) -> RespValue {
    loop {
        if let Some(frame) = RespValue::decode(buffer).unwrap() {
            return frame;
        }
        let n = stream.read_buf(buffer).await.unwrap();
        assert!(n > 0, "connection closed mid-frame");
    }
}

async fn send(stream: &mut TcpStream, frame: &RespValue) {
    stream.write_all(frame.encode().as_bytes()).await.unwrap();
}

#[tokio::test]
async fn handshake_steps_as_seen_by_a_raw_replica() {
    let (ctx, addr) = start_primary().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buffer = BytesMut::new();

    send(&mut stream, &RespValue::command(["PING"])).await;
    assert_eq!(
        read_frame(&mut stream, &mut buffer).await,
        RespValue::SimpleString("PONG".to_string())
    );

    send(
        &mut stream,
        &RespValue::command(["REPLCONF", "listening-port", "6380"]),
    )
    .await;
    assert_eq!(
        read_frame(&mut stream, &mut buffer).await,
        RespValue::SimpleString("OK".to_string())
    );

    send(&mut stream, &RespValue::command(["REPLCONF", "capa", "psync2"])).await;
    assert_eq!(
        read_frame(&mut stream, &mut buffer).await,
        RespValue::SimpleString("OK".to_string())
    );

    send(&mut stream, &RespValue::command(["PSYNC", "?", "-1"])).await;
    let resync = read_frame(&mut stream, &mut buffer).await;
    assert_eq!(
        resync,
        RespValue::SimpleString(format!("FULLRESYNC {} 0", ctx.repl_id))
    );

    // The snapshot block follows immediately: $<len>\r\n<bytes>, no CRLF.
    let payload = loop {
        if let Some(payload) = decode_rdb_payload(&mut buffer).unwrap() {
            break payload;
        }
        let n = stream.read_buf(&mut buffer).await.unwrap();
        assert!(n > 0, "connection closed mid-snapshot");
    };
    assert_eq!(payload.len(), 88);
    assert!(payload.starts_with(b"REDIS0011"));

    wait_until(
        &ctx,
        |ctx| async move { ctx.replicas.len().await == 1 },
        "replica registration",
    )
    .await;
}

#[tokio::test]
async fn writes_on_primary_become_visible_on_replica() {
    let (primary_ctx, primary_addr) = start_primary().await;
    let (replica_ctx, replica_addr) = start_replica(primary_addr).await;

    wait_until(
        &primary_ctx,
        |ctx| async move { ctx.replicas.len().await == 1 },
        "replica to finish its handshake",
    )
    .await;

    let mut client = TcpStream::connect(primary_addr).await.unwrap();
    let mut buffer = BytesMut::new();
    send(&mut client, &RespValue::command(["SET", "k", "v"])).await;
    assert_eq!(
        read_frame(&mut client, &mut buffer).await,
        RespValue::SimpleString("OK".to_string())
    );

    wait_until(
        &replica_ctx,
        |ctx| async move { ctx.store.get("k").await == Some("v".to_string()) },
        "write to reach the replica store",
    )
    .await;

    // And it is readable through the replica's own listener.
    let mut replica_client = TcpStream::connect(replica_addr).await.unwrap();
    let mut replica_buffer = BytesMut::new();
    send(&mut replica_client, &RespValue::command(["GET", "k"])).await;
    assert_eq!(
        read_frame(&mut replica_client, &mut replica_buffer).await,
        RespValue::BulkString("v".to_string())
    );
}

#[tokio::test]
async fn replica_tracks_propagation_offset_and_acks() {
    let (primary_ctx, primary_addr) = start_primary().await;
    let (replica_ctx, _replica_addr) = start_replica(primary_addr).await;

    wait_until(
        &primary_ctx,
        |ctx| async move { ctx.replicas.len().await == 1 },
        "replica to finish its handshake",
    )
    .await;

    let mut client = TcpStream::connect(primary_addr).await.unwrap();
    let mut buffer = BytesMut::new();

    let set = RespValue::command(["SET", "k", "v"]);
    let set_len = set.encoded_len();
    send(&mut client, &set).await;
    read_frame(&mut client, &mut buffer).await;

    wait_until(
        &replica_ctx,
        |ctx| async move { ctx.local_offset().await == set_len },
        "replica offset to advance by the SET frame",
    )
    .await;

    // WAIT broadcasts GETACK; the replica replies with the offset it had
    // before consuming the GETACK, which equals the SET frame length.
    send(&mut client, &RespValue::command(["WAIT", "1", "500"])).await;
    assert_eq!(
        read_frame(&mut client, &mut buffer).await,
        RespValue::Integer(1)
    );

    assert_eq!(primary_ctx.replicas.count_acked(set_len).await, 1);

    // The GETACK frame itself counts toward the replica's offset afterwards.
    let getack_len = RespValue::command(["REPLCONF", "GETACK", "*"]).encoded_len();
    wait_until(
        &replica_ctx,
        |ctx| async move { ctx.local_offset().await == set_len + getack_len },
        "replica offset to include the GETACK frame",
    )
    .await;
}

#[tokio::test]
async fn wait_returns_zero_without_replicas() {
    let (_primary_ctx, primary_addr) = start_primary().await;

    let mut client = TcpStream::connect(primary_addr).await.unwrap();
    let mut buffer = BytesMut::new();

    send(&mut client, &RespValue::command(["WAIT", "1", "100"])).await;
    assert_eq!(
        read_frame(&mut client, &mut buffer).await,
        RespValue::Integer(0)
    );
}

#[tokio::test]
async fn propagated_stream_appends_reach_replica() {
    let (primary_ctx, primary_addr) = start_primary().await;
    let (replica_ctx, _replica_addr) = start_replica(primary_addr).await;

    wait_until(
        &primary_ctx,
        |ctx| async move { ctx.replicas.len().await == 1 },
        "replica to finish its handshake",
    )
    .await;

    let mut client = TcpStream::connect(primary_addr).await.unwrap();
    let mut buffer = BytesMut::new();
    send(
        &mut client,
        &RespValue::command(["XADD", "s", "1-1", "f", "v"]),
    )
    .await;
    assert_eq!(
        read_frame(&mut client, &mut buffer).await,
        RespValue::BulkString("1-1".to_string())
    );

    wait_until(
        &replica_ctx,
        |ctx| async move { ctx.store.type_of("s").await == "stream" },
        "stream append to reach the replica",
    )
    .await;
}
