use bytes::Bytes;
use futures_util::{stream::SplitSink, FutureExt, SinkExt, StreamExt};
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::proxy::tunnel::Tunnel;

/// Message-type prefix byte written before every frame relayed over the
/// tunnel side of the bridge, so the client's framing can tell text and
/// binary WebSocket frames apart on a plain byte stream.
const FRAME_TEXT: u8 = 0x01;
const FRAME_BINARY: u8 = 0x02;

/// Read buffer used on the tunnel-to-user copy direction.
const TUNNEL_READ_BUF: usize = 32 * 1024;

/// How long the bridge waits to hand the user a clean `Close` frame once
/// either direction has ended, before tearing the bridge down regardless.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

type WsSink = SplitSink<WebSocketStream<TokioIo<Upgraded>>, Message>;

/// Bridge an upgraded user-facing WebSocket connection to a raw tunnel
/// byte stream for the lifetime of the connection. Each
/// direction runs as its own spawned task so one side blocking on I/O
/// never stalls the other's progress; whichever task finishes first
/// (clean close, I/O error, or a caught panic) signals `done_tx`. The
/// orchestrator — not either copy task — owns sending the user the
/// spec-mandated `Close` frame, since the winning direction is just as
/// often the user-to-tunnel side (still parked in a tunnel read) as the
/// tunnel-to-user side.
pub async fn bridge(upgraded: Upgraded, tunnel: Box<dyn Tunnel>) {
    let io = TokioIo::new(upgraded);
    let ws = WebSocketStream::from_raw_socket(
        io,
        tokio_tungstenite::tungstenite::protocol::Role::Server,
        None,
    )
    .await;
    let (ws_sink, mut ws_stream) = ws.split();
    let ws_sink = Arc::new(Mutex::new(ws_sink));
    let (mut tunnel_read, mut tunnel_write) = tokio::io::split(tunnel);

    // Capacity-2: each direction sends at most once, on its own exit.
    let (done_tx, mut done_rx) = mpsc::channel::<()>(2);

    let user_to_tunnel_done = done_tx.clone();
    let user_to_tunnel = tokio::spawn(async move {
        let run = AssertUnwindSafe(async {
            while let Some(msg) = ws_stream.next().await {
                let msg = match msg {
                    Ok(m) => m,
                    Err(_) => break,
                };
                let (prefix, payload): (u8, Vec<u8>) = match msg {
                    Message::Text(text) => (FRAME_TEXT, text.into_bytes()),
                    Message::Binary(data) => (FRAME_BINARY, data),
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                };
                let mut framed = Vec::with_capacity(payload.len() + 1);
                framed.push(prefix);
                framed.extend_from_slice(&payload);
                if tokio::io::AsyncWriteExt::write_all(&mut tunnel_write, &framed)
                    .await
                    .is_err()
                {
                    break;
                }
            }
        })
        .catch_unwind();
        let _ = run.await;
        let _ = user_to_tunnel_done.send(()).await;
    });

    let tunnel_to_user_done = done_tx;
    let tunnel_to_user_sink = ws_sink.clone();
    let tunnel_to_user = tokio::spawn(async move {
        let run = AssertUnwindSafe(async {
            let mut buf = [0u8; TUNNEL_READ_BUF];
            loop {
                let n = match tokio::io::AsyncReadExt::read(&mut tunnel_read, &mut buf).await {
                    Ok(n) => n,
                    Err(_) => break,
                };
                // A zero-length read is only EOF on a reliably-closed
                // stream; tolerate spurious zero-length reads from the
                // tunnel transport rather than treating one as a close.
                if n < 1 {
                    continue;
                }
                let prefix = buf[0];
                let payload = Bytes::copy_from_slice(&buf[1..n]);
                let message = match prefix {
                    FRAME_BINARY => Message::Binary(payload.to_vec()),
                    _ => match String::from_utf8(payload.to_vec()) {
                        Ok(text) => Message::Text(text),
                        Err(_) => break,
                    },
                };
                if tunnel_to_user_sink.lock().await.send(message).await.is_err() {
                    break;
                }
            }
        })
        .catch_unwind();
        let _ = run.await;
        let _ = tunnel_to_user_done.send(()).await;
    });

    // Wait for whichever direction finishes first, then give the user a
    // clean `Close` frame within `CLOSE_GRACE` regardless of which side
    // won, before giving the loser the same grace period to unwind on its
    // own and aborting it outright if it hasn't.
    let _ = done_rx.recv().await;
    let _ = tokio::time::timeout(CLOSE_GRACE, async {
        let _ = ws_sink.lock().await.send(Message::Close(None)).await;
    })
    .await;
    let _ = tokio::time::timeout(CLOSE_GRACE, done_rx.recv()).await;
    user_to_tunnel.abort();
    tunnel_to_user.abort();
}
