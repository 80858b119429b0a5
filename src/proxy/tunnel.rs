use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyStream;
use hyper::body::Body as HttpBody;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::warn;

use crate::error::GatewayError;
use crate::proxy::context::{full_body, BoxBody};
use crate::proxy::headers::{is_hop_by_hop, remove_hop_headers};

/// Largest single write issued while streaming a request body to the
/// tunnel — bounds peak memory regardless of how the
/// upstream `Body` chooses to chunk its frames.
const BODY_COPY_CHUNK: usize = 32 * 1024;

/// A byte-oriented duplex stream to the client's local target, opened
/// on-demand per request. The `SessionManager` hands back a
/// boxed implementation; tests supply an in-memory duplex pair.
pub trait Tunnel: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Tunnel for T {}

/// Write an HTTP/1.1 request line, headers (minus hop-by-hop, `Host`
/// overridden to the target), and body to `tunnel`. There is no connection reuse across requests in this model — the
/// tunnel is opened fresh per request and closed after the response is
/// read. The body is streamed in `BODY_COPY_CHUNK`-sized writes straight
/// from `body`'s frames — never buffered whole in memory, since tunnel
/// mode exists precisely for request bodies too large for command mode.
/// No `Content-Length` is synthesized here: framing relies on whatever the
/// cloned user headers already declare, or on the tunnel's own close.
pub async fn write_request<B>(
    tunnel: &mut (dyn Tunnel),
    method: &str,
    path_and_query: &str,
    headers: &HeaderMap,
    target_host: &str,
    target_port: u16,
    body: B,
) -> Result<(), GatewayError>
where
    B: HttpBody<Data = Bytes> + Unpin,
    B::Error: std::fmt::Display,
{
    let mut out = BytesMut::new();
    out.extend_from_slice(format!("{method} {path_and_query} HTTP/1.1\r\n").as_bytes());
    out.extend_from_slice(format!("host: {target_host}:{target_port}\r\n").as_bytes());

    for (name, value) in headers.iter() {
        if name.as_str().eq_ignore_ascii_case("host") || is_hop_by_hop(name.as_str()) {
            continue;
        }
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");

    tunnel
        .write_all(&out)
        .await
        .map_err(|e| GatewayError::NetworkError(e.to_string()))?;

    let mut frames = BodyStream::new(body).try_filter_map(|frame| async move { Ok(frame.into_data().ok()) });
    loop {
        let chunk = frames
            .try_next()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        let Some(chunk) = chunk else { break };
        for piece in chunk.chunks(BODY_COPY_CHUNK) {
            tunnel
                .write_all(piece)
                .await
                .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        }
    }

    tunnel
        .flush()
        .await
        .map_err(|e| GatewayError::NetworkError(e.to_string()))
}

/// Read one HTTP/1.1 response off `tunnel`: status line, headers up to the
/// blank line, then the body. A declared `content-length` bounds an exact
/// read; otherwise the remaining bytes are streamed to the user until the
/// tunnel hits EOF — callers rely on `Content-Length` or connection close, never a
/// chunked transfer-encoding from the target.
///
/// Takes ownership of `tunnel`: an EOF-streamed body must keep reading after
/// this function returns, so the reader has to outlive the call.
pub async fn read_response(tunnel: Box<dyn Tunnel>) -> Result<Response<BoxBody>, GatewayError> {
    let mut reader = BufReader::new(tunnel);
    let mut raw = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        read_crlf_line(&mut reader, &mut line).await?;
        if line.is_empty() {
            break;
        }
        raw.extend_from_slice(&line);
        raw.push(b'\n');
    }

    let head = String::from_utf8_lossy(&raw);
    let mut lines = head.lines();
    let status_line = lines.next().ok_or(GatewayError::Upstream("empty response".into()))?;
    let status_code = parse_status_code(status_line)?;

    let mut builder = Response::builder().status(status_code);
    let mut content_length: Option<usize> = None;
    for header_line in lines {
        if let Some((name, value)) = header_line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().ok();
            }
            builder = builder.header(name, value);
        }
    }

    let body: BoxBody = match content_length {
        Some(len) => {
            let mut buf = vec![0u8; len];
            reader
                .read_exact(&mut buf)
                .await
                .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
            full_body(Bytes::from(buf))
        }
        None => stream_remaining_body(reader),
    };

    let mut response = builder
        .body(body)
        .map_err(|e| GatewayError::Upstream(e.to_string()))?;
    remove_hop_headers(response.headers_mut());
    Ok(response)
}

/// Stream whatever is left on `reader` to the user as it arrives, closing
/// the body on the first EOF or read error — there is no length to enforce
/// here, the tunnel's own close is the framing. Response headers are
/// already written by the time this runs, so a read error here cannot be
/// turned into an HTTP error (spec.md §4.E); it is logged and the body
/// simply ends.
fn stream_remaining_body(reader: BufReader<Box<dyn Tunnel>>) -> BoxBody {
    let stream = futures_util::stream::unfold(reader, |mut reader| async move {
        let mut buf = vec![0u8; BODY_COPY_CHUNK];
        match reader.read(&mut buf).await {
            Ok(0) => None,
            Err(e) => {
                warn!(
                    error = %e,
                    "tunnel: read error streaming response body after headers were sent"
                );
                None
            }
            Ok(n) => {
                buf.truncate(n);
                let frame: Result<hyper::body::Frame<Bytes>, hyper::Error> =
                    Ok(hyper::body::Frame::data(Bytes::from(buf)));
                Some((frame, reader))
            }
        }
    });
    http_body_util::BodyExt::boxed(http_body_util::StreamBody::new(stream))
}

async fn read_crlf_line<R: AsyncRead + Unpin>(
    reader: &mut R,
    out: &mut Vec<u8>,
) -> Result<(), GatewayError> {
    let mut prev_was_cr = false;
    loop {
        let mut byte = [0u8; 1];
        let n = reader
            .read(&mut byte)
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        if n == 0 {
            return Err(GatewayError::NetworkError("connection closed mid-header".into()));
        }
        if byte[0] == b'\n' {
            if prev_was_cr {
                out.pop();
            }
            return Ok(());
        }
        out.push(byte[0]);
        prev_was_cr = byte[0] == b'\r';
    }
}

/// Parse a status line matching `HTTP/1.<minor> <code>`; anything else is `InvalidRequest`, not a generic upstream failure —
/// this is a protocol violation by the tunnel peer, not a failed request.
fn parse_status_code(status_line: &str) -> Result<StatusCode, GatewayError> {
    let mut parts = status_line.split_whitespace();
    let version = parts.next().ok_or_else(|| malformed(status_line))?;
    if !version.starts_with("HTTP/1.") || version.len() != "HTTP/1.x".len() {
        return Err(malformed(status_line));
    }

    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| malformed(status_line))
}

fn malformed(status_line: &str) -> GatewayError {
    GatewayError::InvalidRequest(format!("malformed status line: {status_line}"))
}
