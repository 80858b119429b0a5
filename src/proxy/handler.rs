use http::header::{CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use http::StatusCode;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::Request;
use hyper::Response;
use std::net::SocketAddr;
use tracing::{debug, warn};

use crate::error::{to_response, GatewayError};
use crate::proxy::classifier::{classify, RequestMode};
use crate::proxy::context::{full_body, BoxBody, RequestContext};
use crate::proxy::headers::set_forwarded_headers;
use crate::proxy::{command, tunnel, websocket};
use crate::server::GatewayState;

/// Handle an incoming HTTP request end to end: resolve, classify, forward,
/// then log and record metrics for the outcome.
///
/// 1. RESOLVE    — map `Host` to a `PortMapping` via the three-tier resolver
/// 2. CLASSIFY   — command / tunnel / websocket, by headers and body size
/// 3. FORWARD    — dispatch to the matching forwarder
/// 4. LOG        — finalize metrics
pub async fn handle_request(
    req: Request<Incoming>,
    state: GatewayState,
    peer_addr: SocketAddr,
) -> Result<Response<BoxBody>, hyper::Error> {
    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let uri_path = req.uri().path().to_string();
    let method = req.method().as_str().to_string();

    let mut ctx = RequestContext::new(host.clone(), uri_path.clone(), method.clone(), peer_addr.ip());

    let mapping = match state.resolver.resolve(&host).await {
        Ok(m) => m,
        Err(err) => {
            debug!("proxy: resolve failed, host={}, error={:?}", host, err);
            let resp = to_response(&err);
            ctx.finalize_metrics(resp.status().as_u16(), "unresolved");
            return Ok(resp);
        }
    };
    ctx.full_domain = mapping.full_domain();

    let content_length = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let is_chunked = req
        .headers()
        .get(TRANSFER_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("chunked"))
        .unwrap_or(false);

    let mode = classify(
        req.headers(),
        content_length,
        is_chunked,
        state.config.modules.domain_proxy.command_mode_threshold_bytes,
    );

    let path_kind = match mode {
        RequestMode::Command => "command",
        RequestMode::Tunnel => "tunnel",
        RequestMode::WebSocket => "websocket",
    };

    let result = match mode {
        RequestMode::Command => handle_command(req, &state, &ctx, &mapping).await,
        RequestMode::Tunnel => handle_tunnel(req, &state, &ctx, &mapping).await,
        RequestMode::WebSocket => return handle_websocket(req, &state, &mapping).await,
    };

    let response = match result {
        Ok(resp) => resp,
        Err(err) => {
            warn!(
                "proxy: forward failed, domain={}, mode={}, error={:?}",
                ctx.full_domain, path_kind, err
            );
            to_response(&err)
        }
    };

    ctx.finalize_metrics(response.status().as_u16(), path_kind);
    tracing::info!(
        client_ip = %ctx.client_ip,
        method = %ctx.method,
        host = %ctx.host,
        path = %ctx.uri_path,
        status = response.status().as_u16(),
        mode = path_kind,
        "access"
    );
    Ok(response)
}

async fn handle_command(
    req: Request<Incoming>,
    state: &GatewayState,
    ctx: &RequestContext,
    mapping: &crate::domain::PortMapping,
) -> Result<Response<BoxBody>, GatewayError> {
    let scheme = state.config.modules.domain_proxy.default_scheme.as_str();
    let mut headers = req.headers().clone();
    set_forwarded_headers(&mut headers, ctx.client_ip, &ctx.host, scheme);

    // Bounded by the same threshold that routes a request command-mode in
    // the first place — a body that grows past it mid-stream (e.g. a
    // chunked request with no declared Content-Length) is rejected rather
    // than buffered without limit.
    let threshold = state.config.modules.domain_proxy.command_mode_threshold_bytes as usize;
    let body = http_body_util::Limited::new(req.into_body(), threshold)
        .collect()
        .await
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?
        .to_bytes();

    command::forward(
        state.session_manager.as_ref(),
        &state.correlator,
        mapping,
        &ctx.method,
        &ctx.uri_path,
        &headers,
        body,
        scheme,
        state.config.modules.domain_proxy.command_timeout(),
    )
    .await
}

async fn handle_tunnel(
    req: Request<Incoming>,
    state: &GatewayState,
    ctx: &RequestContext,
    mapping: &crate::domain::PortMapping,
) -> Result<Response<BoxBody>, GatewayError> {
    let scheme = state.config.modules.domain_proxy.default_scheme.as_str();
    let mut headers = req.headers().clone();
    set_forwarded_headers(&mut headers, ctx.client_ip, &ctx.host, scheme);

    let target_url = format!("{scheme}://{}:{}", mapping.target_host, mapping.target_port);
    let mut conn = state
        .session_manager
        .request_tunnel_for_http(mapping.target_client_id, &mapping.id, &target_url, &ctx.method)
        .await?;
    metrics::gauge!("gateway_domain_proxy_active_tunnels").increment(1.0);

    let write_result = tunnel::write_request(
        conn.as_mut(),
        &ctx.method,
        &ctx.uri_path,
        &headers,
        &mapping.target_host,
        mapping.target_port,
        req.into_body(),
    )
    .await;
    let response = match write_result {
        Ok(()) => tunnel::read_response(conn).await,
        Err(e) => Err(e),
    };
    // Counts the request/header round trip, not the full lifetime of a
    // streamed no-content-length body — a conservative undercount rather
    // than a double-decrement risk.
    metrics::gauge!("gateway_domain_proxy_active_tunnels").decrement(1.0);
    response
}

async fn handle_websocket(
    req: Request<Incoming>,
    state: &GatewayState,
    mapping: &crate::domain::PortMapping,
) -> Result<Response<BoxBody>, hyper::Error> {
    let ws_scheme = if state.config.modules.domain_proxy.default_scheme == "https" {
        "wss"
    } else {
        "ws"
    };
    let target_url = format!("{ws_scheme}://{}:{}", mapping.target_host, mapping.target_port);
    let tunnel = match state
        .session_manager
        .request_tunnel_for_http(mapping.target_client_id, &mapping.id, &target_url, "WEBSOCKET")
        .await
    {
        Ok(t) => t,
        Err(err) => return Ok(to_response(&err)),
    };

    let mut response = Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(http::header::UPGRADE, "websocket")
        .header(http::header::CONNECTION, "Upgrade")
        .body(full_body(bytes::Bytes::new()))
        .expect("static websocket handshake response is well-formed");

    if let Some(accept_key) = req
        .headers()
        .get("sec-websocket-key")
        .and_then(|v| v.to_str().ok())
        .map(tokio_tungstenite::tungstenite::handshake::derive_accept_key)
    {
        if let Ok(v) = http::HeaderValue::from_str(&accept_key) {
            response.headers_mut().insert("sec-websocket-accept", v);
        }
    }

    metrics::gauge!("gateway_domain_proxy_active_tunnels").increment(1.0);
    tokio::spawn(async move {
        match hyper::upgrade::on(req).await {
            Ok(upgraded) => websocket::bridge(upgraded, tunnel).await,
            Err(e) => tracing::warn!("proxy: websocket upgrade failed: {}", e),
        }
        metrics::gauge!("gateway_domain_proxy_active_tunnels").decrement(1.0);
    });

    Ok(response)
}
