use http::HeaderMap;

/// Which forwarding path a request takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Routed through the client's control connection, response awaited via
    /// the correlator.
    Command,
    /// Routed through a fresh on-demand byte tunnel — used for requests too
    /// large to ship inline over the control connection.
    Tunnel,
    /// An HTTP Upgrade to `websocket` — always tunnel-backed, bridged
    /// bidirectionally for the connection's lifetime.
    WebSocket,
}

/// Classify a request by its headers and declared/observed body size.
/// `content_length` is `None` when the header is absent or unparsable;
/// `is_chunked` reflects a `Transfer-Encoding: chunked` header.
pub fn classify(
    headers: &HeaderMap,
    content_length: Option<u64>,
    is_chunked: bool,
    command_mode_threshold: u64,
) -> RequestMode {
    if is_websocket_upgrade(headers) {
        return RequestMode::WebSocket;
    }

    let is_large = is_chunked || content_length.map_or(false, |len| len > command_mode_threshold);
    if is_large {
        RequestMode::Tunnel
    } else {
        RequestMode::Command
    }
}

/// `true` iff the request declares an `Upgrade: websocket` header and a
/// `Connection` header mentioning `upgrade` (case-insensitive, per RFC 6455
/// §4.2.1 — `Connection` is a comma-separated list, not an exact match).
fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let upgrades_to_websocket = headers
        .get(http::header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    let connection_has_upgrade = headers
        .get(http::header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        })
        .unwrap_or(false);

    upgrades_to_websocket && connection_has_upgrade
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers_with(upgrade: &str, connection: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::UPGRADE, HeaderValue::from_str(upgrade).unwrap());
        headers.insert(
            http::header::CONNECTION,
            HeaderValue::from_str(connection).unwrap(),
        );
        headers
    }

    #[test]
    fn detects_websocket_upgrade_regardless_of_case() {
        let headers = headers_with("WebSocket", "Keep-Alive, Upgrade");
        assert_eq!(classify(&headers, None, false, 1024), RequestMode::WebSocket);
    }

    #[test]
    fn small_plain_request_is_command_mode() {
        let headers = HeaderMap::new();
        assert_eq!(classify(&headers, Some(100), false, 1024), RequestMode::Command);
    }

    #[test]
    fn oversized_content_length_is_tunnel_mode() {
        let headers = HeaderMap::new();
        assert_eq!(classify(&headers, Some(2048), false, 1024), RequestMode::Tunnel);
    }

    #[test]
    fn chunked_body_is_always_tunnel_mode() {
        let headers = HeaderMap::new();
        assert_eq!(classify(&headers, None, true, 1024), RequestMode::Tunnel);
    }
}
