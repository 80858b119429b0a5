use http::header::{HeaderName, HeaderValue, CONNECTION, TRANSFER_ENCODING};
use std::net::IpAddr;

/// Hop-by-hop header names, canonical lowercase form.
pub const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Remove every hop-by-hop header from a `hyper`/`http` `HeaderMap` in
/// place. Used on both the upstream-bound request and the user-bound
/// response (spec property P7).
pub fn remove_hop_headers(headers: &mut http::HeaderMap) {
    let names: &[HeaderName] = &[
        CONNECTION,
        HeaderName::from_static("keep-alive"),
        HeaderName::from_static("proxy-authenticate"),
        HeaderName::from_static("proxy-authorization"),
        HeaderName::from_static("te"),
        HeaderName::from_static("trailers"),
        TRANSFER_ENCODING,
        HeaderName::from_static("upgrade"),
    ];
    for name in names {
        headers.remove(name);
    }
}

/// Set the three `X-Forwarded-*` headers the command-mode and tunnel-mode
/// forwarders both attach. Unlike a generic reverse proxy this always
/// *sets* (not appends) — each proxied exchange here has exactly one hop
/// between user and gateway.
pub fn set_forwarded_headers(
    headers: &mut http::HeaderMap,
    remote_addr: IpAddr,
    original_host: &str,
    scheme: &str,
) {
    static XFF: HeaderName = HeaderName::from_static("x-forwarded-for");
    static XFH: HeaderName = HeaderName::from_static("x-forwarded-host");
    static XFP: HeaderName = HeaderName::from_static("x-forwarded-proto");

    if let Ok(v) = HeaderValue::from_str(&remote_addr.to_string()) {
        headers.insert(XFF.clone(), v);
    }
    if !original_host.is_empty() {
        if let Ok(v) = HeaderValue::from_str(original_host) {
            headers.insert(XFH.clone(), v);
        }
    }
    let scheme = if scheme.is_empty() { "http" } else { scheme };
    if let Ok(v) = HeaderValue::from_str(scheme) {
        headers.insert(XFP.clone(), v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    #[test]
    fn removes_all_hop_by_hop_names() {
        let mut headers = HeaderMap::new();
        for name in HOP_BY_HOP {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_static("x"),
            );
        }
        headers.insert("x-custom", HeaderValue::from_static("keep-me"));
        remove_hop_headers(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("x-custom"));
    }

    #[test]
    fn forwarded_headers_default_scheme_http() {
        let mut headers = HeaderMap::new();
        set_forwarded_headers(&mut headers, "1.2.3.4".parse().unwrap(), "api.example.com", "");
        assert_eq!(headers.get("x-forwarded-proto").unwrap(), "http");
        assert_eq!(headers.get("x-forwarded-host").unwrap(), "api.example.com");
        assert_eq!(headers.get("x-forwarded-for").unwrap(), "1.2.3.4");
    }
}
