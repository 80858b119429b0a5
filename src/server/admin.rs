use super::GatewayState;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

fn json_body(status: u16, body: String) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(full_body(body))
        .unwrap()
}

fn html_body(status: u16, body: String) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .header("content-type", "text/html; charset=utf-8")
        .body(full_body(body))
        .unwrap()
}

/// Serve the admin listener: landing page, health/readiness, metrics and
/// mapping introspection.
pub async fn handle_admin(
    req: Request<Incoming>,
    state: GatewayState,
) -> Result<Response<BoxBody>, hyper::Error> {
    let prefix = state.config.api_prefix.trim_end_matches('/');
    let path = req.uri().path();

    if path == "/" {
        return Ok(html_body(
            200,
            format!(
                "<html><head><title>domain-gateway</title></head><body>\
                 <h1>domain-gateway</h1>\
                 <p>{} active mappings</p>\
                 <p>see <a href=\"{prefix}/v1/mappings\">{prefix}/v1/mappings</a></p>\
                 </body></html>",
                state.registry.count()
            ),
        ));
    }

    let suffix = path.strip_prefix(prefix).unwrap_or(path);

    match suffix {
        "/v1/health" | "/health" => {
            let health = state.gateway_health.get_health_info();
            let status = match health.status {
                crate::gateway_health::NodeState::Healthy => 200,
                crate::gateway_health::NodeState::Draining
                | crate::gateway_health::NodeState::Unhealthy => 503,
            };
            Ok(json_body(status, serde_json::to_string(&health).unwrap_or_default()))
        }

        "/v1/healthz" | "/healthz" => {
            let status = if state.gateway_health.is_accepting_connections() {
                200
            } else {
                503
            };
            Ok(Response::builder().status(status).body(full_body(Bytes::new())).unwrap())
        }

        "/v1/ready" | "/ready" => {
            let health = state.gateway_health.get_health_info();
            let accepting = matches!(health.status, crate::gateway_health::NodeState::Healthy);
            let body = if accepting {
                r#"{"ready":true,"status":"accepting_connections"}"#.to_string()
            } else {
                let state_name = serde_json::to_value(health.status)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_else(|| "unhealthy".to_string());
                format!(r#"{{"ready":false,"status":"{state_name}"}}"#)
            };
            Ok(json_body(if accepting { 200 } else { 503 }, body))
        }

        "/v1/dependencies" => {
            let report = state.health.run().await;
            Ok(json_body(200, serde_json::to_string(&report).unwrap_or_default()))
        }

        "/v1/mappings" => {
            let body = serde_json::to_string_pretty(&state.registry.snapshot())
                .unwrap_or_default();
            Ok(json_body(200, body))
        }

        "/metrics" => Ok(Response::builder()
            .status(200)
            .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
            .body(full_body(state.metrics.render()))
            .unwrap()),

        _ => Ok(json_body(404, r#"{"error":"not found"}"#.to_string())),
    }
}
