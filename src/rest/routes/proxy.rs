// rest/routes/proxy.rs — HTTP entry point for the backend relay.
//
// Translates the inbound axum request into a `ProxyRequest`, hands it to the
// forwarder, and converts the `ProxyResponse` back into an HTTP response.
// This is the only place the forwarder touches the HTTP server types.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::proxy::{ProxyMethod, ProxyRequest, ProxyResponse};
use crate::AppContext;

const PROXY_PREFIX: &str = "/api/proxy";

pub async fn relay(
    State(ctx): State<Arc<AppContext>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let Some(method) = proxy_method(&method) else {
        // The router only binds the five supported methods, so this is
        // unreachable in practice.
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    };

    // Take the raw (still percent-encoded) path from the URI rather than the
    // decoded `Path` extractor: segments are forwarded verbatim, undecoded.
    let raw_path = uri.path();
    let rest = raw_path.strip_prefix(PROXY_PREFIX).unwrap_or(raw_path);
    let segments: Vec<String> = rest
        .trim_start_matches('/')
        .split('/')
        .map(str::to_string)
        .collect();

    // GET carries no body; elsewhere an empty inbound body means "no body",
    // not "empty string body".
    let body = match method {
        ProxyMethod::Get => None,
        _ if body.is_empty() => None,
        _ => Some(body),
    };

    let request = ProxyRequest {
        method,
        segments,
        query: uri.query().map(str::to_string),
        content_type: header_value(&headers, header::CONTENT_TYPE),
        cookie: header_value(&headers, header::COOKIE),
        body,
    };

    into_http(ctx.forwarder.forward(request).await)
}

fn proxy_method(method: &Method) -> Option<ProxyMethod> {
    match method.as_str() {
        "GET" => Some(ProxyMethod::Get),
        "POST" => Some(ProxyMethod::Post),
        "PATCH" => Some(ProxyMethod::Patch),
        "DELETE" => Some(ProxyMethod::Delete),
        "PUT" => Some(ProxyMethod::Put),
        _ => None,
    }
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn into_http(resp: ProxyResponse) -> Response {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = HeaderValue::from_str(&resp.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/json"));
    (status, [(header::CONTENT_TYPE, content_type)], resp.body).into_response()
}
