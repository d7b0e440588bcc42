use axum::{
    body::{Body, to_bytes},
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, error};
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "trace-id";

/// 日志中最多记录的响应体字节数，响应本身保持完整
const LOGGED_BODY_LIMIT: usize = 1024;

/// 为每个请求建立带 trace_id 的 span，并记录 5xx 响应内容
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let trace_id = req
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let span = tracing::info_span!(
        "request",
        %trace_id,
        method = %req.method(),
        path = %req.uri().path()
    );

    async move {
        let mut response = next.run(req).await;
        if let Ok(value) = HeaderValue::from_str(&trace_id.to_string()) {
            response.headers_mut().insert(TRACE_ID_HEADER, value);
        }

        if !response.status().is_server_error() {
            return response;
        }

        let (mut parts, body) = response.into_parts();
        let bytes = match to_bytes(body, usize::MAX).await {
            Ok(b) => b,
            Err(e) => {
                error!("Failed to read error response body: {}", e);
                return Response::from_parts(parts, Body::empty());
            }
        };
        let body_str = String::from_utf8_lossy(&bytes[..bytes.len().min(LOGGED_BODY_LIMIT)]);

        error!(
            "Server error occurred - Status: {}, Body: {}",
            parts.status, body_str
        );

        // 重置body以便重新构建响应
        parts.headers.remove(axum::http::header::CONTENT_LENGTH);
        Response::from_parts(parts, Body::from(bytes))
    }
    .instrument(span)
    .await
}
