use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{AppState, error::AppError};

/// 无法识别客户端时使用的标识
pub const UNKNOWN_CLIENT: &str = "unknown";

/// 客户端标识：默认取连接 IP，开启后优先使用代理头
pub fn client_id(req: &Request<Body>, trust_proxy_headers: bool) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    let forwarded = trust_proxy_headers
        .then(|| {
            req.headers()
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .or_else(|| {
                    req.headers()
                        .get("x-forwarded-for")
                        .and_then(|h| h.to_str().ok())
                        .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
                })
                .map(|ip| ip.trim().to_string())
                .filter(|ip| !ip.is_empty())
        })
        .flatten();

    forwarded
        .or(remote_ip)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// 在进入业务处理之前按 (客户端, 路径) 限流，拒绝时返回 429
pub async fn rate_limit(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let endpoint = req.uri().path().to_string();
    if state.config.is_rate_limit_exempt(&endpoint) {
        return next.run(req).await;
    }

    let client = client_id(&req, state.config.rate_limit_trust_proxy_headers);
    if state.rate_limiter.is_allowed(&client, &endpoint) {
        return next.run(req).await;
    }

    let window_secs = state.rate_limiter.rule().period.as_secs();
    tracing::warn!("Rate limit exceeded for {} on {}", client, endpoint);

    let mut response = AppError::RateLimited(window_secs).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(window_secs));
    response
}
