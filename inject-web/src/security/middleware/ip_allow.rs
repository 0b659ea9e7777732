use crate::error::ApiError;
use crate::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::{IpAddr, SocketAddr};
use tracing::warn;

/// REST开关与IP白名单中间件
pub async fn ip_allow_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.rest_enabled {
        return ApiError::forbidden("rest_disabled", "the REST API is disabled").into_response();
    }
    if state.ip_allow_list.is_empty() {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client_ip = if state.trust_proxy_headers {
        forwarded_ip(request.headers()).or(peer)
    } else {
        peer
    };

    match client_ip {
        Some(ip) if state.ip_allow_list.allows(ip) => next.run(request).await,
        other => {
            warn!(client_ip = ?other, path = %request.uri().path(), "Client IP not allowed");
            ApiError::forbidden("ip_not_allowed", "your IP address is not allowed").into_response()
        }
    }
}

/// 从 `x-forwarded-for`（第一个地址）或 `x-real-ip` 中取得客户端IP
pub fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .and_then(|v| v.trim().parse().ok())
}
