use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{Duration, Utc};

use crate::error::AuthError;
use crate::state::AppState;

/// Extract the client IP: proxy headers first, then the TCP peer address.
fn client_ip(req: &Request) -> Option<String> {
    let headers = req.headers();
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
        })
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
}

async fn enforce<S>(
    state: &AppState<S>,
    key: String,
    max: u32,
    window: Duration,
    req: Request,
    next: Next,
) -> Response {
    if !state.edge_limit.allow(&key, max, window, Utc::now()) {
        return AuthError::RateLimited.into_response();
    }
    next.run(req).await
}

/// Per-IP budget for `POST /auth/request-code`.
pub async fn request_code_ip_limit<S>(
    State(state): State<AppState<S>>,
    req: Request,
    next: Next,
) -> Response
where
    S: Clone + Send + Sync + 'static,
{
    let ip = client_ip(&req).unwrap_or_else(|| {
        tracing::warn!("could not determine client ip for rate limiting");
        "unknown".to_owned()
    });
    let max = state.settings.request_code_ip_limit;
    let window = state.settings.request_code_ip_window;
    enforce(&state, format!("request-code:ip:{ip}"), max, window, req, next).await
}

/// Per-IP budget for `POST /auth/verify-code`.
pub async fn verify_code_ip_limit<S>(
    State(state): State<AppState<S>>,
    req: Request,
    next: Next,
) -> Response
where
    S: Clone + Send + Sync + 'static,
{
    let ip = client_ip(&req).unwrap_or_else(|| {
        tracing::warn!("could not determine client ip for rate limiting");
        "unknown".to_owned()
    });
    let max = state.settings.verify_code_ip_limit;
    let window = state.settings.verify_code_ip_window;
    enforce(&state, format!("verify-code:ip:{ip}"), max, window, req, next).await
}

/// Per-device budget for `POST /auth/refresh`. A missing header passes
/// through; the handler rejects it with 400.
pub async fn refresh_device_limit<S>(
    State(state): State<AppState<S>>,
    req: Request,
    next: Next,
) -> Response
where
    S: Clone + Send + Sync + 'static,
{
    let device_id = req
        .headers()
        .get("x-device-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty());

    match device_id {
        Some(device_id) => {
            let max = state.settings.refresh_device_limit;
            let window = state.settings.refresh_device_window;
            enforce(
                &state,
                format!("refresh:device:{device_id}"),
                max,
                window,
                req,
                next,
            )
            .await
        }
        None => next.run(req).await,
    }
}
