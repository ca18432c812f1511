use std::time::Duration;

use axum::routing::{get, post};
use axum::{Router, middleware};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use timesync_core::health::health;

use crate::domain::store::AuthStore;
use crate::handlers::auth::{logout, refresh, request_code, verify_code};
use crate::middleware::{refresh_device_limit, request_code_ip_limit, verify_code_ip_limit};
use crate::state::AppState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub fn build_router<S>(state: AppState<S>) -> Router
where
    S: AuthStore + Clone + Send + Sync + 'static,
{
    Router::new()
        // Health
        .route("/health", get(health))
        // Auth, with per-IP / per-device budgets enforced before dispatch
        .route(
            "/auth/request-code",
            post(request_code::<S>).layer(middleware::from_fn_with_state(
                state.clone(),
                request_code_ip_limit::<S>,
            )),
        )
        .route(
            "/auth/verify-code",
            post(verify_code::<S>).layer(middleware::from_fn_with_state(
                state.clone(),
                verify_code_ip_limit::<S>,
            )),
        )
        .route(
            "/auth/refresh",
            post(refresh::<S>).layer(middleware::from_fn_with_state(
                state.clone(),
                refresh_device_limit::<S>,
            )),
        )
        .route("/auth/logout", post(logout::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        // A handler panic becomes a 500 instead of a dropped connection.
        .layer(CatchPanicLayer::new())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .with_state(state)
}
