use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use timesync_core::serde::to_rfc3339;

use crate::domain::store::AuthStore;
use crate::domain::types::Role;
use crate::error::AuthError;
use crate::state::AppState;
use crate::usecase::logout::{LogoutInput, LogoutUseCase};
use crate::usecase::refresh::{RefreshInput, RefreshTokenUseCase};
use crate::usecase::request_code::{RequestCodeInput, RequestCodeUseCase};
use crate::usecase::verify_code::{VerifyCodeInput, VerifyCodeUseCase};

/// `X-Device-Id` request header, required non-empty on token endpoints.
#[derive(Debug, Clone)]
pub struct DeviceId(pub String);

impl<S> FromRequestParts<S> for DeviceId
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    // axum-core 0.5 defines this as `fn -> impl Future + Send` (not `async
    // fn`); extract synchronously and return a 'static block.
    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let device_id = parts
            .headers
            .get("x-device-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());

        async move {
            device_id
                .map(Self)
                .ok_or(AuthError::BadInput("X-Device-Id header is required"))
        }
    }
}

#[derive(Deserialize)]
pub struct RequestCodeRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub code: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(serialize_with = "to_rfc3339")]
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    #[serde(serialize_with = "to_rfc3339")]
    pub refresh_expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Serialize)]
pub struct UserBody {
    pub id: Uuid,
    pub email: String,
}

#[derive(Serialize)]
pub struct TeamBody {
    pub id: Uuid,
    pub domain: String,
    pub name: String,
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    body.map(|Json(value)| value)
        .map_err(|_| AuthError::BadInput("invalid request body"))
}

// ── POST /auth/request-code ──────────────────────────────────────────────────

pub async fn request_code<S>(
    State(state): State<AppState<S>>,
    body: Result<Json<RequestCodeRequest>, JsonRejection>,
) -> Result<StatusCode, AuthError>
where
    S: AuthStore + Clone + Send + Sync + 'static,
{
    let req = parse_body(body)?;

    let usecase = RequestCodeUseCase {
        store: state.store.clone(),
        mailer: state.mailer.clone(),
        email_limit: state.email_limit.clone(),
        settings: state.settings.clone(),
    };
    usecase
        .execute(RequestCodeInput { email: req.email }, Utc::now())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ── POST /auth/verify-code ───────────────────────────────────────────────────

pub async fn verify_code<S>(
    State(state): State<AppState<S>>,
    device: DeviceId,
    body: Result<Json<VerifyCodeRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError>
where
    S: AuthStore + Clone + Send + Sync + 'static,
{
    let req = parse_body(body)?;

    let usecase = VerifyCodeUseCase {
        store: state.store.clone(),
        fail_limit: state.fail_limit.clone(),
        settings: state.settings.clone(),
    };
    let out = usecase
        .execute(
            VerifyCodeInput {
                email: req.email,
                code: req.code,
                device_id: device.0,
            },
            Utc::now(),
        )
        .await?;

    Ok(Json(AuthResponse {
        access_token: out.access_token,
        access_expires_at: out.access_expires_at,
        refresh_token: out.refresh_token,
        refresh_expires_at: out.refresh_expires_at,
        user: Some(UserBody {
            id: out.user.id,
            email: out.user.email,
        }),
        team: Some(TeamBody {
            id: out.team.id,
            domain: out.team.domain,
            name: out.team.name,
        }),
        role: Some(out.role),
    }))
}

// ── POST /auth/refresh ───────────────────────────────────────────────────────

pub async fn refresh<S>(
    State(state): State<AppState<S>>,
    device: DeviceId,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError>
where
    S: AuthStore + Clone + Send + Sync + 'static,
{
    let req = parse_body(body)?;

    let usecase = RefreshTokenUseCase {
        store: state.store.clone(),
        settings: state.settings.clone(),
    };
    let out = usecase
        .execute(
            RefreshInput {
                refresh_token: req.refresh_token,
                device_id: device.0,
            },
            Utc::now(),
        )
        .await?;

    Ok(Json(AuthResponse {
        access_token: out.access_token,
        access_expires_at: out.access_expires_at,
        refresh_token: out.refresh_token,
        refresh_expires_at: out.refresh_expires_at,
        user: None,
        team: None,
        role: None,
    }))
}

// ── POST /auth/logout ────────────────────────────────────────────────────────

pub async fn logout<S>(
    State(state): State<AppState<S>>,
    device: DeviceId,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<StatusCode, AuthError>
where
    S: AuthStore + Clone + Send + Sync + 'static,
{
    let req = parse_body(body)?;

    let usecase = LogoutUseCase {
        store: state.store.clone(),
    };
    usecase
        .execute(
            LogoutInput {
                refresh_token: req.refresh_token,
                device_id: device.0,
            },
            Utc::now(),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
