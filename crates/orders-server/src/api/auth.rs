//! Account handlers: register, login, logout.

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use orders_core::UserRole;
use serde::{Deserialize, Serialize};

use crate::middleware::{extract_bearer_token, RequestId};

use super::{map_db_error, ApiError, ApiResponse, AppState, JsonBody, ResponseMeta};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct RegisterRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    /// `shop` or `buyer`; absent means `buyer`.
    #[serde(rename = "type")]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    pub email: String,
    pub password: String,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct UserItem {
    id: i64,
    email: String,
    first_name: String,
    last_name: String,
    #[serde(rename = "type")]
    role: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct TokenItem {
    token: String,
    expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/register
pub(super) async fn register(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserItem>>), ApiError> {
    let role = match body.role.as_deref() {
        None => UserRole::default(),
        Some(raw) => raw
            .parse::<UserRole>()
            .map_err(|e| ApiError::new(&req_id.0, "validation_error", e.to_string()))?,
    };

    let row = orders_db::create_user(
        &state.pool,
        &orders_db::NewUser {
            email: &body.email,
            first_name: &body.first_name,
            last_name: &body.last_name,
            password: &body.password,
            role,
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: UserItem {
                id: row.id,
                email: row.email,
                first_name: row.first_name,
                last_name: row.last_name,
                role: row.role,
                created_at: row.created_at,
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// POST /api/v1/login
pub(super) async fn login(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<ApiResponse<TokenItem>>, ApiError> {
    let issued = orders_db::login(
        &state.pool,
        &body.email,
        &body.password,
        state.token_ttl_hours,
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: TokenItem {
            token: issued.token,
            expires_at: issued.expires_at,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/logout: revokes the token the request was made with.
pub(super) async fn logout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    // The auth layer already rejected requests without a token.
    let Some(token) = extract_bearer_token(headers.get(AUTHORIZATION)) else {
        return Err(ApiError::new(
            req_id.0,
            "unauthorized",
            "missing or invalid bearer token",
        ));
    };

    orders_db::revoke_token(&state.pool, token)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(StatusCode::NO_CONTENT)
}
