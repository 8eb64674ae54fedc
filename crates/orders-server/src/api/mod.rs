mod auth;
mod cart;
mod contacts;
mod import;
mod orders;
mod products;

use axum::{
    extract::{DefaultBodyLimit, FromRequest, Request, State},
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use orders_db::DbError;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{
    enforce_rate_limit, request_id, request_id_of, require_caller, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub token_ttl_hours: u32,
    pub import_max_bytes: usize,
}

impl AppState {
    #[must_use]
    pub fn from_config(pool: PgPool, config: &orders_core::AppConfig) -> Self {
        Self {
            pool,
            token_ttl_hours: config.token_ttl_hours,
            import_max_bytes: config.import_max_bytes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "payload_too_large" => StatusCode::PAYLOAD_TOO_LARGE,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

/// Maps a database-layer error to the client-facing error envelope.
///
/// Domain failures keep their message; infrastructure failures are logged and
/// reported as a generic `internal_error`.
pub(super) fn map_db_error(request_id: String, error: &DbError) -> ApiError {
    match error {
        DbError::NotFound => ApiError::new(request_id, "not_found", "resource not found"),
        DbError::Forbidden(message) => ApiError::new(request_id, "forbidden", message.clone()),
        DbError::InvalidInput(message) => {
            ApiError::new(request_id, "validation_error", message.clone())
        }
        DbError::UnknownCategory(_)
        | DbError::InvalidOrderTransition { .. }
        | DbError::EmptyOrder(_)
        | DbError::DuplicateEmail
        | DbError::InvalidCredentials => {
            ApiError::new(request_id, "bad_request", error.to_string())
        }
        DbError::PasswordHash
        | DbError::Sqlx(_)
        | DbError::Migration(_) => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

/// JSON request body whose rejections are reported as `bad_request` in the
/// error envelope rather than axum's plain-text 4xx.
pub(super) struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let request_id = request_id_of(&req);
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::new(
                request_id,
                "bad_request",
                rejection.body_text(),
            )),
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/register", post(auth::register))
        .route("/api/v1/login", post(auth::login))
        .route("/api/v1/products", get(products::list_products))
        .route("/api/v1/categories", get(products::list_categories))
        .route("/api/v1/shops", get(products::list_shops))
}

fn protected_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/logout", post(auth::logout))
        .route(
            "/api/v1/import-products",
            post(import::import_products).layer(DefaultBodyLimit::max(state.import_max_bytes)),
        )
        .route(
            "/api/v1/cart",
            get(cart::get_cart)
                .post(cart::add_cart_item)
                .delete(cart::remove_cart_item),
        )
        .route(
            "/api/v1/contacts",
            get(contacts::list_contacts)
                .post(contacts::create_contact)
                .delete(contacts::delete_contact),
        )
        .route("/api/v1/confirm-order", post(orders::confirm_order))
        .route("/api/v1/orders", get(orders::list_orders))
        .route("/api/v1/orders/{order_id}", get(orders::get_order))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_caller,
        ))
}

pub fn build_app(state: AppState, rate_limit: RateLimitState) -> Router {
    Router::new()
        .merge(public_router())
        .merge(protected_router(&state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                )),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match orders_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
