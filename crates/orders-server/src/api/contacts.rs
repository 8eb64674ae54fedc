use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use orders_core::{Caller, ContactKind};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, JsonBody, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct ContactItem {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
    value: String,
    created_at: DateTime<Utc>,
}

impl From<orders_db::ContactRow> for ContactItem {
    fn from(row: orders_db::ContactRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            value: row.value,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateContactRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct DeleteContactRequest {
    pub id: i64,
}

/// GET /api/v1/contacts
pub(super) async fn list_contacts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<ApiResponse<Vec<ContactItem>>>, ApiError> {
    let rows = orders_db::list_contacts(&state.pool, &caller)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(ContactItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/contacts
pub(super) async fn create_contact(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    JsonBody(body): JsonBody<CreateContactRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ContactItem>>), ApiError> {
    let kind = body
        .kind
        .parse::<ContactKind>()
        .map_err(|e| ApiError::new(&req_id.0, "validation_error", e.to_string()))?;

    let row = orders_db::create_contact(&state.pool, &caller, kind, &body.value)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: ContactItem::from(row),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// DELETE /api/v1/contacts
pub(super) async fn delete_contact(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    JsonBody(body): JsonBody<DeleteContactRequest>,
) -> Result<StatusCode, ApiError> {
    orders_db::delete_contact(&state.pool, &caller, body.id)
        .await
        .map_err(|e| map_db_error(req_id.0, &e))?;

    Ok(StatusCode::NO_CONTENT)
}
