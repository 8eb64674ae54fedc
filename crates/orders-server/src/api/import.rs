//! Catalog upload for shop accounts.

use axum::{
    extract::{multipart::{MultipartError, MultipartRejection}, Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use orders_core::Caller;
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub(super) struct ImportItem {
    shop_id: i64,
    shop_name: String,
    categories: usize,
    replaced_listings: u64,
    listings: usize,
    parameters: usize,
}

/// POST /api/v1/import-products: multipart upload with a YAML `file` field.
pub(super) async fn import_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ApiResponse<ImportItem>>), ApiError> {
    let rid = &req_id.0;

    caller
        .require_shop()
        .map_err(|e| ApiError::new(rid, "forbidden", e.to_string()))?;

    let mut multipart =
        multipart.map_err(|rejection| ApiError::new(rid, "bad_request", rejection.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| map_multipart_error(rid, &e))?
    {
        if field.name() == Some(FILE_FIELD) {
            upload = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| map_multipart_error(rid, &e))?,
            );
            break;
        }
    }

    let Some(bytes) = upload else {
        return Err(ApiError::new(
            rid,
            "bad_request",
            format!("multipart field '{FILE_FIELD}' is required"),
        ));
    };

    let content = std::str::from_utf8(&bytes)
        .map_err(|_| ApiError::new(rid, "bad_request", "uploaded file is not valid UTF-8"))?;

    let document = orders_core::parse_import_document(content)
        .map_err(|e| ApiError::new(rid, "validation_error", e.to_string()))?;

    let summary = orders_db::import_catalog(&state.pool, &caller, &document)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: ImportItem {
                shop_id: summary.shop_id,
                shop_name: summary.shop_name,
                categories: summary.categories,
                replaced_listings: summary.replaced_listings,
                listings: summary.listings,
                parameters: summary.parameters,
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

fn map_multipart_error(req_id: &str, e: &MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(req_id, "payload_too_large", "uploaded file is too large")
    } else {
        ApiError::new(req_id, "bad_request", e.body_text())
    }
}
