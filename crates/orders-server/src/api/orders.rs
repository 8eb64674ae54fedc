use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use orders_core::Caller;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{
    cart::CartLineItem, map_db_error, ApiError, ApiResponse, AppState, JsonBody, ResponseMeta,
};

/// An order with its total at current listing prices.
#[derive(Debug, Serialize)]
pub(super) struct OrderItem {
    id: i64,
    status: String,
    contact_id: Option<i64>,
    created_at: DateTime<Utc>,
    item_count: i64,
    total: Decimal,
}

impl From<orders_db::OrderSummaryRow> for OrderItem {
    fn from(row: orders_db::OrderSummaryRow) -> Self {
        Self {
            id: row.id,
            status: row.status,
            contact_id: row.contact_id,
            created_at: row.created_at,
            item_count: row.item_count,
            total: row.total,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct OrderDetailItem {
    #[serde(flatten)]
    order: OrderItem,
    items: Vec<CartLineItem>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ConfirmOrderRequest {
    pub order_id: i64,
    pub contact_id: i64,
}

/// POST /api/v1/confirm-order
pub(super) async fn confirm_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    JsonBody(body): JsonBody<ConfirmOrderRequest>,
) -> Result<Json<ApiResponse<OrderItem>>, ApiError> {
    let row = orders_db::confirm_order(&state.pool, &caller, body.order_id, body.contact_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: OrderItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/v1/orders: placed orders, newest first.
pub(super) async fn list_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<ApiResponse<Vec<OrderItem>>>, ApiError> {
    let rows = orders_db::list_order_history(&state.pool, &caller)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(OrderItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/v1/orders/{order_id}
pub(super) async fn get_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<i64>,
) -> Result<Json<ApiResponse<OrderDetailItem>>, ApiError> {
    let detail = orders_db::get_order(&state.pool, &caller, order_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: OrderDetailItem {
            order: OrderItem::from(detail.order),
            items: detail.items.into_iter().map(CartLineItem::from).collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
