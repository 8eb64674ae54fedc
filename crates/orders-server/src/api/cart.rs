use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use orders_core::Caller;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, JsonBody, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct CartLineItem {
    id: i64,
    product_id: i64,
    product_name: String,
    shop_id: i64,
    shop_name: String,
    quantity: i32,
    price: Option<Decimal>,
    line_total: Decimal,
}

impl From<orders_db::CartItemRow> for CartLineItem {
    fn from(row: orders_db::CartItemRow) -> Self {
        Self {
            line_total: row.line_total(),
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            shop_id: row.shop_id,
            shop_name: row.shop_name,
            quantity: row.quantity,
            price: row.price,
        }
    }
}

/// The caller's cart. A caller without one gets `empty: true`, no order id,
/// and no items.
#[derive(Debug, Serialize)]
pub(super) struct CartBody {
    empty: bool,
    order_id: Option<i64>,
    created_at: Option<DateTime<Utc>>,
    items: Vec<CartLineItem>,
    total: Decimal,
}

#[derive(Debug, Deserialize)]
pub(super) struct AddCartItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub(super) struct RemoveCartItemRequest {
    pub item_id: i64,
}

/// GET /api/v1/cart
pub(super) async fn get_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<ApiResponse<CartBody>>, ApiError> {
    let cart = orders_db::get_active_cart(&state.pool, &caller)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = match cart {
        Some(cart) => CartBody {
            empty: cart.items.is_empty(),
            order_id: Some(cart.order_id),
            created_at: Some(cart.created_at),
            items: cart.items.into_iter().map(CartLineItem::from).collect(),
            total: cart.total,
        },
        None => CartBody {
            empty: true,
            order_id: None,
            created_at: None,
            items: Vec::new(),
            total: Decimal::ZERO,
        },
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/cart: sets the quantity of a product in the cart.
pub(super) async fn add_cart_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    JsonBody(body): JsonBody<AddCartItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CartLineItem>>), ApiError> {
    let row = orders_db::add_cart_item(&state.pool, &caller, body.product_id, body.quantity)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: CartLineItem::from(row),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// DELETE /api/v1/cart
pub(super) async fn remove_cart_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    JsonBody(body): JsonBody<RemoveCartItemRequest>,
) -> Result<StatusCode, ApiError> {
    orders_db::remove_cart_item(&state.pool, &caller, body.item_id)
        .await
        .map_err(|e| map_db_error(req_id.0, &e))?;

    Ok(StatusCode::NO_CONTENT)
}
