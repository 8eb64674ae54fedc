use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct ParameterItem {
    name: String,
    value: String,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    listing_id: i64,
    product_id: i64,
    product_name: String,
    category_id: i64,
    category_name: String,
    shop_id: i64,
    shop_name: String,
    external_id: Option<i64>,
    model: Option<String>,
    price: Decimal,
    price_rrc: Decimal,
    quantity: i32,
    parameters: Vec<ParameterItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct CategoryItem {
    id: i64,
    name: String,
    shops: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ShopItem {
    id: i64,
    name: String,
    url: Option<String>,
    listing_count: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductQuery {
    pub search: Option<String>,
    pub category_id: Option<i64>,
    pub shop_id: Option<i64>,
    pub limit: Option<i64>,
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let rows = orders_db::list_products(
        &state.pool,
        orders_db::ProductListFilters {
            search: query.search.as_deref(),
            category_id: query.category_id,
            shop_id: query.shop_id,
            limit: Some(normalize_limit(query.limit)),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let listing_ids: Vec<i64> = rows.iter().map(|r| r.listing_id).collect();
    let mut parameters: HashMap<i64, Vec<ParameterItem>> = HashMap::new();
    for param in orders_db::list_listing_parameters(&state.pool, &listing_ids)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
    {
        parameters
            .entry(param.listing_id)
            .or_default()
            .push(ParameterItem {
                name: param.name,
                value: param.value,
            });
    }

    let data = rows
        .into_iter()
        .map(|row| ProductItem {
            parameters: parameters.remove(&row.listing_id).unwrap_or_default(),
            listing_id: row.listing_id,
            product_id: row.product_id,
            product_name: row.product_name,
            category_id: row.category_id,
            category_name: row.category_name,
            shop_id: row.shop_id,
            shop_name: row.shop_name,
            external_id: row.external_id,
            model: row.model,
            price: row.price,
            price_rrc: row.price_rrc,
            quantity: row.quantity,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_categories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<CategoryItem>>>, ApiError> {
    let rows = orders_db::list_categories(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| CategoryItem {
            id: row.id,
            name: row.name,
            shops: row.shops,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_shops(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<ShopItem>>>, ApiError> {
    let rows = orders_db::list_shops(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| ShopItem {
            id: row.id,
            name: row.name,
            url: row.url,
            listing_count: row.listing_count,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
