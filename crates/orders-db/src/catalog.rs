//! Read-side queries over shops, categories, and listings.

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShopRow {
    pub id: i64,
    pub name: String,
    pub url: Option<String>,
    pub listing_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    /// Names of the shops that have listed this category, sorted.
    pub shops: Vec<String>,
}

/// One shop's offer of a product, joined with its product, category and shop.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingRow {
    pub listing_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub category_id: i64,
    pub category_name: String,
    pub shop_id: i64,
    pub shop_name: String,
    pub external_id: Option<i64>,
    pub model: Option<String>,
    pub price: Decimal,
    pub price_rrc: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingParameterRow {
    pub listing_id: i64,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProductListFilters<'a> {
    /// Case-insensitive substring match on the product name.
    pub search: Option<&'a str>,
    pub category_id: Option<i64>,
    pub shop_id: Option<i64>,
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns listings matching `filters`, ordered by product name then price.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(
    pool: &PgPool,
    filters: ProductListFilters<'_>,
) -> Result<Vec<ListingRow>, DbError> {
    let pattern = filters
        .search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", escape_like(s)));

    let rows = sqlx::query_as::<_, ListingRow>(
        "SELECT pi.id AS listing_id, p.id AS product_id, p.name AS product_name, \
                c.id AS category_id, c.name AS category_name, \
                s.id AS shop_id, s.name AS shop_name, \
                pi.external_id, pi.model, pi.price, pi.price_rrc, pi.quantity \
         FROM product_infos pi \
         JOIN products p ON p.id = pi.product_id \
         JOIN categories c ON c.id = p.category_id \
         JOIN shops s ON s.id = pi.shop_id \
         WHERE ($1::text IS NULL OR p.name ILIKE $1) \
           AND ($2::bigint IS NULL OR c.id = $2) \
           AND ($3::bigint IS NULL OR s.id = $3) \
         ORDER BY p.name, pi.price, pi.id \
         LIMIT $4",
    )
    .bind(pattern)
    .bind(filters.category_id)
    .bind(filters.shop_id)
    .bind(filters.limit.unwrap_or(50))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the parameters of the given listings, ordered by listing then name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_listing_parameters(
    pool: &PgPool,
    listing_ids: &[i64],
) -> Result<Vec<ListingParameterRow>, DbError> {
    if listing_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, ListingParameterRow>(
        "SELECT pp.product_info_id AS listing_id, pa.name, pp.value \
         FROM product_parameters pp \
         JOIN parameters pa ON pa.id = pp.parameter_id \
         WHERE pp.product_info_id = ANY($1) \
         ORDER BY pp.product_info_id, pa.name, pp.id",
    )
    .bind(listing_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns all categories with the shops linked to them.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_categories(pool: &PgPool) -> Result<Vec<CategoryRow>, DbError> {
    let rows = sqlx::query_as::<_, CategoryRow>(
        "SELECT c.id, c.name, \
                COALESCE(ARRAY_AGG(s.name ORDER BY s.name) FILTER (WHERE s.id IS NOT NULL), \
                         ARRAY[]::text[]) AS shops \
         FROM categories c \
         LEFT JOIN shop_categories sc ON sc.category_id = c.id \
         LEFT JOIN shops s ON s.id = sc.shop_id \
         GROUP BY c.id, c.name \
         ORDER BY c.name, c.id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns all shops with their current listing counts.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_shops(pool: &PgPool) -> Result<Vec<ShopRow>, DbError> {
    let rows = sqlx::query_as::<_, ShopRow>(
        "SELECT s.id, s.name, s.url, COUNT(pi.id) AS listing_count \
         FROM shops s \
         LEFT JOIN product_infos pi ON pi.shop_id = s.id \
         GROUP BY s.id, s.name, s.url \
         ORDER BY s.name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Escapes `ILIKE` wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
