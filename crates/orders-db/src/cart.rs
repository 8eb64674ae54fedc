//! The active cart: each user's single order in status `new`.

use chrono::{DateTime, Utc};
use orders_core::Caller;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// An order line joined with its product and shop, priced at the current
/// listing price for that `(product, shop)` pair.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartItemRow {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub shop_id: i64,
    pub shop_name: String,
    pub quantity: i32,
    /// `None` once the shop no longer lists the product.
    pub price: Option<Decimal>,
}

impl CartItemRow {
    /// `quantity × price`, or zero for an unlisted item.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price
            .map_or(Decimal::ZERO, |price| price * Decimal::from(self.quantity))
    }
}

#[derive(Debug, Clone)]
pub struct CartView {
    pub order_id: i64,
    pub created_at: DateTime<Utc>,
    pub items: Vec<CartItemRow>,
    pub total: Decimal,
}

/// Returns the caller's active cart, or `None` if they have not started one.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn get_active_cart(pool: &PgPool, caller: &Caller) -> Result<Option<CartView>, DbError> {
    let order = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
        "SELECT id, created_at FROM orders WHERE user_id = $1 AND status = 'new'",
    )
    .bind(caller.user_id)
    .fetch_optional(pool)
    .await?;

    let Some((order_id, created_at)) = order else {
        return Ok(None);
    };

    let items = fetch_order_items(pool, order_id, None).await?;
    let total = items.iter().map(CartItemRow::line_total).sum();

    Ok(Some(CartView {
        order_id,
        created_at,
        items,
        total,
    }))
}

/// Puts `quantity` of a product into the caller's cart, creating the cart on
/// first use.
///
/// The shop is the one with the lowest-id listing of the product. Adding a
/// product that is already in the cart replaces its quantity.
///
/// # Errors
///
/// - [`DbError::InvalidInput`] if `quantity` is below 1.
/// - [`DbError::NotFound`] if the product does not exist or no shop lists it.
/// - [`DbError::Sqlx`] for any database failure.
pub async fn add_cart_item(
    pool: &PgPool,
    caller: &Caller,
    product_id: i64,
    quantity: i32,
) -> Result<CartItemRow, DbError> {
    if quantity < 1 {
        return Err(DbError::InvalidInput(
            "quantity must be at least 1".to_string(),
        ));
    }

    let shop_id: i64 = sqlx::query_scalar(
        "SELECT shop_id FROM product_infos WHERE product_id = $1 ORDER BY id LIMIT 1",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    let mut tx = pool.begin().await?;

    // Backed by the partial unique index on orders(user_id) WHERE status = 'new'.
    sqlx::query(
        "INSERT INTO orders (user_id, status) VALUES ($1, 'new') \
         ON CONFLICT (user_id) WHERE status = 'new' DO NOTHING",
    )
    .bind(caller.user_id)
    .execute(&mut *tx)
    .await?;

    let order_id: i64 = sqlx::query_scalar(
        "SELECT id FROM orders WHERE user_id = $1 AND status = 'new' FOR UPDATE",
    )
    .bind(caller.user_id)
    .fetch_one(&mut *tx)
    .await?;

    let item_id: i64 = sqlx::query_scalar(
        "INSERT INTO order_items (order_id, product_id, shop_id, quantity) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (order_id, product_id, shop_id) DO UPDATE SET \
             quantity = EXCLUDED.quantity \
         RETURNING id",
    )
    .bind(order_id)
    .bind(product_id)
    .bind(shop_id)
    .bind(quantity)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(
        user_id = caller.user_id,
        order_id,
        product_id,
        shop_id,
        quantity,
        "cart item set"
    );

    fetch_order_items(pool, order_id, Some(item_id))
        .await?
        .into_iter()
        .next()
        .ok_or(DbError::NotFound)
}

/// Removes one line from the caller's active cart.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the item is not in the caller's active
/// cart, including items of confirmed orders and of other users.
pub async fn remove_cart_item(pool: &PgPool, caller: &Caller, item_id: i64) -> Result<(), DbError> {
    let rows = sqlx::query(
        "DELETE FROM order_items oi \
         USING orders o \
         WHERE oi.id = $1 \
           AND oi.order_id = o.id \
           AND o.user_id = $2 \
           AND o.status = 'new'",
    )
    .bind(item_id)
    .bind(caller.user_id)
    .execute(pool)
    .await?
    .rows_affected();

    if rows == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Loads an order's lines, optionally narrowed to one item.
pub(crate) async fn fetch_order_items(
    pool: &PgPool,
    order_id: i64,
    item_id: Option<i64>,
) -> Result<Vec<CartItemRow>, DbError> {
    let rows = sqlx::query_as::<_, CartItemRow>(
        "SELECT oi.id, oi.product_id, p.name AS product_name, \
                oi.shop_id, s.name AS shop_name, oi.quantity, listing.price \
         FROM order_items oi \
         JOIN products p ON p.id = oi.product_id \
         JOIN shops s ON s.id = oi.shop_id \
         LEFT JOIN LATERAL ( \
             SELECT pi.price FROM product_infos pi \
             WHERE pi.product_id = oi.product_id AND pi.shop_id = oi.shop_id \
             ORDER BY pi.id \
             LIMIT 1 \
         ) listing ON TRUE \
         WHERE oi.order_id = $1 \
           AND ($2::bigint IS NULL OR oi.id = $2) \
         ORDER BY oi.id",
    )
    .bind(order_id)
    .bind(item_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
