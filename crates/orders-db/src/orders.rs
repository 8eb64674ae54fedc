//! Confirmed orders: the cart-to-order transition and order history.

use chrono::{DateTime, Utc};
use orders_core::{Caller, OrderStatus};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::{cart::fetch_order_items, CartItemRow, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// One order with its live total.
///
/// `total` sums `quantity × price` over the order's lines at today's listing
/// prices. Lines whose listing has since disappeared contribute zero.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderSummaryRow {
    pub id: i64,
    pub status: String,
    pub contact_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub item_count: i64,
    pub total: Decimal,
}

#[derive(Debug, Clone)]
pub struct OrderDetail {
    pub order: OrderSummaryRow,
    pub items: Vec<CartItemRow>,
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Moves one of the caller's orders from `new` to `in_progress` and binds the
/// delivery contact.
///
/// The order row is locked for the duration, so two concurrent confirmations
/// cannot both succeed.
///
/// # Errors
///
/// - [`DbError::NotFound`] if the order or the contact does not belong to the
///   caller.
/// - [`DbError::InvalidOrderTransition`] if the order is no longer `new`.
/// - [`DbError::EmptyOrder`] if the order has no items.
/// - [`DbError::Sqlx`] for any database failure.
pub async fn confirm_order(
    pool: &PgPool,
    caller: &Caller,
    order_id: i64,
    contact_id: i64,
) -> Result<OrderSummaryRow, DbError> {
    let mut tx = pool.begin().await?;

    let status: String = sqlx::query_scalar(
        "SELECT status FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(order_id)
    .bind(caller.user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(DbError::NotFound)?;

    let contact_owned: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM contacts WHERE id = $1 AND user_id = $2)",
    )
    .bind(contact_id)
    .bind(caller.user_id)
    .fetch_one(&mut *tx)
    .await?;
    if !contact_owned {
        return Err(DbError::NotFound);
    }

    let current = status.parse::<OrderStatus>()?;
    if !current.can_transition_to(OrderStatus::InProgress) {
        return Err(DbError::InvalidOrderTransition {
            id: order_id,
            status,
        });
    }

    let has_items: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM order_items WHERE order_id = $1)")
            .bind(order_id)
            .fetch_one(&mut *tx)
            .await?;
    if !has_items {
        return Err(DbError::EmptyOrder(order_id));
    }

    sqlx::query("UPDATE orders SET status = $2, contact_id = $3 WHERE id = $1")
        .bind(order_id)
        .bind(OrderStatus::InProgress.as_str())
        .bind(contact_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = caller.user_id, order_id, contact_id, "order confirmed");

    fetch_summaries(pool, caller.user_id, Some(order_id), true)
        .await?
        .into_iter()
        .next()
        .ok_or(DbError::NotFound)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns the caller's placed orders (every status except `new`), newest
/// first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_order_history(
    pool: &PgPool,
    caller: &Caller,
) -> Result<Vec<OrderSummaryRow>, DbError> {
    fetch_summaries(pool, caller.user_id, None, false).await
}

/// Returns one of the caller's orders with its lines, in any status.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the order does not belong to the caller
/// and [`DbError::Sqlx`] if a query fails.
pub async fn get_order(pool: &PgPool, caller: &Caller, order_id: i64) -> Result<OrderDetail, DbError> {
    let order = fetch_summaries(pool, caller.user_id, Some(order_id), true)
        .await?
        .into_iter()
        .next()
        .ok_or(DbError::NotFound)?;

    let items = fetch_order_items(pool, order_id, None).await?;
    Ok(OrderDetail { order, items })
}

async fn fetch_summaries(
    pool: &PgPool,
    user_id: i64,
    order_id: Option<i64>,
    include_new: bool,
) -> Result<Vec<OrderSummaryRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderSummaryRow>(
        "SELECT o.id, o.status, o.contact_id, o.created_at, \
                COUNT(oi.id) AS item_count, \
                COALESCE(SUM(oi.quantity * listing.price), 0)::NUMERIC AS total \
         FROM orders o \
         LEFT JOIN order_items oi ON oi.order_id = o.id \
         LEFT JOIN LATERAL ( \
             SELECT pi.price FROM product_infos pi \
             WHERE pi.product_id = oi.product_id AND pi.shop_id = oi.shop_id \
             ORDER BY pi.id \
             LIMIT 1 \
         ) listing ON TRUE \
         WHERE o.user_id = $1 \
           AND ($2::bigint IS NULL OR o.id = $2) \
           AND ($3 OR o.status <> 'new') \
         GROUP BY o.id \
         ORDER BY o.created_at DESC, o.id DESC",
    )
    .bind(user_id)
    .bind(order_id)
    .bind(include_new)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
