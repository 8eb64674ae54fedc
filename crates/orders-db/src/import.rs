//! Catalog import: replaces a shop's listings with the contents of an
//! uploaded document.

use std::collections::HashSet;

use orders_core::{Caller, GoodEntry, ImportDocument};
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// What an import wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub shop_id: i64,
    pub shop_name: String,
    pub categories: usize,
    /// Listings deleted before the new ones were written.
    pub replaced_listings: u64,
    pub listings: usize,
    pub parameters: usize,
}

/// Replaces the caller's shop catalog with `document`.
///
/// Steps, all inside one transaction:
/// 1. resolve or create the shop by name (created shops are owned by the
///    caller; an unowned shop is claimed);
/// 2. upsert every document category by id, overwriting its name, and link
///    it to the shop (links are never removed);
/// 3. delete all of the shop's listings, cascading to their parameters;
/// 4. for each good, resolve or create the product by `(name, category)`,
///    insert a fresh listing and one parameter row per entry.
///
/// Any failure rolls the whole import back, leaving the previous catalog in
/// place. The shop row is locked for the duration, so concurrent imports for
/// the same shop run one after the other.
///
/// # Errors
///
/// - [`DbError::Forbidden`] if the caller is not a shop account, or the shop
///   belongs to another user.
/// - [`DbError::InvalidInput`] if the document fails validation.
/// - [`DbError::UnknownCategory`] if a good references a category that
///   neither the document nor the database defines.
/// - [`DbError::Sqlx`] for any database failure.
pub async fn import_catalog(
    pool: &PgPool,
    caller: &Caller,
    document: &ImportDocument,
) -> Result<ImportSummary, DbError> {
    caller.require_shop()?;
    document
        .validate()
        .map_err(|e| DbError::InvalidInput(e.to_string()))?;

    let shop_name = document.shop.trim();
    let mut tx = pool.begin().await?;

    let shop_id = resolve_shop(&mut *tx, caller, shop_name, document.url.as_deref()).await?;

    for category in &document.categories {
        sqlx::query(
            "INSERT INTO categories (id, name) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 updated_at = NOW()",
        )
        .bind(category.id)
        .bind(category.name.trim())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO shop_categories (shop_id, category_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(shop_id)
        .bind(category.id)
        .execute(&mut *tx)
        .await?;
    }

    let replaced_listings = sqlx::query("DELETE FROM product_infos WHERE shop_id = $1")
        .bind(shop_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let mut known_categories: HashSet<i64> = document.categories.iter().map(|c| c.id).collect();
    let mut parameters = 0usize;

    for good in &document.goods {
        if !known_categories.contains(&good.category) {
            ensure_category_exists(&mut *tx, good.category).await?;
            known_categories.insert(good.category);
        }
        parameters += insert_listing(&mut *tx, shop_id, good).await?;
    }

    tx.commit().await?;

    let summary = ImportSummary {
        shop_id,
        shop_name: shop_name.to_string(),
        categories: document.categories.len(),
        replaced_listings,
        listings: document.goods.len(),
        parameters,
    };

    tracing::info!(
        shop_id,
        shop = %summary.shop_name,
        user_id = caller.user_id,
        categories = summary.categories,
        replaced = summary.replaced_listings,
        listings = summary.listings,
        parameters = summary.parameters,
        "catalog imported"
    );

    Ok(summary)
}

async fn resolve_shop(
    conn: &mut PgConnection,
    caller: &Caller,
    name: &str,
    url: Option<&str>,
) -> Result<i64, DbError> {
    sqlx::query(
        "INSERT INTO shops (name, url, user_id) VALUES ($1, $2, $3) \
         ON CONFLICT (name) DO NOTHING",
    )
    .bind(name)
    .bind(url)
    .bind(caller.user_id)
    .execute(&mut *conn)
    .await?;

    let (shop_id, owner) = sqlx::query_as::<_, (i64, Option<i64>)>(
        "SELECT id, user_id FROM shops WHERE name = $1 FOR UPDATE",
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;

    if owner.is_some_and(|owner| owner != caller.user_id) {
        tracing::warn!(
            shop_id,
            user_id = caller.user_id,
            "import rejected: shop belongs to another account"
        );
        return Err(DbError::Forbidden(format!(
            "shop '{name}' belongs to another account"
        )));
    }

    sqlx::query(
        "UPDATE shops \
         SET user_id = $2, url = COALESCE($3, url), updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(shop_id)
    .bind(caller.user_id)
    .bind(url)
    .execute(&mut *conn)
    .await?;

    Ok(shop_id)
}

async fn ensure_category_exists(conn: &mut PgConnection, category_id: i64) -> Result<(), DbError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)")
            .bind(category_id)
            .fetch_one(&mut *conn)
            .await?;

    if exists {
        Ok(())
    } else {
        Err(DbError::UnknownCategory(category_id))
    }
}

/// Writes one listing and its parameters. Returns the parameter count.
async fn insert_listing(
    conn: &mut PgConnection,
    shop_id: i64,
    good: &GoodEntry,
) -> Result<usize, DbError> {
    let quantity = i32::try_from(good.quantity).map_err(|_| {
        DbError::InvalidInput(format!("quantity {} is too large", good.quantity))
    })?;

    // The no-op update makes RETURNING yield the id of an existing row too.
    let product_id: i64 = sqlx::query_scalar(
        "INSERT INTO products (category_id, name) VALUES ($1, $2) \
         ON CONFLICT (category_id, name) DO UPDATE SET name = EXCLUDED.name \
         RETURNING id",
    )
    .bind(good.category)
    .bind(good.name.trim())
    .fetch_one(&mut *conn)
    .await?;

    let listing_id: i64 = sqlx::query_scalar(
        "INSERT INTO product_infos \
             (product_id, shop_id, external_id, model, price, price_rrc, quantity) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(product_id)
    .bind(shop_id)
    .bind(good.id)
    .bind(good.model.as_deref())
    .bind(good.price)
    .bind(good.price_rrc)
    .bind(quantity)
    .fetch_one(&mut *conn)
    .await?;

    for (name, value) in &good.parameters {
        let parameter_id: i64 = sqlx::query_scalar(
            "INSERT INTO parameters (name) VALUES ($1) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id",
        )
        .bind(name.trim())
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(
            "INSERT INTO product_parameters (product_info_id, parameter_id, value) \
             VALUES ($1, $2, $3)",
        )
        .bind(listing_id)
        .bind(parameter_id)
        .bind(value)
        .execute(&mut *conn)
        .await?;
    }

    Ok(good.parameters.len())
}
