//! Database operations for the `contacts` table.

use chrono::{DateTime, Utc};
use orders_core::{Caller, ContactKind};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `contacts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContactRow {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

/// Returns the caller's contacts, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_contacts(pool: &PgPool, caller: &Caller) -> Result<Vec<ContactRow>, DbError> {
    let rows = sqlx::query_as::<_, ContactRow>(
        "SELECT id, user_id, kind, value, created_at \
         FROM contacts \
         WHERE user_id = $1 \
         ORDER BY id",
    )
    .bind(caller.user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Adds a contact for the caller. No format validation beyond non-empty.
///
/// # Errors
///
/// Returns [`DbError::InvalidInput`] for a blank value and [`DbError::Sqlx`]
/// if the insert fails.
pub async fn create_contact(
    pool: &PgPool,
    caller: &Caller,
    kind: ContactKind,
    value: &str,
) -> Result<ContactRow, DbError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DbError::InvalidInput(
            "contact value must be non-empty".to_string(),
        ));
    }

    let row = sqlx::query_as::<_, ContactRow>(
        "INSERT INTO contacts (user_id, kind, value) \
         VALUES ($1, $2, $3) \
         RETURNING id, user_id, kind, value, created_at",
    )
    .bind(caller.user_id)
    .bind(kind.as_str())
    .bind(value)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Deletes one of the caller's contacts.
///
/// Orders that referenced it keep their history with the contact unset.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such contact belongs to the caller.
pub async fn delete_contact(pool: &PgPool, caller: &Caller, contact_id: i64) -> Result<(), DbError> {
    let rows = sqlx::query("DELETE FROM contacts WHERE id = $1 AND user_id = $2")
        .bind(contact_id)
        .bind(caller.user_id)
        .execute(pool)
        .await?
        .rows_affected();

    if rows == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
