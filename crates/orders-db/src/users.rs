//! Database operations for `users` and `auth_tokens`.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use orders_core::{Caller, UserRole};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::{is_unique_violation, DbError};

const MIN_PASSWORD_LENGTH: usize = 8;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `users` table, without the password hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// `'shop'` or `'buyer'`, enforced by a CHECK constraint.
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    /// The identity this account acts as.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidInput`] if the stored role is unknown.
    pub fn caller(&self) -> Result<Caller, DbError> {
        Ok(Caller::new(self.id, self.role.parse::<UserRole>()?))
    }
}

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password: &'a str,
    pub role: UserRole,
}

/// A freshly issued bearer token. The raw value is never stored.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: i64,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct TokenOwnerRow {
    user_id: i64,
    role: String,
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Registers a new account.
///
/// The email is trimmed and lower-cased before storage.
///
/// # Errors
///
/// Returns [`DbError::InvalidInput`] for a malformed email, blank names, or a
/// short password, [`DbError::DuplicateEmail`] if the email is taken, and
/// [`DbError::Sqlx`] for other database failures.
pub async fn create_user(pool: &PgPool, new_user: &NewUser<'_>) -> Result<UserRow, DbError> {
    let email = normalize_email(new_user.email)?;
    let first_name = non_blank("first_name", new_user.first_name)?;
    let last_name = non_blank("last_name", new_user.last_name)?;
    validate_password(new_user.password)?;
    let password_hash = hash_password(new_user.password)?;

    let row = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (email, first_name, last_name, password_hash, role) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, email, first_name, last_name, role, created_at",
    )
    .bind(&email)
    .bind(first_name)
    .bind(last_name)
    .bind(&password_hash)
    .bind(new_user.role.as_str())
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            DbError::DuplicateEmail
        } else {
            DbError::Sqlx(e)
        }
    })?;

    tracing::info!(user_id = row.id, role = %row.role, "user registered");
    Ok(row)
}

/// Returns the account with this email (case-insensitive), if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, first_name, last_name, role, created_at \
         FROM users \
         WHERE email = $1",
    )
    .bind(email.trim().to_lowercase())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Verifies credentials and issues a bearer token valid for `ttl_hours`.
///
/// Unknown emails and wrong passwords are indistinguishable to the caller.
///
/// # Errors
///
/// Returns [`DbError::InvalidCredentials`] on a failed check and
/// [`DbError::Sqlx`] if a query fails.
pub async fn login(
    pool: &PgPool,
    email: &str,
    password: &str,
    ttl_hours: u32,
) -> Result<IssuedToken, DbError> {
    let credentials = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, password_hash FROM users WHERE email = $1",
    )
    .bind(email.trim().to_lowercase())
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::InvalidCredentials)?;

    verify_password(password, &credentials.password_hash)?;

    let token = generate_token();
    let ttl = i32::try_from(ttl_hours)
        .map_err(|_| DbError::InvalidInput(format!("token ttl {ttl_hours}h is too large")))?;

    let expires_at: DateTime<Utc> = sqlx::query_scalar(
        "INSERT INTO auth_tokens (user_id, token_hash, expires_at) \
         VALUES ($1, $2, NOW() + make_interval(hours => $3)) \
         RETURNING expires_at",
    )
    .bind(credentials.id)
    .bind(hash_token(&token))
    .bind(ttl)
    .fetch_one(pool)
    .await?;

    tracing::info!(user_id = credentials.id, "issued auth token");

    Ok(IssuedToken {
        token,
        user_id: credentials.id,
        expires_at,
    })
}

/// Resolves a raw bearer token to the caller it was issued for.
///
/// Returns `None` for unknown or expired tokens.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidInput`]
/// if the stored role is unknown.
pub async fn authenticate_token(pool: &PgPool, token: &str) -> Result<Option<Caller>, DbError> {
    let owner = sqlx::query_as::<_, TokenOwnerRow>(
        "SELECT u.id AS user_id, u.role \
         FROM auth_tokens t \
         JOIN users u ON u.id = t.user_id \
         WHERE t.token_hash = $1 AND t.expires_at > NOW()",
    )
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await?;

    match owner {
        Some(o) => Ok(Some(Caller::new(o.user_id, o.role.parse::<UserRole>()?))),
        None => Ok(None),
    }
}

/// Deletes a token. Returns `true` if it existed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn revoke_token(pool: &PgPool, token: &str) -> Result<bool, DbError> {
    let rows = sqlx::query("DELETE FROM auth_tokens WHERE token_hash = $1")
        .bind(hash_token(token))
        .execute(pool)
        .await?
        .rows_affected();
    Ok(rows > 0)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn normalize_email(raw: &str) -> Result<String, DbError> {
    let email = raw.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !domain.contains('@')
        })
        && !email.contains(char::is_whitespace);

    if valid {
        Ok(email)
    } else {
        Err(DbError::InvalidInput(format!("invalid email address '{raw}'")))
    }
}

fn non_blank<'a>(field: &str, value: &'a str) -> Result<&'a str, DbError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(DbError::InvalidInput(format!("{field} must be non-empty")))
    } else {
        Ok(trimmed)
    }
}

fn validate_password(password: &str) -> Result<(), DbError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(DbError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, DbError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| DbError::PasswordHash)
}

fn verify_password(password: &str, hash: &str) -> Result<(), DbError> {
    let parsed = PasswordHash::new(hash).map_err(|_| DbError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| DbError::InvalidCredentials)
}

fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_lowercases_and_trims() {
        assert_eq!(
            normalize_email("  Buyer@Example.COM ").unwrap(),
            "buyer@example.com"
        );
    }

    #[test]
    fn normalize_email_rejects_malformed_addresses() {
        for bad in ["", "no-at-sign", "@example.com", "a@nodot", "a@.com", "a b@x.io"] {
            assert!(normalize_email(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("battery staple", &hash),
            Err(DbError::InvalidCredentials)
        ));
    }

    #[test]
    fn generated_tokens_are_hex_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn token_hash_is_stable_sha256_hex() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_eq!(hash_token("abc").len(), 64);
        assert_ne!(hash_token("abc"), "abc");
    }
}
