//! Caller identity and the closed vocabularies attached to user accounts.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Account role. Every account is exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Shop accounts upload catalogs.
    Shop,
    /// Regular customers: browse, fill a cart, confirm orders.
    #[default]
    Buyer,
}

impl UserRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Shop => "shop",
            UserRole::Buyer => "buyer",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shop" => Ok(UserRole::Shop),
            "buyer" => Ok(UserRole::Buyer),
            other => Err(CoreError::InvalidRole(other.to_string())),
        }
    }
}

/// The authenticated identity on whose behalf an operation runs.
///
/// Store operations take this explicitly instead of reading any ambient
/// request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub role: UserRole,
}

impl Caller {
    #[must_use]
    pub fn new(user_id: i64, role: UserRole) -> Self {
        Self { user_id, role }
    }

    /// Succeeds only for shop accounts.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Forbidden`] for any other role.
    pub fn require_shop(&self) -> Result<(), CoreError> {
        match self.role {
            UserRole::Shop => Ok(()),
            UserRole::Buyer => Err(CoreError::Forbidden("only shops can upload products")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Email,
    Phone,
}

impl ContactKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContactKind::Email => "email",
            ContactKind::Phone => "phone",
        }
    }
}

impl std::fmt::Display for ContactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(ContactKind::Email),
            "phone" => Ok(ContactKind::Phone),
            other => Err(CoreError::InvalidContactKind(other.to_string())),
        }
    }
}
