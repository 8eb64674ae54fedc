pub mod app_config;
pub mod catalog;
pub mod config;
pub mod identity;
pub mod orders;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use catalog::{
    load_import_document, parse_import_document, CatalogError, CategoryEntry, GoodEntry,
    ImportDocument,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use identity::{Caller, ContactKind, UserRole};
pub use orders::OrderStatus;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid user role: {0}")]
    InvalidRole(String),
    #[error("invalid order status: {0}")]
    InvalidOrderStatus(String),
    #[error("invalid contact type: {0}")]
    InvalidContactKind(String),
    #[error("{0}")]
    Forbidden(&'static str),
}
