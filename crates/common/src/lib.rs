//! PaperVault Common Library
//!
//! Core of the past-paper catalog shared by the gateway and its tests:
//! - Configuration management
//! - Error taxonomy and HTTP mapping
//! - Database entities, credential store and paper catalog
//! - Password hashing, sessions and the authorization policy
//! - Filesystem-backed file store
//! - Account, paper and moderation workflows
//! - Metrics

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod mail;
pub mod metrics;
pub mod services;
pub mod storage;

// Re-export commonly used types
pub use auth::{Actor, IdentityProvider};
pub use config::AppConfig;
pub use db::{CredentialStore, DbPool, PaperCatalog};
pub use errors::{AppError, Result};
pub use storage::FileStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default page size for paginated listings
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Upper bound on any requested page size
pub const MAX_PAGE_SIZE: u64 = 100;
