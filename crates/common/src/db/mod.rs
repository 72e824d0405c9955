//! Database layer for PaperVault
//!
//! Provides:
//! - SeaORM entity models
//! - Credential store (users), paper catalog and session store
//! - Connection pool management
//! - Schema bootstrap for fresh databases

pub mod models;
pub(crate) mod catalog;
pub(crate) mod credentials;
pub(crate) mod sessions;

pub use catalog::{Page, PaperCatalog, PaperFilters, PaperMetadata};
pub use credentials::{normalize_email, CredentialStore, NewUser};
pub use sessions::SessionStore;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use models::*;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
    SqlErr,
};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!(backend = ?conn.get_database_backend(), "Database connection established");

        let pool = Self { conn };
        if config.create_schema {
            pool.create_schema().await?;
        }
        Ok(pool)
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get the underlying connection
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Create missing tables and indexes from the entity definitions
    pub async fn create_schema(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        let schema = Schema::new(backend);

        // Parents before children so foreign keys resolve
        self.create_table(&schema, UserEntity).await?;
        self.create_table(&schema, PaperEntity).await?;
        self.create_table(&schema, SessionEntity).await?;
        self.create_table(&schema, ResetTokenEntity).await?;

        info!("Database schema ready");
        Ok(())
    }

    async fn create_table<E: EntityTrait>(&self, schema: &Schema, entity: E) -> Result<()> {
        let backend = self.conn.get_database_backend();

        let mut table = schema.create_table_from_entity(entity);
        table.if_not_exists();
        self.conn.execute(backend.build(&table)).await?;

        for mut index in schema.create_index_from_entity(entity) {
            index.if_not_exists();
            self.conn.execute(backend.build(&index)).await?;
        }
        Ok(())
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .ping()
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })
    }
}

/// Name of the unique column a constraint violation refers to, if any
pub(crate) fn unique_violation(err: &DbErr) -> Option<String> {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => Some(detail),
        _ => None,
    }
}
