//! Application workflows
//!
//! [`AppServices`] builds every component once at startup and hands out
//! clones; nothing here is a global.

pub mod accounts;
pub mod moderation;
pub mod papers;

pub use accounts::{AccountService, Registration};
pub use moderation::{
    CascadeReport, ModerationOutcome, ModerationService, PaperDeletion, PartialCascadeFailure,
};
pub use papers::PaperService;

use crate::auth::{CredentialHasher, IdentityProvider};
use crate::config::AppConfig;
use crate::db::{CredentialStore, DbPool, PaperCatalog};
use crate::errors::Result;
use crate::mail::Mailer;
use crate::storage::FileStore;
use std::sync::Arc;

/// Every long-lived component of the application
#[derive(Clone)]
pub struct AppServices {
    pub pool: DbPool,
    pub files: FileStore,
    pub identity: IdentityProvider,
    pub accounts: AccountService,
    pub papers: PaperService,
    pub moderation: ModerationService,
}

impl AppServices {
    /// Connect to the database, open the file store and wire the workflows
    pub async fn build(config: &AppConfig, mailer: Arc<dyn Mailer>) -> Result<Self> {
        let pool = DbPool::new(&config.database).await?;
        let files = FileStore::new(&config.storage).await?;
        Self::from_parts(pool, files, config, mailer)
    }

    /// Wire the workflows over an existing pool and file store
    pub fn from_parts(
        pool: DbPool,
        files: FileStore,
        config: &AppConfig,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self> {
        let hasher = CredentialHasher::new(&config.auth.password_hash)?;
        let credentials = CredentialStore::new(pool.clone());
        let catalog = PaperCatalog::new(pool.clone());

        let identity = IdentityProvider::new(pool.clone(), hasher, config.auth.clone())?;
        let accounts = AccountService::new(credentials.clone(), identity.clone(), mailer);
        let papers = PaperService::new(catalog.clone(), files.clone());
        let moderation = ModerationService::new(pool.clone(), credentials, catalog, files.clone());

        Ok(Self {
            pool,
            files,
            identity,
            accounts,
            papers,
            moderation,
        })
    }
}
