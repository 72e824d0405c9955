//! Shared harness: a fresh SQLite database and upload directory per test

#![allow(dead_code)]

use futures::stream;
use papervault_common::config::{AppConfig, PasswordHashConfig};
use papervault_common::db::models::{Paper, Role, User};
use papervault_common::db::{CredentialStore, PaperMetadata};
use papervault_common::mail::MemoryMailer;
use papervault_common::services::{AppServices, Registration};
use papervault_common::Actor;
use std::convert::Infallible;
use std::sync::Arc;
use tempfile::TempDir;

pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub services: AppServices,
    pub mailer: MemoryMailer,
    pub config: AppConfig,
    pub credentials: CredentialStore,
    _dir: TempDir,
}

pub fn test_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    config.database.max_connections = 4;
    config.storage.upload_root = dir.path().join("uploads");
    config.storage.max_upload_bytes = 4096;
    config.auth.password_hash = PasswordHashConfig {
        memory_kib: 256,
        iterations: 1,
        parallelism: 1,
    };
    config
}

pub async fn spawn() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let mailer = MemoryMailer::new();
    let services = AppServices::build(&config, Arc::new(mailer.clone()))
        .await
        .unwrap();

    TestApp {
        credentials: CredentialStore::new(services.pool.clone()),
        services,
        mailer,
        config,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn register(&self, name: &str) -> User {
        self.services
            .accounts
            .register(Registration {
                username: name.to_string(),
                email: format!("{}@example.com", name),
                password: PASSWORD.to_string(),
            })
            .await
            .unwrap()
    }

    pub async fn admin(&self, name: &str) -> User {
        let user = self.register(name).await;
        self.credentials.set_role(user.id, Role::Admin).await.unwrap()
    }

    pub async fn reload(&self, user: &User) -> User {
        self.credentials.get(user.id).await.unwrap()
    }

    pub async fn upload(&self, owner: &User, title: &str, subject: &str, filename: &str, bytes: &[u8]) -> Paper {
        self.try_upload(owner, title, subject, None, filename, bytes)
            .await
            .unwrap()
    }

    pub async fn try_upload(
        &self,
        owner: &User,
        title: &str,
        subject: &str,
        year: Option<&str>,
        filename: &str,
        bytes: &[u8],
    ) -> papervault_common::Result<Paper> {
        let metadata = PaperMetadata {
            title: title.to_string(),
            subject: subject.to_string(),
            year: year.map(str::to_string),
        };
        self.services
            .papers
            .upload(&actor(owner), metadata, body(bytes), filename)
            .await
    }
}

pub fn actor(user: &User) -> Actor {
    Actor::Authenticated(user.clone())
}

/// An upload body split into small chunks
pub fn body(data: &[u8]) -> impl futures::Stream<Item = Result<Vec<u8>, Infallible>> {
    let chunks: Vec<_> = data.chunks(16).map(|c| Ok(c.to_vec())).collect();
    stream::iter(chunks)
}
