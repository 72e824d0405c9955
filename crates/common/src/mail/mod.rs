//! Outbound mail seam
//!
//! Delivering mail is outside this system; the workflows only hand a
//! message to a [`Mailer`].

use crate::db::models::User;
use crate::errors::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a password reset token to the user's address
    async fn send_password_reset(&self, user: &User, token: &str) -> Result<()>;
}

/// Records deliveries in the log instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, user: &User, token: &str) -> Result<()> {
        info!(user_id = user.id, to = %user.email, "Password reset mail queued");
        debug!(user_id = user.id, token, "Password reset token");
        Ok(())
    }
}

/// Keeps every delivery in memory; used by tests to read tokens back
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent token sent to `email`
    pub fn last_token_for(&self, email: &str) -> Option<String> {
        let sent = self.sent.lock().ok()?;
        sent.iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send_password_reset(&self, user: &User, token: &str) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((user.email.clone(), token.to_string()));
        }
        Ok(())
    }
}
