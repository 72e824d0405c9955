//! Account workflows: registration, bootstrap admin and password reset

use crate::auth::IdentityProvider;
use crate::config::BootstrapAdmin;
use crate::db::models::{Role, User};
use crate::db::{CredentialStore, NewUser};
use crate::errors::{AppError, Result};
use crate::mail::Mailer;
use crate::metrics;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

/// Registration form
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(min = 3, max = 80, message = "Username must be 3-80 characters"))]
    pub username: String,

    #[validate(
        email(message = "Email address is not valid"),
        length(max = 120, message = "Email must be at most 120 characters")
    )]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
struct NewPassword {
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    password: String,
}

#[derive(Clone)]
pub struct AccountService {
    credentials: CredentialStore,
    identity: IdentityProvider,
    mailer: Arc<dyn Mailer>,
}

impl AccountService {
    pub fn new(
        credentials: CredentialStore,
        identity: IdentityProvider,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self { credentials, identity, mailer }
    }

    /// Create a regular user account
    pub async fn register(&self, registration: Registration) -> Result<User> {
        let registration = Registration {
            username: registration.username.trim().to_string(),
            email: registration.email.trim().to_string(),
            password: registration.password,
        };
        registration.validate()?;

        let password_hash = self.identity.hasher().hash(&registration.password).await?;

        let user = self
            .credentials
            .create(NewUser {
                username: registration.username,
                email: registration.email,
                password_hash,
                role: Role::User,
            })
            .await?;

        metrics::record_registration();
        info!(user_id = user.id, username = %user.username, "Account registered");
        Ok(user)
    }

    /// Create the configured admin account if the system has no admin yet.
    /// An existing account with the same email is promoted instead.
    pub async fn ensure_bootstrap_admin(
        &self,
        bootstrap: Option<&BootstrapAdmin>,
    ) -> Result<Option<User>> {
        let Some(bootstrap) = bootstrap else {
            return Ok(None);
        };

        if self.credentials.count_admins().await? > 0 {
            debug!("Admin account present, skipping bootstrap");
            return Ok(None);
        }

        if let Some(existing) = self.credentials.find_by_email(&bootstrap.email).await? {
            let user = self.credentials.set_role(existing.id, Role::Admin).await?;
            info!(user_id = user.id, "Existing account promoted to bootstrap admin");
            return Ok(Some(user));
        }

        let password_hash = self.identity.hasher().hash(&bootstrap.password).await?;
        let user = self
            .credentials
            .create(NewUser {
                username: bootstrap.username.clone(),
                email: bootstrap.email.clone(),
                password_hash,
                role: Role::Admin,
            })
            .await?;

        info!(user_id = user.id, "Bootstrap admin created");
        Ok(Some(user))
    }

    /// Start a password reset. Succeeds whether or not the email belongs to
    /// an account, so callers learn nothing about registrations.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let Some(user) = self.credentials.find_by_email(email).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(());
        };

        if user.banned {
            warn!(user_id = user.id, "Password reset requested for banned account");
            return Ok(());
        }

        let token = self.identity.issue_reset_token(&user).await?;
        self.mailer.send_password_reset(&user, &token).await?;

        metrics::record_password_reset("requested");
        Ok(())
    }

    /// Finish a password reset with the mailed token
    pub async fn complete_password_reset(&self, token: &str, new_password: &str) -> Result<User> {
        NewPassword { password: new_password.to_string() }.validate()?;

        if token.trim().is_empty() {
            return Err(AppError::ResetTokenInvalid);
        }

        let user = self.identity.reset_password(token.trim(), new_password).await?;
        metrics::record_password_reset("completed");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(username: &str, email: &str, password: &str) -> Registration {
        Registration {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_registration_validation() {
        assert!(registration("alice", "alice@example.com", "correct horse").validate().is_ok());
        assert!(registration("al", "alice@example.com", "correct horse").validate().is_err());
        assert!(registration("alice", "not-an-email", "correct horse").validate().is_err());
        assert!(registration("alice", "alice@example.com", "short").validate().is_err());
    }

    #[test]
    fn test_validation_error_names_field() {
        let err: AppError = registration("alice", "nope", "correct horse")
            .validate()
            .unwrap_err()
            .into();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("email")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
