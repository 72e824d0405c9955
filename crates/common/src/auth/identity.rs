//! Session / identity provider
//!
//! Authenticates credentials, issues and resolves session tokens, and runs
//! the password-reset token lifecycle.

use crate::auth::password::CredentialHasher;
use crate::auth::tokens::{generate_token, hash_token, RESET_PREFIX, SESSION_PREFIX};
use crate::auth::Actor;
use crate::config::AuthConfig;
use crate::db::models::{User, UserEntity};
use crate::db::{credentials, sessions, CredentialStore, DbPool, SessionStore};
use crate::errors::{AppError, Result};
use crate::metrics;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ConnectionTrait, EntityTrait, TransactionTrait};
use tracing::{debug, info, warn};

/// A freshly issued session token. The plaintext is only ever held here
/// and by the client.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub max_age_secs: u64,
}

/// Configured lifetimes, checked once so issuing a token cannot overflow
#[derive(Debug, Clone, Copy)]
struct Lifetimes {
    session: Duration,
    remember: Duration,
    reset: Duration,
}

/// A lifetime in seconds that chrono can represent and add to the current time
fn lifetime(name: &str, secs: u64) -> Result<Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
        .ok_or_else(|| AppError::Configuration {
            message: format!("auth.{} of {} seconds is out of range", name, secs),
        })
}

#[derive(Clone)]
pub struct IdentityProvider {
    pool: DbPool,
    credentials: CredentialStore,
    sessions: SessionStore,
    hasher: CredentialHasher,
    config: AuthConfig,
    lifetimes: Lifetimes,
}

impl IdentityProvider {
    pub fn new(pool: DbPool, hasher: CredentialHasher, config: AuthConfig) -> Result<Self> {
        let lifetimes = Lifetimes {
            session: lifetime("session_ttl_secs", config.session_ttl_secs)?,
            remember: lifetime("remember_ttl_secs", config.remember_ttl_secs)?,
            reset: lifetime("reset_token_ttl_secs", config.reset_token_ttl_secs)?,
        };

        Ok(Self {
            credentials: CredentialStore::new(pool.clone()),
            sessions: SessionStore::new(pool.clone()),
            pool,
            hasher,
            config,
            lifetimes,
        })
    }

    pub fn hasher(&self) -> &CredentialHasher {
        &self.hasher
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.session_cookie
    }

    /// Check credentials. Unknown email and wrong password are the same
    /// failure; a correct password on a banned account is `Banned`.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let Some(user) = self.credentials.find_by_email(email).await? else {
            self.hasher.verify_decoy(password).await?;
            metrics::record_login("invalid");
            return Err(AppError::InvalidCredentials);
        };

        if !self.hasher.verify(&user.password_hash, password).await? {
            metrics::record_login("invalid");
            return Err(AppError::InvalidCredentials);
        }

        if user.banned {
            warn!(user_id = user.id, "Login refused for banned account");
            metrics::record_login("banned");
            return Err(AppError::Banned);
        }

        metrics::record_login("success");
        Ok(user)
    }

    /// Authenticate and open a session. Nothing is written on failure.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<(User, SessionToken)> {
        let user = self.authenticate(email, password).await?;

        let (ttl, ttl_secs) = if remember {
            (self.lifetimes.remember, self.config.remember_ttl_secs)
        } else {
            (self.lifetimes.session, self.config.session_ttl_secs)
        };

        let token = generate_token(SESSION_PREFIX);
        let session = self
            .sessions
            .create_session(hash_token(&token), user.id, remember, ttl)
            .await?;

        info!(user_id = user.id, remember, "Session opened");

        Ok((
            user,
            SessionToken {
                token,
                expires_at: session.expires_at.with_timezone(&Utc),
                max_age_secs: ttl_secs,
            },
        ))
    }

    /// Resolve a session token to an actor. Anything that does not lead to
    /// a live session of a non-banned user is anonymous.
    pub async fn current_actor(&self, token: Option<&str>) -> Result<Actor> {
        let Some(token) = token else {
            return Ok(Actor::Anonymous);
        };

        let token_hash = hash_token(token);
        let Some(session) = self.sessions.find_session(&token_hash).await? else {
            return Ok(Actor::Anonymous);
        };

        if session.is_expired() {
            debug!(user_id = session.user_id, "Dropping expired session");
            self.sessions.delete_session(&token_hash).await?;
            return Ok(Actor::Anonymous);
        }

        match self.credentials.find_by_id(session.user_id).await? {
            Some(user) if !user.banned => Ok(Actor::Authenticated(user)),
            _ => Ok(Actor::Anonymous),
        }
    }

    /// Invalidate a session token. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<()> {
        if self.sessions.delete_session(&hash_token(token)).await? {
            info!("Session closed");
        }
        Ok(())
    }

    /// Remove expired sessions
    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        self.sessions.purge_expired().await
    }

    // ========================================================================
    // Password reset
    // ========================================================================

    /// Issue a single-use, time-limited reset token for a user
    pub async fn issue_reset_token(&self, user: &User) -> Result<String> {
        let token = generate_token(RESET_PREFIX);
        self.sessions
            .create_reset_token(hash_token(&token), user.id, self.lifetimes.reset)
            .await?;

        info!(user_id = user.id, "Password reset token issued");
        Ok(token)
    }

    /// Redeem a reset token, returning its user. A token redeems at most once.
    pub async fn consume_reset_token(&self, token: &str) -> Result<User> {
        let txn = self.pool.conn().begin().await?;
        let user = consume_in(&txn, token).await?;
        txn.commit().await?;
        Ok(user)
    }

    /// Redeem a reset token and set a new password. Every session of the
    /// user is revoked in the same transaction.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<User> {
        let password_hash = self.hasher.hash(new_password).await?;

        let txn = self.pool.conn().begin().await?;
        let user = consume_in(&txn, token).await?;
        let user = credentials::set_password_hash_in(&txn, user.id, password_hash).await?;
        let revoked = sessions::delete_sessions_for_user_in(&txn, user.id).await?;
        txn.commit().await?;

        info!(user_id = user.id, revoked_sessions = revoked, "Password reset");
        Ok(user)
    }
}

async fn consume_in<C: ConnectionTrait>(conn: &C, token: &str) -> Result<User> {
    let record = sessions::find_reset_token_in(conn, &hash_token(token))
        .await?
        .ok_or(AppError::ResetTokenInvalid)?;

    if record.used_at.is_some() {
        return Err(AppError::ResetTokenInvalid);
    }
    if record.is_expired() {
        return Err(AppError::ResetTokenExpired);
    }
    if !sessions::mark_reset_token_used_in(conn, record.id).await? {
        return Err(AppError::ResetTokenInvalid);
    }

    UserEntity::find_by_id(record.user_id)
        .one(conn)
        .await?
        .ok_or(AppError::ResetTokenInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifetime_accepts_defaults() {
        let config = AuthConfig::default();
        assert_eq!(
            lifetime("session_ttl_secs", config.session_ttl_secs).unwrap(),
            Duration::seconds(config.session_ttl_secs as i64)
        );
        assert!(lifetime("remember_ttl_secs", config.remember_ttl_secs).is_ok());
        assert!(lifetime("reset_token_ttl_secs", 0).is_ok());
    }

    #[test]
    fn test_lifetime_rejects_unrepresentable_values() {
        for secs in [
            u64::MAX,
            i64::MAX as u64,
            (i64::MAX / 1000 + 1) as u64,
            400_000 * 365 * 86_400,
        ] {
            assert!(matches!(
                lifetime("session_ttl_secs", secs),
                Err(AppError::Configuration { .. })
            ));
        }
    }
}
