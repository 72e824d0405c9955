//! Authentication and authorization utilities
//!
//! Provides:
//! - Password hashing (argon2id)
//! - Opaque session and reset tokens
//! - The identity provider resolving tokens to actors
//! - The authorization policy
//! - Actor extraction for axum handlers

pub mod identity;
pub mod password;
pub mod policy;
pub mod tokens;

pub use identity::{IdentityProvider, SessionToken};
pub use password::CredentialHasher;
pub use policy::ModerationAction;

use crate::db::models::User;
use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};

/// Who is making a request
#[derive(Debug, Clone)]
pub enum Actor {
    Anonymous,
    Authenticated(User),
}

impl Actor {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Actor::Authenticated(user) => Some(user),
            Actor::Anonymous => None,
        }
    }

    /// The authenticated user, or `Unauthorized`
    pub fn require_user(&self) -> Result<&User> {
        self.user().ok_or(AppError::Unauthorized)
    }
}

/// Session token carried by a request: the session cookie first, then a
/// `Bearer` Authorization header.
pub fn request_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| tokens::parse_cookie(v, cookie_name))
        .filter(|t| !t.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(tokens::extract_bearer)
    })
}

/// Axum extractor for Actor. Never rejects for a missing or stale token;
/// such requests are anonymous.
impl<S> FromRequestParts<S> for Actor
where
    IdentityProvider: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        if let Some(actor) = parts.extensions.get::<Actor>() {
            return Ok(actor.clone());
        }

        let identity = IdentityProvider::from_ref(state);
        let token = request_token(&parts.headers, identity.cookie_name()).map(str::to_string);
        let actor = identity.current_actor(token.as_deref()).await?;

        parts.extensions.insert(actor.clone());
        Ok(actor)
    }
}

/// A logged-in, non-banned user
#[derive(Debug, Clone)]
pub struct RequireUser(pub User);

impl<S> FromRequestParts<S> for RequireUser
where
    IdentityProvider: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        match Actor::from_request_parts(parts, state).await? {
            Actor::Authenticated(user) => Ok(RequireUser(user)),
            Actor::Anonymous => Err(AppError::Unauthorized),
        }
    }
}

/// A logged-in admin
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub User);

impl<S> FromRequestParts<S> for RequireAdmin
where
    IdentityProvider: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let actor = Actor::from_request_parts(parts, state).await?;
        actor.require_user()?;
        policy::require(policy::can_administer(&actor), "Admin access required")?;

        match actor {
            Actor::Authenticated(user) => Ok(RequireAdmin(user)),
            Actor::Anonymous => Err(AppError::Unauthorized),
        }
    }
}
