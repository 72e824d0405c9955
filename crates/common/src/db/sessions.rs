//! Session and password-reset token persistence
//!
//! Both tables store only SHA-256 digests of the tokens handed to clients.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};

/// Repository for sessions and reset tokens
#[derive(Clone)]
pub struct SessionStore {
    pool: DbPool,
}

impl SessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    // ========================================================================
    // Session Operations
    // ========================================================================

    /// Record a new session under the digest of its token
    pub async fn create_session(
        &self,
        token_hash: String,
        user_id: i64,
        remember: bool,
        ttl: Duration,
    ) -> Result<Session> {
        let now = Utc::now();

        let session = SessionActiveModel {
            id: Set(token_hash),
            user_id: Set(user_id),
            remember: Set(remember),
            created_at: Set(now.into()),
            expires_at: Set((now + ttl).into()),
        };

        session.insert(self.conn()).await.map_err(Into::into)
    }

    /// Find session by token digest
    pub async fn find_session(&self, token_hash: &str) -> Result<Option<Session>> {
        SessionEntity::find_by_id(token_hash.to_string())
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Delete one session; returns whether it existed
    pub async fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let result = SessionEntity::delete_by_id(token_hash.to_string())
            .exec(self.conn())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Drop every expired session
    pub async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now().fixed_offset();
        let result = SessionEntity::delete_many()
            .filter(SessionColumn::ExpiresAt.lte(now))
            .exec(self.conn())
            .await?;
        Ok(result.rows_affected)
    }

    // ========================================================================
    // Reset Token Operations
    // ========================================================================

    pub async fn create_reset_token(
        &self,
        token_hash: String,
        user_id: i64,
        ttl: Duration,
    ) -> Result<ResetToken> {
        let now = Utc::now();

        let token = ResetTokenActiveModel {
            user_id: Set(user_id),
            token_hash: Set(token_hash),
            created_at: Set(now.into()),
            expires_at: Set((now + ttl).into()),
            used_at: Set(None),
            ..Default::default()
        };

        token.insert(self.conn()).await.map_err(Into::into)
    }
}

// ============================================================================
// Connection-generic helpers, usable inside a transaction
// ============================================================================

/// Revoke every session belonging to a user
pub(crate) async fn delete_sessions_for_user_in<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
) -> Result<u64> {
    let result = SessionEntity::delete_many()
        .filter(SessionColumn::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Remove every reset token belonging to a user
pub(crate) async fn delete_reset_tokens_for_user_in<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
) -> Result<u64> {
    let result = ResetTokenEntity::delete_many()
        .filter(ResetTokenColumn::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

pub(crate) async fn find_reset_token_in<C: ConnectionTrait>(
    conn: &C,
    token_hash: &str,
) -> Result<Option<ResetToken>> {
    ResetTokenEntity::find()
        .filter(ResetTokenColumn::TokenHash.eq(token_hash))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Mark a token used. Only succeeds for a token not yet used, so two
/// concurrent consumers cannot both win.
pub(crate) async fn mark_reset_token_used_in<C: ConnectionTrait>(conn: &C, id: i64) -> Result<bool> {
    let now = Utc::now().fixed_offset();
    let result = ResetTokenEntity::update_many()
        .col_expr(ResetTokenColumn::UsedAt, Expr::value(now))
        .filter(ResetTokenColumn::Id.eq(id))
        .filter(ResetTokenColumn::UsedAt.is_null())
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}
