//! Credential store: persisted user records
//!
//! Uniqueness of username and email is enforced by the database's unique
//! indexes. Violations surface as `DuplicateIdentity`, never as raw
//! constraint errors.

use crate::db::models::*;
use crate::db::{unique_violation, DbPool};
use crate::errors::{AppError, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};

/// Fields needed to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Emails are compared case-insensitively everywhere
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Repository for user records
#[derive(Clone)]
pub struct CredentialStore {
    pool: DbPool,
}

impl CredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    /// Create a user. Fails with `DuplicateIdentity` if the username or
    /// email is taken; the check and the insert are one atomic statement.
    pub async fn create(&self, new_user: NewUser) -> Result<User> {
        let now = chrono::Utc::now();

        let user = UserActiveModel {
            username: Set(new_user.username.trim().to_string()),
            email: Set(normalize_email(&new_user.email)),
            password_hash: Set(new_user.password_hash),
            role: Set(new_user.role),
            banned: Set(false),
            created_at: Set(now.into()),
            ..Default::default()
        };

        user.insert(self.conn()).await.map_err(map_duplicate)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by email (case-insensitive)
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(normalize_email(email)))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by exact username
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Username.eq(username.trim()))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Fetch a user or fail with `NotFound`
    pub async fn get(&self, id: i64) -> Result<User> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::user_not_found(id))
    }

    /// List users ordered by id, 1-based pages
    pub async fn list(&self, page: u64, page_size: u64) -> Result<(Vec<User>, u64)> {
        let (page, page_size) = super::catalog::clamp_page(page, page_size);

        let paginator = UserEntity::find()
            .order_by_asc(UserColumn::Id)
            .paginate(self.conn(), page_size);

        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page - 1).await?;

        Ok((users, total))
    }

    /// Number of admin accounts
    pub async fn count_admins(&self) -> Result<u64> {
        UserEntity::find()
            .filter(UserColumn::Role.eq(Role::Admin))
            .count(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn set_role(&self, id: i64, role: Role) -> Result<User> {
        set_role_in(self.conn(), id, role).await
    }

    pub async fn set_banned(&self, id: i64, banned: bool) -> Result<User> {
        set_banned_in(self.conn(), id, banned).await
    }

    pub async fn set_password_hash(&self, id: i64, password_hash: String) -> Result<User> {
        set_password_hash_in(self.conn(), id, password_hash).await
    }

    /// Delete a user row. Papers must already be gone.
    pub async fn delete(&self, id: i64) -> Result<()> {
        delete_in(self.conn(), id).await
    }
}

// ============================================================================
// Connection-generic helpers, usable inside a transaction
// ============================================================================

async fn load_active<C: ConnectionTrait>(conn: &C, id: i64) -> Result<UserActiveModel> {
    UserEntity::find_by_id(id)
        .one(conn)
        .await?
        .map(Into::into)
        .ok_or_else(|| AppError::user_not_found(id))
}

pub(crate) async fn set_role_in<C: ConnectionTrait>(conn: &C, id: i64, role: Role) -> Result<User> {
    let mut user = load_active(conn, id).await?;
    user.role = Set(role);
    user.update(conn).await.map_err(Into::into)
}

pub(crate) async fn set_banned_in<C: ConnectionTrait>(
    conn: &C,
    id: i64,
    banned: bool,
) -> Result<User> {
    let mut user = load_active(conn, id).await?;
    user.banned = Set(banned);
    user.update(conn).await.map_err(Into::into)
}

pub(crate) async fn set_password_hash_in<C: ConnectionTrait>(
    conn: &C,
    id: i64,
    password_hash: String,
) -> Result<User> {
    let mut user = load_active(conn, id).await?;
    user.password_hash = Set(password_hash);
    user.update(conn).await.map_err(Into::into)
}

pub(crate) async fn delete_in<C: ConnectionTrait>(conn: &C, id: i64) -> Result<()> {
    let result = UserEntity::delete_by_id(id).exec(conn).await?;
    if result.rows_affected == 0 {
        return Err(AppError::user_not_found(id));
    }
    Ok(())
}

fn map_duplicate(err: DbErr) -> AppError {
    match unique_violation(&err) {
        Some(detail) => {
            let field = if detail.contains("email") {
                "email"
            } else if detail.contains("username") {
                "username"
            } else {
                "identity"
            };
            AppError::DuplicateIdentity { field: field.to_string() }
        }
        None => err.into(),
    }
}
