//! Moderation workflows
//!
//! Every operation reloads the acting user from the store and checks the
//! authorization policy before touching the target. Multi-row changes run
//! in one transaction; file removal happens after commit and is
//! best-effort.

use crate::auth::policy::{self, ModerationAction};
use crate::auth::Actor;
use crate::db::models::{Paper, Role, User};
use crate::db::{catalog, credentials, sessions, CredentialStore, DbPool, Page, PaperCatalog};
use crate::errors::{AppError, ErrorCode, Result};
use crate::metrics;
use crate::storage::FileStore;
use sea_orm::TransactionTrait;
use serde::Serialize;
use tracing::{error, info, warn};

/// Result of a role or ban change
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "user", rename_all = "snake_case")]
pub enum ModerationOutcome {
    /// The target changed
    Applied(User),
    /// The target already had the requested state
    Unchanged(User),
}

impl ModerationOutcome {
    pub fn user(&self) -> &User {
        match self {
            ModerationOutcome::Applied(user) | ModerationOutcome::Unchanged(user) => user,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ModerationOutcome::Applied(_))
    }
}

/// A stored file that survived the deletion of its paper row
#[derive(Debug, Clone, Serialize)]
pub struct PartialCascadeFailure {
    pub paper_id: i64,
    pub file_path: String,
    pub reason: String,
}

impl PartialCascadeFailure {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::PartialCascadeFailure
    }
}

/// Outcome of deleting a user together with everything they own
#[derive(Debug, Clone, Serialize)]
pub struct CascadeReport {
    pub user_id: i64,
    pub papers_deleted: u64,
    pub sessions_revoked: u64,
    pub files_removed: usize,
    pub failures: Vec<PartialCascadeFailure>,
}

impl CascadeReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of deleting one paper
#[derive(Debug, Clone, Serialize)]
pub struct PaperDeletion {
    pub paper: Paper,
    pub file_removed: bool,
}

#[derive(Clone)]
pub struct ModerationService {
    pool: DbPool,
    credentials: CredentialStore,
    catalog: PaperCatalog,
    files: FileStore,
}

/// A stored user as an actor; banned users act as nobody
fn as_actor(user: User) -> Actor {
    if user.banned {
        Actor::Anonymous
    } else {
        Actor::Authenticated(user)
    }
}

impl ModerationService {
    pub fn new(
        pool: DbPool,
        credentials: CredentialStore,
        catalog: PaperCatalog,
        files: FileStore,
    ) -> Self {
        Self { pool, credentials, catalog, files }
    }

    async fn load_actor(&self, actor_id: i64) -> Result<Actor> {
        Ok(self
            .credentials
            .find_by_id(actor_id)
            .await?
            .map(as_actor)
            .unwrap_or(Actor::Anonymous))
    }

    /// The acting admin, checked before any target lookup
    async fn load_admin(&self, actor_id: i64) -> Result<Actor> {
        let actor = self.load_actor(actor_id).await?;
        policy::require(policy::can_administer(&actor), "Admin access required")?;
        Ok(actor)
    }

    /// Load the target and check the policy for `action`
    async fn authorize(
        &self,
        actor_id: i64,
        target_id: i64,
        action: ModerationAction,
    ) -> Result<User> {
        let actor = self.load_admin(actor_id).await?;
        let target = self.credentials.get(target_id).await?;

        if !policy::can_moderate_user(&actor, &target, action) {
            warn!(
                actor_id,
                target_id,
                action = action.as_str(),
                "Moderation denied by policy"
            );
            return Err(AppError::forbidden(format!(
                "Not permitted to {} this user",
                action.as_str()
            )));
        }
        Ok(target)
    }

    fn applied(&self, actor_id: i64, action: ModerationAction, user: User) -> ModerationOutcome {
        metrics::record_moderation(action.as_str());
        info!(actor_id, target_id = user.id, action = action.as_str(), "Moderation applied");
        ModerationOutcome::Applied(user)
    }

    pub async fn promote(&self, actor_id: i64, target_id: i64) -> Result<ModerationOutcome> {
        let target = self.authorize(actor_id, target_id, ModerationAction::Promote).await?;
        if target.is_admin() {
            return Ok(ModerationOutcome::Unchanged(target));
        }

        let user = self.credentials.set_role(target.id, Role::Admin).await?;
        Ok(self.applied(actor_id, ModerationAction::Promote, user))
    }

    pub async fn demote(&self, actor_id: i64, target_id: i64) -> Result<ModerationOutcome> {
        let target = self.authorize(actor_id, target_id, ModerationAction::Demote).await?;
        if !target.is_admin() {
            return Ok(ModerationOutcome::Unchanged(target));
        }

        let user = self.credentials.set_role(target.id, Role::User).await?;
        Ok(self.applied(actor_id, ModerationAction::Demote, user))
    }

    /// Ban a user and revoke every session they hold
    pub async fn ban(&self, actor_id: i64, target_id: i64) -> Result<ModerationOutcome> {
        let target = self.authorize(actor_id, target_id, ModerationAction::Ban).await?;
        if target.banned {
            return Ok(ModerationOutcome::Unchanged(target));
        }

        let txn = self.pool.conn().begin().await?;
        let user = credentials::set_banned_in(&txn, target.id, true).await?;
        let revoked = sessions::delete_sessions_for_user_in(&txn, target.id).await?;
        txn.commit().await?;

        info!(target_id, revoked_sessions = revoked, "Sessions revoked by ban");
        Ok(self.applied(actor_id, ModerationAction::Ban, user))
    }

    pub async fn unban(&self, actor_id: i64, target_id: i64) -> Result<ModerationOutcome> {
        let target = self.authorize(actor_id, target_id, ModerationAction::Unban).await?;
        if !target.banned {
            return Ok(ModerationOutcome::Unchanged(target));
        }

        let user = self.credentials.set_banned(target.id, false).await?;
        Ok(self.applied(actor_id, ModerationAction::Unban, user))
    }

    /// Delete a user with all their papers, sessions and reset tokens.
    /// Rows go in one transaction; files are removed afterwards and any
    /// that could not be removed are reported, not fatal.
    pub async fn delete_user(&self, actor_id: i64, target_id: i64) -> Result<CascadeReport> {
        let target = self.authorize(actor_id, target_id, ModerationAction::Delete).await?;

        let txn = self.pool.conn().begin().await?;
        let papers = catalog::list_owned_in(&txn, target.id).await?;
        let ids: Vec<i64> = papers.iter().map(|p| p.id).collect();
        let papers_deleted = catalog::delete_ids_in(&txn, &ids).await?;
        let sessions_revoked = sessions::delete_sessions_for_user_in(&txn, target.id).await?;
        sessions::delete_reset_tokens_for_user_in(&txn, target.id).await?;
        credentials::delete_in(&txn, target.id).await?;
        txn.commit().await?;

        let mut files_removed = 0;
        let mut failures = Vec::new();

        for paper in &papers {
            let reason = match self.files.remove(&paper.file_path).await {
                Ok(true) => {
                    files_removed += 1;
                    continue;
                }
                Ok(false) => "file missing from store".to_string(),
                Err(e) => e.to_string(),
            };

            error!(
                user_id = target.id,
                paper_id = paper.id,
                file_path = %paper.file_path,
                reason = %reason,
                "File removal failed during cascade delete"
            );
            failures.push(PartialCascadeFailure {
                paper_id: paper.id,
                file_path: paper.file_path.clone(),
                reason,
            });
        }

        metrics::record_moderation(ModerationAction::Delete.as_str());
        metrics::record_cascade_failures(failures.len());
        info!(
            actor_id,
            target_id,
            papers_deleted,
            files_removed,
            failures = failures.len(),
            "User deleted"
        );

        Ok(CascadeReport {
            user_id: target.id,
            papers_deleted,
            sessions_revoked,
            files_removed,
            failures,
        })
    }

    /// Delete a paper as its owner or an admin. The file is removed
    /// best-effort first; the row goes regardless.
    pub async fn delete_paper(&self, actor_id: i64, paper_id: i64) -> Result<PaperDeletion> {
        let actor = self.load_actor(actor_id).await?;
        actor.require_user()?;

        let paper = self.catalog.get(paper_id).await?;
        policy::require(
            policy::can_delete_paper(&actor, &paper),
            "Only the owner or an admin may delete this paper",
        )?;

        let file_removed = match self.files.remove(&paper.file_path).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(paper_id, file_path = %paper.file_path, "Stored file already missing");
                false
            }
            Err(e) => {
                warn!(paper_id, file_path = %paper.file_path, error = %e, "Failed to remove stored file");
                false
            }
        };

        self.catalog.delete(paper.id).await?;

        info!(actor_id, paper_id, file_removed, "Paper deleted");
        Ok(PaperDeletion { paper, file_removed })
    }

    /// Every user, for the admin dashboard
    pub async fn list_users(&self, actor_id: i64, page: u64, page_size: u64) -> Result<Page<User>> {
        self.load_admin(actor_id).await?;
        let (page, page_size) = catalog::clamp_page(page, page_size);
        let (items, total) = self.credentials.list(page, page_size).await?;
        Ok(Page { items, total, page, page_size })
    }

    /// Every paper, for the admin dashboard
    pub async fn list_papers(
        &self,
        actor_id: i64,
        page: u64,
        page_size: u64,
    ) -> Result<Page<Paper>> {
        self.load_admin(actor_id).await?;
        self.catalog.list_all(page, page_size).await
    }
}
