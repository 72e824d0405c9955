//! Authorization policy
//!
//! Every access decision in the system goes through one of these functions.
//! They are pure: no I/O, no side effects, and the role they check is the
//! one loaded from the store, never one supplied by the client.

use crate::auth::Actor;
use crate::db::models::{Paper, User};
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Administrative actions on a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Promote,
    Demote,
    Ban,
    Unban,
    Delete,
}

impl ModerationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationAction::Promote => "promote",
            ModerationAction::Demote => "demote",
            ModerationAction::Ban => "ban",
            ModerationAction::Unban => "unban",
            ModerationAction::Delete => "delete",
        }
    }
}

/// Any logged-in actor may view any paper
pub fn can_view(actor: &Actor, _paper: &Paper) -> bool {
    actor.is_authenticated()
}

/// Any logged-in actor may browse the catalog
pub fn can_browse(actor: &Actor) -> bool {
    actor.is_authenticated()
}

pub fn can_upload(actor: &Actor) -> bool {
    actor.user().is_some_and(|u| !u.banned)
}

/// Owners may delete their own papers; admins may delete any
pub fn can_delete_paper(actor: &Actor, paper: &Paper) -> bool {
    actor
        .user()
        .is_some_and(|u| u.id == paper.user_id || u.is_admin())
}

/// Admins may moderate anyone but themselves, and may not ban another admin
pub fn can_moderate_user(actor: &Actor, target: &User, action: ModerationAction) -> bool {
    let Some(admin) = actor.user().filter(|u| u.is_admin()) else {
        return false;
    };

    if admin.id == target.id {
        return false;
    }

    match action {
        ModerationAction::Ban => !target.is_admin(),
        ModerationAction::Promote
        | ModerationAction::Demote
        | ModerationAction::Unban
        | ModerationAction::Delete => true,
    }
}

/// Admin dashboards and listings
pub fn can_administer(actor: &Actor) -> bool {
    actor.user().is_some_and(|u| u.is_admin())
}

/// Turn a denied decision into `Forbidden`
pub fn require(allowed: bool, message: &str) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(AppError::forbidden(message))
    }
}
