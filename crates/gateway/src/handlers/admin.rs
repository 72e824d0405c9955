//! Admin dashboard handlers
//!
//! `RequireAdmin` gates every route; the moderation workflows check the
//! policy again against the stored account.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::papers::DeletePaperResponse;
use super::{PageParams, PageResponse, PaperResponse, UserResponse};
use crate::AppState;
use papervault_common::{
    auth::RequireAdmin,
    errors::Result,
    services::{CascadeReport, ModerationOutcome},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct ModerationResponse {
    pub outcome: String,
    pub user: UserResponse,
}

impl From<ModerationOutcome> for ModerationResponse {
    fn from(outcome: ModerationOutcome) -> Self {
        match outcome {
            ModerationOutcome::Applied(user) => Self {
                outcome: "applied".to_string(),
                user: user.into(),
            },
            ModerationOutcome::Unchanged(user) => Self {
                outcome: "unchanged".to_string(),
                user: user.into(),
            },
        }
    }
}

pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<UserResponse>>> {
    let page = state
        .services
        .moderation
        .list_users(admin.id, params.page(), params.per_page())
        .await?;
    Ok(Json(PageResponse::from_page(page)))
}

pub async fn list_papers(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<PaperResponse>>> {
    let page = state
        .services
        .moderation
        .list_papers(admin.id, params.page(), params.per_page())
        .await?;
    Ok(Json(PageResponse::from_page(page)))
}

pub async fn promote(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<Json<ModerationResponse>> {
    let outcome = state.services.moderation.promote(admin.id, id).await?;
    Ok(Json(outcome.into()))
}

pub async fn demote(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<Json<ModerationResponse>> {
    let outcome = state.services.moderation.demote(admin.id, id).await?;
    Ok(Json(outcome.into()))
}

pub async fn ban(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<Json<ModerationResponse>> {
    let outcome = state.services.moderation.ban(admin.id, id).await?;
    Ok(Json(outcome.into()))
}

pub async fn unban(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<Json<ModerationResponse>> {
    let outcome = state.services.moderation.unban(admin.id, id).await?;
    Ok(Json(outcome.into()))
}

/// Delete a user and everything they own
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<Json<CascadeReport>> {
    let report = state.services.moderation.delete_user(admin.id, id).await?;
    Ok(Json(report))
}

pub async fn delete_paper(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<Json<DeletePaperResponse>> {
    let deleted = state.services.moderation.delete_paper(admin.id, id).await?;
    Ok(Json(DeletePaperResponse {
        id: deleted.paper.id,
        file_removed: deleted.file_removed,
    }))
}
