//! Paper catalog handlers

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::{PageParams, PageResponse, PaperResponse};
use crate::AppState;
use papervault_common::{
    auth::{Actor, RequireUser},
    db::{PaperFilters, PaperMetadata},
    errors::{AppError, Result},
};

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub year: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletePaperResponse {
    pub id: i64,
    pub file_removed: bool,
}

fn multipart_error(err: MultipartError, limit: u64) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::TooLarge { limit }
    } else {
        AppError::Validation {
            message: format!("malformed upload: {}", err.body_text()),
            field: None,
        }
    }
}

fn content_type_for(filename: &str) -> &'static str {
    let ext = filename.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

/// Search the catalog
pub async fn search(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<SearchParams>,
) -> Result<Json<PageResponse<PaperResponse>>> {
    let paging = PageParams {
        page: params.page,
        per_page: params.per_page,
    };
    let filters = PaperFilters {
        title: params.title,
        subject: params.subject,
        year: params.year,
    };

    let page = state
        .services
        .papers
        .search(&actor, &filters, paging.page(), paging.per_page())
        .await?;

    Ok(Json(PageResponse::from_page(page)))
}

/// Papers uploaded by the caller
pub async fn list_mine(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<PaperResponse>>> {
    let page = state
        .services
        .papers
        .list_mine(&actor, params.page(), params.per_page())
        .await?;

    Ok(Json(PageResponse::from_page(page)))
}

/// Upload a paper as `multipart/form-data` with `title`, `subject`,
/// optional `year`, and `file`. The file part is streamed to disk as it
/// arrives, so the text parts must come before it.
pub async fn upload(
    State(state): State<AppState>,
    actor: Actor,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<PaperResponse>)> {
    actor.require_user()?;
    let limit = state.services.files.max_bytes();

    let mut title = None;
    let mut subject = None;
    let mut year = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "title" | "subject" | "year" => {
                let value = field.text().await.map_err(|e| multipart_error(e, limit))?;
                match name.as_str() {
                    "title" => title = Some(value),
                    "subject" => subject = Some(value),
                    _ => year = Some(value),
                }
            }
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let metadata = PaperMetadata {
                    title: title.take().unwrap_or_default(),
                    subject: subject.take().unwrap_or_default(),
                    year: year.take(),
                };

                // A body-limit cut inside the file part still reads as TooLarge
                let chunks = field.map(|chunk| chunk.map_err(|e| multipart_error(e, limit)));

                let paper = state
                    .services
                    .papers
                    .upload(&actor, metadata, chunks, &filename)
                    .await?;

                return Ok((StatusCode::CREATED, Json(paper.into())));
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown upload field");
            }
        }
    }

    Err(AppError::Validation {
        message: "A file is required".to_string(),
        field: Some("file".to_string()),
    })
}

/// Get one paper's metadata
pub async fn get_paper(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<PaperResponse>> {
    let paper = state.services.papers.get(&actor, id).await?;
    Ok(Json(paper.into()))
}

/// Download a paper's stored file
pub async fn download(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let (paper, bytes) = state.services.papers.download(&actor, id).await?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        paper.file_path
    ))
    .map_err(|e| AppError::Internal {
        message: format!("invalid content disposition: {}", e),
    })?;

    Ok((
        AppendHeaders([
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(content_type_for(&paper.file_path)),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ]),
        bytes,
    ))
}

/// Delete a paper as its owner or an admin
pub async fn delete_paper(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Json<DeletePaperResponse>> {
    let deleted = state.services.moderation.delete_paper(user.id, id).await?;

    Ok(Json(DeletePaperResponse {
        id: deleted.paper.id,
        file_removed: deleted.file_removed,
    }))
}
