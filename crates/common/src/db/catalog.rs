//! Paper catalog: metadata rows, search and pagination
//!
//! Every listing is ordered newest first (`uploaded_at DESC, id DESC`).
//! Pages are 1-based; a page past the end is empty, never an error.

use crate::db::models::*;
use crate::db::{unique_violation, DbPool};
use crate::errors::{AppError, Result};
use crate::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Select, Set,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Metadata supplied by the uploader
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PaperMetadata {
    #[validate(length(min = 1, max = 150, message = "Title must be 1-150 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 100, message = "Subject must be 1-100 characters"))]
    pub subject: String,

    /// Free text; the catalog matches it exactly
    #[validate(length(max = 10, message = "Year must be at most 10 characters"))]
    pub year: Option<String>,
}

impl PaperMetadata {
    /// Trim every field; a blank year becomes `None`
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            subject: self.subject.trim().to_string(),
            year: self
                .year
                .map(|y| y.trim().to_string())
                .filter(|y| !y.is_empty()),
        }
    }
}

/// Search filters; `None` or blank means unconstrained
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperFilters {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub year: Option<String>,
}

/// One page of results plus the total across all pages
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.page_size)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Page 0 reads as page 1; page size is kept within `1..=MAX_PAGE_SIZE`
pub(crate) fn clamp_page(page: u64, page_size: u64) -> (u64, u64) {
    let page_size = match page_size {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    };
    (page.max(1), page_size)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// `LOWER(column) LIKE '%needle%'` with LIKE wildcards in the needle escaped
fn contains_ci(column: PaperColumn, needle: &str) -> sea_orm::sea_query::SimpleExpr {
    let escaped = needle
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");

    Expr::expr(Func::lower(Expr::col(column)))
        .like(LikeExpr::new(format!("%{}%", escaped)).escape('\\'))
}

/// Repository for paper metadata
#[derive(Clone)]
pub struct PaperCatalog {
    pool: DbPool,
}

impl PaperCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    /// Insert a paper row owned by `owner_id`
    pub async fn insert(
        &self,
        metadata: PaperMetadata,
        owner_id: i64,
        stored_filename: &str,
    ) -> Result<Paper> {
        let now = chrono::Utc::now();

        let paper = PaperActiveModel {
            title: Set(metadata.title),
            subject: Set(metadata.subject),
            year: Set(metadata.year),
            file_path: Set(stored_filename.to_string()),
            uploaded_at: Set(now.into()),
            user_id: Set(owner_id),
            ..Default::default()
        };

        paper.insert(self.conn()).await.map_err(|e| match unique_violation(&e) {
            Some(_) => AppError::Storage {
                message: format!("stored filename already catalogued: {}", stored_filename),
            },
            None => e.into(),
        })
    }

    /// Fetch a paper or fail with `NotFound`
    pub async fn get(&self, id: i64) -> Result<Paper> {
        PaperEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .ok_or_else(|| AppError::paper_not_found(id))
    }

    /// Filtered, paginated search
    pub async fn search(
        &self,
        filters: &PaperFilters,
        page: u64,
        page_size: u64,
    ) -> Result<Page<Paper>> {
        let mut condition = Condition::all();

        if let Some(title) = non_blank(&filters.title) {
            condition = condition.add(contains_ci(PaperColumn::Title, title));
        }
        if let Some(subject) = non_blank(&filters.subject) {
            condition = condition.add(contains_ci(PaperColumn::Subject, subject));
        }
        if let Some(year) = non_blank(&filters.year) {
            condition = condition.add(PaperColumn::Year.eq(year));
        }

        self.paginate(PaperEntity::find().filter(condition), page, page_size)
            .await
    }

    /// Papers uploaded by one user
    pub async fn list_by_owner(
        &self,
        owner_id: i64,
        page: u64,
        page_size: u64,
    ) -> Result<Page<Paper>> {
        self.paginate(
            PaperEntity::find().filter(PaperColumn::UserId.eq(owner_id)),
            page,
            page_size,
        )
        .await
    }

    /// Every paper, for the admin dashboard
    pub async fn list_all(&self, page: u64, page_size: u64) -> Result<Page<Paper>> {
        self.paginate(PaperEntity::find(), page, page_size).await
    }

    /// Delete a paper row; `NotFound` if it was already gone
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = PaperEntity::delete_by_id(id).exec(self.conn()).await?;
        if result.rows_affected == 0 {
            return Err(AppError::paper_not_found(id));
        }
        Ok(())
    }

    async fn paginate(
        &self,
        query: Select<PaperEntity>,
        page: u64,
        page_size: u64,
    ) -> Result<Page<Paper>> {
        let (page, page_size) = clamp_page(page, page_size);

        let paginator = query
            .order_by_desc(PaperColumn::UploadedAt)
            .order_by_desc(PaperColumn::Id)
            .paginate(self.conn(), page_size);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;

        Ok(Page { items, total, page, page_size })
    }
}

// ============================================================================
// Connection-generic helpers, usable inside a transaction
// ============================================================================

/// Every paper owned by `owner_id`
pub(crate) async fn list_owned_in<C: ConnectionTrait>(conn: &C, owner_id: i64) -> Result<Vec<Paper>> {
    PaperEntity::find()
        .filter(PaperColumn::UserId.eq(owner_id))
        .order_by_asc(PaperColumn::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Remove the given paper rows, returning how many went.
///
/// Deleting by id rather than by owner means a paper inserted after the
/// owner's papers were listed survives here, and its foreign key then
/// blocks the owner's deletion, rolling the whole transaction back.
pub(crate) async fn delete_ids_in<C: ConnectionTrait>(conn: &C, ids: &[i64]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = PaperEntity::delete_many()
        .filter(PaperColumn::Id.is_in(ids.iter().copied()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
