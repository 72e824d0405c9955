//! Paper workflows: upload, lookup, search and download

use crate::auth::{policy, Actor};
use crate::db::models::Paper;
use crate::db::{Page, PaperCatalog, PaperFilters, PaperMetadata};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::storage::FileStore;
use futures::Stream;
use tracing::{error, info, warn};
use validator::Validate;

#[derive(Clone)]
pub struct PaperService {
    catalog: PaperCatalog,
    files: FileStore,
}

impl PaperService {
    pub fn new(catalog: PaperCatalog, files: FileStore) -> Self {
        Self { catalog, files }
    }

    /// Store an uploaded file and catalog it. Either both the file and the
    /// row exist afterwards, or neither does.
    pub async fn upload<S, B, E>(
        &self,
        actor: &Actor,
        metadata: PaperMetadata,
        stream: S,
        declared_filename: &str,
    ) -> Result<Paper>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<AppError>,
    {
        let user = actor.require_user()?;
        policy::require(policy::can_upload(actor), "Uploads are not permitted")?;

        let metadata = metadata.normalized();
        metadata.validate()?;

        let stored = match self.files.accept(stream, declared_filename).await {
            Ok(stored) => stored,
            Err(e) => {
                metrics::record_upload("rejected", 0);
                return Err(e);
            }
        };

        let paper = match self.catalog.insert(metadata, user.id, &stored).await {
            Ok(paper) => paper,
            Err(e) => {
                error!(stored = %stored, error = %e, "Catalog insert failed, discarding upload");
                if let Err(rm) = self.files.remove(&stored).await {
                    warn!(stored = %stored, error = %rm, "Failed to discard orphaned upload");
                }
                metrics::record_upload("failed", 0);
                return Err(e);
            }
        };

        let size = tokio::fs::metadata(self.files.resolve(&stored)?)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        metrics::record_upload("stored", size);

        info!(
            paper_id = paper.id,
            user_id = user.id,
            stored = %paper.file_path,
            bytes = size,
            "Paper uploaded"
        );
        Ok(paper)
    }

    pub async fn get(&self, actor: &Actor, id: i64) -> Result<Paper> {
        actor.require_user()?;
        let paper = self.catalog.get(id).await?;
        policy::require(policy::can_view(actor, &paper), "Paper is not visible")?;
        Ok(paper)
    }

    pub async fn search(
        &self,
        actor: &Actor,
        filters: &PaperFilters,
        page: u64,
        page_size: u64,
    ) -> Result<Page<Paper>> {
        actor.require_user()?;
        policy::require(policy::can_browse(actor), "Catalog is not visible")?;
        self.catalog.search(filters, page, page_size).await
    }

    /// Papers uploaded by the acting user
    pub async fn list_mine(&self, actor: &Actor, page: u64, page_size: u64) -> Result<Page<Paper>> {
        let user = actor.require_user()?;
        self.catalog.list_by_owner(user.id, page, page_size).await
    }

    /// A paper and the bytes of its stored file
    pub async fn download(&self, actor: &Actor, id: i64) -> Result<(Paper, Vec<u8>)> {
        let paper = self.get(actor, id).await?;
        let bytes = self.files.read(&paper.file_path).await?;
        Ok((paper, bytes))
    }
}
