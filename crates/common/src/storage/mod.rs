//! Filesystem-backed store for uploaded papers
//!
//! Files live flat under one root directory. Stored names are always the
//! output of [`sanitize_filename`], so a stored name can never address
//! anything outside the root.

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use futures::{Stream, StreamExt};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Attempts at finding a free name before giving up
const MAX_NAME_ATTEMPTS: u32 = 10_000;

#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
    max_bytes: u64,
    allowed_extensions: Vec<String>,
}

/// Last path component of a client-supplied name, for either separator
fn basename(declared: &str) -> &str {
    declared.rsplit(['/', '\\']).next().unwrap_or_default()
}

/// Reduce a client-supplied filename to a safe basename
pub fn sanitize_filename(declared: &str) -> String {
    let base = basename(declared);

    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();

    let cleaned = cleaned.trim_start_matches(['.', '_']);
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Lower-cased extension of a sanitized name, if any
fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// `name_N.ext` for the Nth collision
fn numbered(name: &str, n: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_{}.{}", stem, n, ext),
        None => format!("{}_{}", name, n),
    }
}

impl FileStore {
    /// Open the store, creating the root directory if needed
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        fs::create_dir_all(&config.upload_root).await?;

        info!(root = %config.upload_root.display(), "File store ready");

        Ok(Self {
            root: config.upload_root.clone(),
            max_bytes: config.max_upload_bytes,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Check the declared extension, then sanitize the name. A name whose
    /// stem does not survive sanitization is stored as `upload.<ext>`.
    pub fn check_filename(&self, declared: &str) -> Result<String> {
        let extension = extension_of(basename(declared)).unwrap_or_default();

        if !self.allowed_extensions.iter().any(|e| *e == extension) {
            return Err(AppError::UnsupportedType { extension });
        }

        let name = sanitize_filename(declared);
        if extension_of(&name).as_deref() == Some(extension.as_str()) {
            Ok(name)
        } else {
            Ok(format!("upload.{}", extension))
        }
    }

    /// Persist an upload, returning its stored name. Nothing remains on disk
    /// when this fails.
    pub async fn accept<S, B, E>(&self, stream: S, declared_filename: &str) -> Result<String>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<AppError>,
    {
        let name = self.check_filename(declared_filename)?;
        let (stored, file) = self.reserve(&name).await?;

        match self.write_limited(file, stream).await {
            Ok(written) => {
                debug!(stored = %stored, bytes = written, "Upload stored");
                Ok(stored)
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(self.root.join(&stored)).await {
                    warn!(stored = %stored, error = %rm, "Failed to discard partial upload");
                }
                Err(e)
            }
        }
    }

    /// Claim a name that no existing file uses
    async fn reserve(&self, name: &str) -> Result<(String, File)> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                name.to_string()
            } else {
                numbered(name, attempt)
            };

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&candidate))
                .await
            {
                Ok(file) => return Ok((candidate, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Storage {
            message: format!("no free name for {}", name),
        })
    }

    async fn write_limited<S, B, E>(&self, mut file: File, stream: S) -> Result<u64>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<AppError>,
    {
        let mut stream = std::pin::pin!(stream);
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Into::into)?;
            let bytes = chunk.as_ref();

            written += bytes.len() as u64;
            if written > self.max_bytes {
                return Err(AppError::TooLarge { limit: self.max_bytes });
            }
            file.write_all(bytes).await?;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }

    /// Path of a stored file. Names that are not already sanitized are
    /// rejected.
    pub fn resolve(&self, stored: &str) -> Result<PathBuf> {
        if stored.is_empty() || sanitize_filename(stored) != stored {
            return Err(AppError::NotFound {
                resource: "file",
                id: stored.to_string(),
            });
        }
        Ok(self.root.join(stored))
    }

    /// Delete a stored file. `false` when it was already absent.
    pub async fn remove(&self, stored: &str) -> Result<bool> {
        let path = self.resolve(stored)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Full contents of a stored file
    pub async fn read(&self, stored: &str) -> Result<Vec<u8>> {
        let path = self.resolve(stored)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::NotFound {
                resource: "file",
                id: stored.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, stored: &str) -> bool {
        match self.resolve(stored) {
            Ok(path) => fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
