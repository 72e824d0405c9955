//! API handlers module

pub mod admin;
pub mod auth;
pub mod health;
pub mod papers;

use papervault_common::db::models::{Paper, User};
use papervault_common::db::Page;
use serde::{Deserialize, Serialize};

/// Public view of an account
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub banned: bool,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role.as_str().to_string(),
            banned: user.banned,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaperResponse {
    pub id: i64,
    pub title: String,
    pub subject: String,
    pub year: Option<String>,
    pub filename: String,
    pub owner_id: i64,
    pub uploaded_at: String,
    pub download_url: String,
}

impl From<Paper> for PaperResponse {
    fn from(paper: Paper) -> Self {
        Self {
            download_url: format!("/papers/{}/file", paper.id),
            id: paper.id,
            title: paper.title,
            subject: paper.subject,
            year: paper.year,
            filename: paper.file_path,
            owner_id: paper.user_id,
            uploaded_at: paper.uploaded_at.to_rfc3339(),
        }
    }
}

/// `?page=&per_page=` query parameters
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u64>,
}

impl PageParams {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1)
    }

    pub fn per_page(&self) -> u64 {
        self.per_page.unwrap_or(papervault_common::DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> PageResponse<T> {
    pub fn from_page<U: Into<T>>(page: Page<U>) -> Self {
        let total_pages = page.total_pages();
        let page: Page<T> = page.map(Into::into);
        Self {
            items: page.items,
            total: page.total,
            page: page.page,
            per_page: page.page_size,
            total_pages,
        }
    }
}

/// Plain acknowledgement body
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
