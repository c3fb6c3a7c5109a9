//! The `services` module holds all data access for the application.
//!
//! Each sub-module owns one area (tags, relations, users, content documents,
//! uploads) and exposes async functions over a sea-orm connection, so the web
//! layer works with domain models without knowing the queries behind them.

pub mod article_service;
pub mod mindmap_service;
pub mod roadmap_service;
pub mod tag_article_service;
pub mod tag_relation_service;
pub mod tag_service;
pub mod upload_service;
pub mod user_service;

use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use serde_json::Value;

use crate::db::enums::ContentStatus;

pub use tag_relation_service::{create_relation, delete_relation, get_graph, validate_relation};
pub use tag_service::{
    NewTag, TagChanges, TagFilter, TagServiceError, create_tag, delete_tag, get_tag_details, list_tags,
    update_tag,
};

const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 100;

/// Errors shared by the article, roadmap and mindmap services.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("You do not have access to this {0}")]
    Forbidden(&'static str),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Filters and paging for listing content documents.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub page: u64,
    pub limit: u64,
    pub status: ContentStatus,
    pub tag_id: Option<i32>,
    pub search: Option<String>,
    pub user_id: Option<i32>,
}

impl Default for ListQuery {
    fn default() -> Self {
        ListQuery {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            status: ContentStatus::Published,
            tag_id: None,
            search: None,
            user_id: None,
        }
    }
}

impl ListQuery {
    /// Page is 1-based; the page size is clamped to `1..=100`.
    pub fn page_and_limit(&self) -> (u64, u64) {
        (self.page.max(1), self.limit.clamp(1, MAX_PAGE_SIZE))
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Input for creating a roadmap or mindmap.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub title: String,
    pub description: Option<String>,
    pub content: Value,
    pub status: ContentStatus,
    pub tag_ids: Vec<i32>,
}

/// Partial update of a roadmap or mindmap; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct DocumentChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<Value>,
    pub status: Option<ContentStatus>,
    pub tag_ids: Option<Vec<i32>>,
}

pub(crate) fn require_title(title: &str) -> Result<String, ContentError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ContentError::InvalidInput("Title is required".to_string()));
    }
    Ok(title.to_string())
}

/// `published_at` after a status change: stamped when a document moves into
/// `published`, otherwise left as it was.
pub(crate) fn next_published_at(
    previous: Option<ContentStatus>,
    published_at: Option<DateTime<Utc>>,
    status: ContentStatus,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if status == ContentStatus::Published && previous != Some(ContentStatus::Published) {
        Some(now)
    } else {
        published_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_published_at_only_set_on_transition() {
        let earlier = Utc::now() - chrono::Duration::days(3);
        let now = Utc::now();

        assert_eq!(next_published_at(None, None, ContentStatus::Published, now), Some(now));
        assert_eq!(next_published_at(None, None, ContentStatus::Draft, now), None);
        assert_eq!(
            next_published_at(Some(ContentStatus::Draft), None, ContentStatus::Published, now),
            Some(now)
        );
        assert_eq!(
            next_published_at(Some(ContentStatus::Published), Some(earlier), ContentStatus::Published, now),
            Some(earlier)
        );
        assert_eq!(
            next_published_at(Some(ContentStatus::Published), Some(earlier), ContentStatus::Archived, now),
            Some(earlier)
        );
    }

    #[test]
    fn test_list_query_clamps_paging() {
        let query = ListQuery {
            page: 0,
            limit: 1000,
            ..Default::default()
        };
        assert_eq!(query.page_and_limit(), (1, MAX_PAGE_SIZE));
        assert_eq!(ListQuery::default().page_and_limit(), (1, DEFAULT_PAGE_SIZE));
    }
}
