use chrono::{DateTime, Utc};
use sea_orm::prelude::Json;
use serde::Serialize;

use crate::db::entities::{article, mindmap, roadmap, tag, tag_relation, user};
use crate::db::enums::ContentStatus;

/// Public view of a user. The email is only present on the caller's own profile.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn public(user: &user::Model) -> Self {
        Self::build(user, false)
    }

    pub fn private(user: &user::Model) -> Self {
        Self::build(user, true)
    }

    fn build(user: &user::Model, include_email: bool) -> Self {
        UserProfile {
            id: user.id,
            username: user.username.clone(),
            email: include_email.then(|| user.email.clone()),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            bio: user.bio.clone(),
            is_active: user.is_active,
            is_admin: user.is_admin,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// A tag together with its direct neighbours in the hierarchy.
#[derive(Debug, Clone, Serialize)]
pub struct TagDetails {
    #[serde(flatten)]
    pub tag: tag::Model,
    pub parent_tags: Vec<tag::Model>,
    pub child_tags: Vec<tag::Model>,
}

/// A relation with both endpoint tags resolved.
#[derive(Debug, Clone, Serialize)]
pub struct TagRelationDetails {
    #[serde(flatten)]
    pub relation: tag_relation::Model,
    pub parent_tag: tag::Model,
    pub child_tag: tag::Model,
}

/// Snapshot of one user's tag hierarchy for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct TagGraphSnapshot {
    pub nodes: Vec<tag::Model>,
    pub edges: Vec<tag_relation::Model>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64, pages: u64) -> Self {
        Pagination {
            page,
            limit,
            total,
            pages,
            has_next: page < pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArticleView {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub excerpt: Option<String>,
    pub status: ContentStatus,
    pub is_tag_article: bool,
    pub roadmap_id: Option<i32>,
    pub mindmap_id: Option<i32>,
    pub view_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
    pub author: Option<UserProfile>,
    pub tags: Vec<tag::Model>,
}

impl ArticleView {
    pub fn new(
        article: article::Model,
        include_content: bool,
        author: Option<UserProfile>,
        tags: Vec<tag::Model>,
    ) -> Self {
        let (content, content_html) = if include_content {
            (Some(article.content), article.content_html)
        } else {
            (None, None)
        };
        ArticleView {
            id: article.id,
            user_id: article.user_id,
            title: article.title,
            excerpt: article.excerpt,
            status: article.status,
            is_tag_article: article.is_tag_article,
            roadmap_id: article.roadmap_id,
            mindmap_id: article.mindmap_id,
            view_count: article.view_count,
            created_at: article.created_at,
            updated_at: article.updated_at,
            published_at: article.published_at,
            content,
            content_html,
            author,
            tags,
        }
    }
}

/// Shared view for roadmaps and mindmaps, which carry the same fields.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: ContentStatus,
    pub view_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Json>,
    pub author: Option<UserProfile>,
    pub tags: Vec<tag::Model>,
}

impl DocumentView {
    pub fn from_roadmap(
        roadmap: roadmap::Model,
        include_content: bool,
        author: Option<UserProfile>,
        tags: Vec<tag::Model>,
    ) -> Self {
        DocumentView {
            id: roadmap.id,
            user_id: roadmap.user_id,
            title: roadmap.title,
            description: roadmap.description,
            status: roadmap.status,
            view_count: roadmap.view_count,
            created_at: roadmap.created_at,
            updated_at: roadmap.updated_at,
            published_at: roadmap.published_at,
            content: include_content.then_some(roadmap.content),
            author,
            tags,
        }
    }

    pub fn from_mindmap(
        mindmap: mindmap::Model,
        include_content: bool,
        author: Option<UserProfile>,
        tags: Vec<tag::Model>,
    ) -> Self {
        DocumentView {
            id: mindmap.id,
            user_id: mindmap.user_id,
            title: mindmap.title,
            description: mindmap.description,
            status: mindmap.status,
            view_count: mindmap.view_count,
            created_at: mindmap.created_at,
            updated_at: mindmap.updated_at,
            published_at: mindmap.published_at,
            content: include_content.then_some(mindmap.content),
            author,
            tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_flags() {
        let first = Pagination::new(1, 10, 25, 3);
        assert!(first.has_next);
        assert!(!first.has_prev);

        let last = Pagination::new(3, 10, 25, 3);
        assert!(!last.has_next);
        assert!(last.has_prev);

        let empty = Pagination::new(1, 10, 0, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
    }
}
