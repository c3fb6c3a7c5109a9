use serde::Deserialize;
use serde_json::Value;

use crate::db::enums::ContentStatus;
use crate::db::services::article_service::{ArticleChanges, NewArticle};
use crate::db::services::{DocumentChanges, ListQuery, NewDocument};

/// Query string accepted by the article, roadmap and mindmap listings.
#[derive(Debug, Default, Deserialize)]
pub struct ContentListParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<ContentStatus>,
    pub tag_id: Option<i32>,
    pub search: Option<String>,
    pub user_id: Option<i32>,
}

impl From<ContentListParams> for ListQuery {
    fn from(params: ContentListParams) -> Self {
        let defaults = ListQuery::default();
        ListQuery {
            page: params.page.unwrap_or(defaults.page),
            limit: params.limit.unwrap_or(defaults.limit),
            status: params.status.unwrap_or(defaults.status),
            tag_id: params.tag_id,
            search: params.search,
            user_id: params.user_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateArticleRequest {
    pub title: String,
    #[serde(default)]
    pub content: Value,
    pub content_html: Option<String>,
    pub excerpt: Option<String>,
    #[serde(default)]
    pub status: ContentStatus,
    #[serde(default)]
    pub tags: Vec<i32>,
    pub roadmap_id: Option<i32>,
    pub mindmap_id: Option<i32>,
}

impl From<CreateArticleRequest> for NewArticle {
    fn from(req: CreateArticleRequest) -> Self {
        NewArticle {
            title: req.title,
            content: req.content,
            content_html: req.content_html,
            excerpt: req.excerpt,
            status: req.status,
            tag_ids: req.tags,
            roadmap_id: req.roadmap_id,
            mindmap_id: req.mindmap_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub content: Option<Value>,
    pub content_html: Option<String>,
    pub excerpt: Option<String>,
    pub status: Option<ContentStatus>,
    pub tags: Option<Vec<i32>>,
    pub roadmap_id: Option<i32>,
    pub mindmap_id: Option<i32>,
}

impl From<UpdateArticleRequest> for ArticleChanges {
    fn from(req: UpdateArticleRequest) -> Self {
        ArticleChanges {
            title: req.title,
            content: req.content,
            content_html: req.content_html,
            excerpt: req.excerpt,
            status: req.status,
            tag_ids: req.tags,
            roadmap_id: req.roadmap_id,
            mindmap_id: req.mindmap_id,
        }
    }
}

/// Body for creating a roadmap or mindmap.
#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub status: ContentStatus,
    #[serde(default)]
    pub tags: Vec<i32>,
}

impl From<CreateDocumentRequest> for NewDocument {
    fn from(req: CreateDocumentRequest) -> Self {
        NewDocument {
            title: req.title,
            description: req.description,
            content: req.content,
            status: req.status,
            tag_ids: req.tags,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<Value>,
    pub status: Option<ContentStatus>,
    pub tags: Option<Vec<i32>>,
}

impl From<UpdateDocumentRequest> for DocumentChanges {
    fn from(req: UpdateDocumentRequest) -> Self {
        DocumentChanges {
            title: req.title,
            description: req.description,
            content: req.content,
            status: req.status,
            tag_ids: req.tags,
        }
    }
}
