use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::db::services::tag_article_service::AdminTag;
use crate::db::services::tag_service::{NewTag, TagChanges};

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub parent_tags: Vec<i32>,
}

impl From<CreateTagRequest> for NewTag {
    fn from(req: CreateTagRequest) -> Self {
        NewTag {
            name: req.name,
            description: req.description,
            color: req.color,
            parent_tag_ids: req.parent_tags,
        }
    }
}

/// Keeps an explicit `null` apart from a missing key: `null` becomes `Some(None)`.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTagRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub description: Option<Option<String>>,
    pub color: Option<String>,
}

impl From<UpdateTagRequest> for TagChanges {
    fn from(req: UpdateTagRequest) -> Self {
        TagChanges {
            name: req.name,
            description: req.description,
            color: req.color,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TagListQuery {
    pub user_id: Option<i32>,
    pub search: Option<String>,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GraphQuery {
    pub user_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RelationRequest {
    pub parent_tag_id: i32,
    pub child_tag_id: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminTagQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminTagRequest {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub content: Option<Value>,
}

impl From<AdminTagRequest> for AdminTag {
    fn from(req: AdminTagRequest) -> Self {
        AdminTag {
            name: req.name,
            description: req.description,
            color: req.color,
            content: req.content,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminTagUpdateRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub description: Option<Option<String>>,
    pub color: Option<String>,
    pub content: Option<Value>,
}
