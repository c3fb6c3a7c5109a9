//! Admin tags: each tag created here owns a published "tag article" that
//! describes it, linked to the tag through `article_tags`.

use chrono::Utc;
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::content;
use crate::db::entities::{article, article_tag, prelude::*, tag};
use crate::db::enums::ContentStatus;
use crate::db::models::ArticleView;
use crate::db::services::article_service;
use crate::db::services::tag_service::{self, NewTag, TagChanges, TagServiceError};
use crate::server::user_locks::UserLocks;

#[derive(Debug, Clone, Default)]
pub struct AdminTag {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    /// Body of the tag article; generated from the name and description when absent.
    pub content: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminTagView {
    #[serde(flatten)]
    pub tag: tag::Model,
    pub article: Option<ArticleView>,
}

fn article_body(tag: &tag::Model, content: Option<Value>) -> Value {
    match content.filter(|c| !content::is_blank(c)) {
        Some(body) => content::normalize_rich_text(body),
        None => content::tag_article_doc(&tag.name, tag.description.as_deref().unwrap_or_default()),
    }
}

/// The tag article attached to `tag_id`, if any.
pub async fn find_tag_article<C>(conn: &C, tag_id: i32) -> Result<Option<article::Model>, DbErr>
where
    C: ConnectionTrait,
{
    Article::find()
        .filter(article::Column::IsTagArticle.eq(true))
        .filter(
            article::Column::Id.in_subquery(
                Query::select()
                    .column(article_tag::Column::ArticleId)
                    .from(article_tag::Entity)
                    .and_where(article_tag::Column::TagId.eq(tag_id))
                    .to_owned(),
            ),
        )
        .one(conn)
        .await
}

async fn view_of<C>(conn: &C, tag: tag::Model) -> Result<AdminTagView, DbErr>
where
    C: ConnectionTrait,
{
    let article = match find_tag_article(conn, tag.id).await? {
        Some(article) => article_service::into_views(conn, vec![article], true).await?.pop(),
        None => None,
    };
    Ok(AdminTagView { tag, article })
}

pub async fn list_admin_tags<C>(conn: &C, user_id: i32, search: Option<String>) -> Result<Vec<tag::Model>, DbErr>
where
    C: ConnectionTrait,
{
    let filter = tag_service::TagFilter {
        search,
        parent_id: None,
    };
    tag_service::list_tags(conn, user_id, &filter).await
}

/// Creates a tag and its published tag article in one transaction.
pub async fn create_tag_with_article(
    db: &DatabaseConnection,
    locks: &UserLocks,
    user_id: i32,
    input: AdminTag,
) -> Result<AdminTagView, TagServiceError> {
    let _guard = locks.lock(user_id).await;
    let txn = db.begin().await?;

    let new_tag = NewTag {
        name: input.name,
        description: input.description,
        color: input.color,
        parent_tag_ids: Vec::new(),
    };
    let tag = tag_service::insert_tag(&txn, user_id, &new_tag).await?;

    let now = Utc::now();
    let article = article::ActiveModel {
        user_id: Set(user_id),
        title: Set(tag.name.clone()),
        content: Set(article_body(&tag, input.content)),
        excerpt: Set(tag.description.clone()),
        status: Set(ContentStatus::Published),
        is_tag_article: Set(true),
        view_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        published_at: Set(Some(now)),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    article_tag::ActiveModel {
        article_id: Set(article.id),
        tag_id: Set(tag.id),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let view = view_of(&txn, tag).await?;
    txn.commit().await?;
    info!(user_id, tag_id = view.tag.id, article_id = article.id, "Admin tag created.");
    Ok(view)
}

/// Updates a tag and mirrors its name, description and content onto the
/// tag article.
pub async fn update_tag_with_article(
    db: &DatabaseConnection,
    locks: &UserLocks,
    tag_id: i32,
    user_id: i32,
    changes: TagChanges,
    content: Option<Value>,
) -> Result<AdminTagView, TagServiceError> {
    let _guard = locks.lock(user_id).await;
    let txn = db.begin().await?;

    let tag = tag_service::update_tag(&txn, tag_id, user_id, changes).await?;
    if let Some(existing) = find_tag_article(&txn, tag_id).await? {
        let mut active: article::ActiveModel = existing.into();
        active.title = Set(tag.name.clone());
        active.excerpt = Set(tag.description.clone());
        if let Some(body) = content.filter(|c| !content::is_blank(c)) {
            active.content = Set(content::normalize_rich_text(body));
        }
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;
    }

    let view = view_of(&txn, tag).await?;
    txn.commit().await?;
    info!(user_id, tag_id, "Admin tag updated.");
    Ok(view)
}

/// Deletes the tag article and then the tag with its relations.
pub async fn delete_tag_with_article(
    db: &DatabaseConnection,
    locks: &UserLocks,
    tag_id: i32,
    user_id: i32,
) -> Result<(), TagServiceError> {
    let _guard = locks.lock(user_id).await;
    let txn = db.begin().await?;

    tag_service::find_owned_tag(&txn, tag_id, user_id).await?;
    if let Some(existing) = find_tag_article(&txn, tag_id).await? {
        ArticleTag::delete_many()
            .filter(article_tag::Column::ArticleId.eq(existing.id))
            .exec(&txn)
            .await?;
        Article::delete_by_id(existing.id).exec(&txn).await?;
    }
    tag_service::delete_tag_cascade(&txn, tag_id).await?;

    txn.commit().await?;
    info!(user_id, tag_id, "Admin tag deleted.");
    Ok(())
}
