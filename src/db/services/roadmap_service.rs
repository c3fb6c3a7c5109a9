use chrono::Utc;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::content;
use crate::db::entities::{article, prelude::*, roadmap, roadmap_tag, tag};
use crate::db::enums::ContentStatus;
use crate::db::models::{DocumentView, Page, Pagination};
use crate::db::services::{
    ContentError, DocumentChanges, ListQuery, NewDocument, next_published_at, require_title, tag_service,
    user_service,
};

const KIND: &str = "Roadmap";

async fn tags_for<C>(conn: &C, roadmap_ids: &[i32]) -> Result<HashMap<i32, Vec<tag::Model>>, DbErr>
where
    C: ConnectionTrait,
{
    if roadmap_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let links: Vec<(i32, i32)> = RoadmapTag::find()
        .select_only()
        .column(roadmap_tag::Column::RoadmapId)
        .column(roadmap_tag::Column::TagId)
        .filter(roadmap_tag::Column::RoadmapId.is_in(roadmap_ids.to_vec()))
        .into_tuple()
        .all(conn)
        .await?;
    tag_service::group_tags(conn, &links).await
}

async fn into_views<C>(
    conn: &C,
    roadmaps: Vec<roadmap::Model>,
    include_content: bool,
) -> Result<Vec<DocumentView>, DbErr>
where
    C: ConnectionTrait,
{
    let ids: Vec<i32> = roadmaps.iter().map(|r| r.id).collect();
    let author_ids: Vec<i32> = roadmaps
        .iter()
        .map(|r| r.user_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let mut tags = tags_for(conn, &ids).await?;
    let authors = user_service::profiles_by_ids(conn, &author_ids).await?;

    Ok(roadmaps
        .into_iter()
        .map(|roadmap| {
            let tags = tags.remove(&roadmap.id).unwrap_or_default();
            let author = authors.get(&roadmap.user_id).cloned();
            DocumentView::from_roadmap(roadmap, include_content, author, tags)
        })
        .collect())
}

async fn into_view<C>(conn: &C, roadmap: roadmap::Model) -> Result<DocumentView, ContentError>
where
    C: ConnectionTrait,
{
    into_views(conn, vec![roadmap], true)
        .await?
        .pop()
        .ok_or(ContentError::NotFound(KIND))
}

async fn replace_tags<C>(conn: &C, roadmap_id: i32, user_id: i32, tag_ids: &[i32]) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    RoadmapTag::delete_many()
        .filter(roadmap_tag::Column::RoadmapId.eq(roadmap_id))
        .exec(conn)
        .await?;

    let owned = tag_service::owned_tag_ids(conn, user_id, tag_ids).await?;
    if owned.is_empty() {
        return Ok(());
    }
    let now = Utc::now();
    let rows = owned.into_iter().map(|tag_id| roadmap_tag::ActiveModel {
        roadmap_id: Set(roadmap_id),
        tag_id: Set(tag_id),
        created_at: Set(now),
    });
    RoadmapTag::insert_many(rows).exec_without_returning(conn).await?;
    Ok(())
}

async fn find_owned<C>(conn: &C, roadmap_id: i32, user_id: i32) -> Result<roadmap::Model, ContentError>
where
    C: ConnectionTrait,
{
    let roadmap = Roadmap::find_by_id(roadmap_id)
        .one(conn)
        .await?
        .ok_or(ContentError::NotFound(KIND))?;
    if roadmap.user_id != user_id {
        return Err(ContentError::Forbidden(KIND));
    }
    Ok(roadmap)
}

fn parse_body(body: serde_json::Value) -> Result<serde_json::Value, ContentError> {
    if content::is_blank(&body) {
        return Err(ContentError::InvalidInput("Content is required".to_string()));
    }
    content::parse_document(body).map_err(ContentError::InvalidInput)
}

pub async fn list_roadmaps<C>(conn: &C, query: &ListQuery) -> Result<Page<DocumentView>, ContentError>
where
    C: ConnectionTrait,
{
    let (page, limit) = query.page_and_limit();

    let mut select = Roadmap::find().filter(roadmap::Column::Status.eq(query.status));
    if let Some(user_id) = query.user_id {
        select = select.filter(roadmap::Column::UserId.eq(user_id));
    }
    if let Some(tag_id) = query.tag_id {
        select = select.filter(
            roadmap::Column::Id.in_subquery(
                Query::select()
                    .column(roadmap_tag::Column::RoadmapId)
                    .from(roadmap_tag::Entity)
                    .and_where(roadmap_tag::Column::TagId.eq(tag_id))
                    .to_owned(),
            ),
        );
    }
    if let Some(search) = query.search_term() {
        select = select.filter(
            Condition::any()
                .add(roadmap::Column::Title.contains(search))
                .add(roadmap::Column::Description.contains(search)),
        );
    }

    let paginator = select
        .order_by_desc(roadmap::Column::PublishedAt)
        .order_by_desc(roadmap::Column::CreatedAt)
        .order_by_desc(roadmap::Column::Id)
        .paginate(conn, limit);
    let totals = paginator.num_items_and_pages().await?;
    let roadmaps = paginator.fetch_page(page - 1).await?;

    Ok(Page {
        items: into_views(conn, roadmaps, false).await?,
        pagination: Pagination::new(page, limit, totals.number_of_items, totals.number_of_pages),
    })
}

pub async fn get_roadmap<C>(conn: &C, roadmap_id: i32, viewer: Option<i32>) -> Result<DocumentView, ContentError>
where
    C: ConnectionTrait,
{
    let mut roadmap = Roadmap::find_by_id(roadmap_id)
        .one(conn)
        .await?
        .ok_or(ContentError::NotFound(KIND))?;

    let is_author = viewer == Some(roadmap.user_id);
    if roadmap.status != ContentStatus::Published && !is_author {
        return Err(ContentError::Forbidden(KIND));
    }
    if !is_author {
        Roadmap::update_many()
            .col_expr(roadmap::Column::ViewCount, Expr::col(roadmap::Column::ViewCount).add(1))
            .filter(roadmap::Column::Id.eq(roadmap_id))
            .exec(conn)
            .await?;
        roadmap.view_count += 1;
    }

    into_view(conn, roadmap).await
}

pub async fn create_roadmap(
    db: &DatabaseConnection,
    user_id: i32,
    new_roadmap: NewDocument,
) -> Result<DocumentView, ContentError> {
    let title = require_title(&new_roadmap.title)?;
    let body = parse_body(new_roadmap.content)?;

    let txn = db.begin().await?;
    let now = Utc::now();
    let created = roadmap::ActiveModel {
        user_id: Set(user_id),
        title: Set(title),
        description: Set(new_roadmap.description),
        content: Set(body),
        status: Set(new_roadmap.status),
        view_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        published_at: Set(next_published_at(None, None, new_roadmap.status, now)),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    replace_tags(&txn, created.id, user_id, &new_roadmap.tag_ids).await?;

    let view = into_view(&txn, created).await?;
    txn.commit().await?;
    info!(user_id, roadmap_id = view.id, "Roadmap created.");
    Ok(view)
}

pub async fn update_roadmap(
    db: &DatabaseConnection,
    roadmap_id: i32,
    user_id: i32,
    changes: DocumentChanges,
) -> Result<DocumentView, ContentError> {
    let txn = db.begin().await?;
    let existing = find_owned(&txn, roadmap_id, user_id).await?;
    let previous_status = existing.status;
    let published_at = existing.published_at;
    let mut active: roadmap::ActiveModel = existing.into();
    let now = Utc::now();

    if let Some(title) = changes.title {
        active.title = Set(require_title(&title)?);
    }
    if let Some(description) = changes.description {
        active.description = Set(Some(description));
    }
    if let Some(body) = changes.content {
        active.content = Set(parse_body(body)?);
    }
    if let Some(status) = changes.status {
        active.status = Set(status);
        active.published_at = Set(next_published_at(Some(previous_status), published_at, status, now));
    }
    active.updated_at = Set(now);

    let updated = active.update(&txn).await?;
    if let Some(tag_ids) = changes.tag_ids {
        replace_tags(&txn, roadmap_id, user_id, &tag_ids).await?;
    }

    let view = into_view(&txn, updated).await?;
    txn.commit().await?;
    info!(user_id, roadmap_id, "Roadmap updated.");
    Ok(view)
}

/// Deletes a roadmap and detaches any articles that pointed at it.
pub async fn delete_roadmap(db: &DatabaseConnection, roadmap_id: i32, user_id: i32) -> Result<(), ContentError> {
    let txn = db.begin().await?;
    find_owned(&txn, roadmap_id, user_id).await?;

    RoadmapTag::delete_many()
        .filter(roadmap_tag::Column::RoadmapId.eq(roadmap_id))
        .exec(&txn)
        .await?;
    Article::update_many()
        .col_expr(article::Column::RoadmapId, Expr::value(Option::<i32>::None))
        .filter(article::Column::RoadmapId.eq(roadmap_id))
        .exec(&txn)
        .await?;
    Roadmap::delete_by_id(roadmap_id).exec(&txn).await?;

    txn.commit().await?;
    info!(user_id, roadmap_id, "Roadmap deleted.");
    Ok(())
}
