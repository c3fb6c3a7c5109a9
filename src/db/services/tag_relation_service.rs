//! Parent/child relations between tags of one user, kept acyclic.
//!
//! Every mutation takes the owner's lock before opening its transaction, so
//! the graph read for validation cannot change before the new edge is written.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use tracing::{debug, info, warn};

use crate::db::entities::{prelude::*, tag, tag_relation};
use crate::db::models::{TagGraphSnapshot, TagRelationDetails};
use crate::db::services::tag_service::TagServiceError;
use crate::server::user_locks::UserLocks;
use crate::tag_graph::{DagCheck, TagGraph};

/// Builds the graph of every stored relation owned by `user_id`.
pub async fn load_user_graph<C>(conn: &C, user_id: i32) -> Result<TagGraph, DbErr>
where
    C: ConnectionTrait,
{
    let edges: Vec<(i32, i32)> = TagRelation::find()
        .select_only()
        .column(tag_relation::Column::ParentTagId)
        .column(tag_relation::Column::ChildTagId)
        .filter(tag_relation::Column::UserId.eq(user_id))
        .into_tuple()
        .all(conn)
        .await?;
    Ok(TagGraph::from_edges(edges))
}

async fn owned_endpoint<C>(conn: &C, user_id: i32, tag_id: i32) -> Result<tag::Model, TagServiceError>
where
    C: ConnectionTrait,
{
    Tag::find_by_id(tag_id)
        .filter(tag::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or(TagServiceError::TagNotFound(tag_id))
}

/// Inserts an edge without validating it. Callers must have checked it
/// against the graph while holding the owner's lock.
pub(crate) async fn insert_relation<C>(
    conn: &C,
    user_id: i32,
    parent_tag_id: i32,
    child_tag_id: i32,
) -> Result<tag_relation::Model, TagServiceError>
where
    C: ConnectionTrait,
{
    tag_relation::ActiveModel {
        parent_tag_id: Set(parent_tag_id),
        child_tag_id: Set(child_tag_id),
        user_id: Set(user_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            TagServiceError::DuplicateRelation(parent_tag_id, child_tag_id)
        }
        _ => TagServiceError::DbErr(e),
    })
}

/// Checks a proposed relation without writing anything.
///
/// Both tags must exist and belong to `user_id`. The answer reflects the
/// graph at the time of the call only.
pub async fn validate_relation<C>(
    conn: &C,
    user_id: i32,
    parent_tag_id: i32,
    child_tag_id: i32,
) -> Result<DagCheck, TagServiceError>
where
    C: ConnectionTrait,
{
    owned_endpoint(conn, user_id, parent_tag_id).await?;
    owned_endpoint(conn, user_id, child_tag_id).await?;
    let graph = load_user_graph(conn, user_id).await?;
    Ok(graph.check_edge(parent_tag_id, child_tag_id))
}

/// Adds `parent -> child` if both tags are the caller's, the edge is new and
/// it keeps the hierarchy acyclic.
pub async fn create_relation(
    db: &DatabaseConnection,
    locks: &UserLocks,
    user_id: i32,
    parent_tag_id: i32,
    child_tag_id: i32,
) -> Result<TagRelationDetails, TagServiceError> {
    let _guard = locks.lock(user_id).await;
    let txn = db.begin().await?;

    let parent_tag = owned_endpoint(&txn, user_id, parent_tag_id).await?;
    let child_tag = owned_endpoint(&txn, user_id, child_tag_id).await?;

    let existing = TagRelation::find()
        .filter(tag_relation::Column::ParentTagId.eq(parent_tag_id))
        .filter(tag_relation::Column::ChildTagId.eq(child_tag_id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(TagServiceError::DuplicateRelation(parent_tag_id, child_tag_id));
    }

    let graph = load_user_graph(&txn, user_id).await?;
    let check = graph.check_edge(parent_tag_id, child_tag_id);
    if !check.is_valid() {
        debug!(user_id, parent_tag_id, child_tag_id, reason = check.reason(), "Relation rejected.");
        return Err(TagServiceError::InvalidRelation(check.reason().to_string()));
    }

    let relation = insert_relation(&txn, user_id, parent_tag_id, child_tag_id).await?;
    txn.commit().await?;
    info!(user_id, parent_tag_id, child_tag_id, relation_id = relation.id, "Tag relation created.");

    Ok(TagRelationDetails {
        relation,
        parent_tag,
        child_tag,
    })
}

pub async fn delete_relation(
    db: &DatabaseConnection,
    locks: &UserLocks,
    relation_id: i32,
    user_id: i32,
) -> Result<(), TagServiceError> {
    let _guard = locks.lock(user_id).await;
    let txn = db.begin().await?;

    let relation = TagRelation::find_by_id(relation_id)
        .one(&txn)
        .await?
        .ok_or(TagServiceError::RelationNotFound(relation_id))?;
    if relation.user_id != user_id {
        return Err(TagServiceError::Forbidden);
    }
    TagRelation::delete_by_id(relation_id).exec(&txn).await?;
    txn.commit().await?;

    info!(user_id, relation_id, "Tag relation deleted.");
    Ok(())
}

/// All of a user's tags and relations. Logs a warning if the
/// stored relations contain a cycle, which the write path should prevent.
pub async fn get_graph<C>(conn: &C, user_id: i32) -> Result<TagGraphSnapshot, DbErr>
where
    C: ConnectionTrait,
{
    let nodes = Tag::find()
        .filter(tag::Column::UserId.eq(user_id))
        .order_by_asc(tag::Column::Name)
        .all(conn)
        .await?;
    let edges = TagRelation::find()
        .filter(tag_relation::Column::UserId.eq(user_id))
        .order_by_asc(tag_relation::Column::Id)
        .all(conn)
        .await?;

    let graph = TagGraph::from_edges(edges.iter().map(|e| (e.parent_tag_id, e.child_tag_id)));
    if let Some(cycle) = graph.find_cycle() {
        warn!(user_id, ?cycle, "Stored tag relations contain a cycle.");
    }

    Ok(TagGraphSnapshot { nodes, edges })
}
