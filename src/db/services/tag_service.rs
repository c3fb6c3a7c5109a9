//! Tag store: per-user tags with unique names.
//!
//! Deleting a tag removes every relation touching it and detaches it from
//! articles, roadmaps and mindmaps in the same transaction.

use chrono::Utc;
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QuerySelect, Set, SqlErr, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::db::entities::{
    article_tag, mindmap_tag, prelude::*, roadmap_tag, tag, tag_relation,
};
use crate::db::models::TagDetails;
use crate::db::services::tag_relation_service;
use crate::server::user_locks::UserLocks;

pub const DEFAULT_TAG_COLOR: &str = "#1677ff";
const MAX_TAG_NAME_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Tag not found: {0}")]
    TagNotFound(i32),
    #[error("Tag relation not found: {0}")]
    RelationNotFound(i32),
    #[error("Unauthorized operation")]
    Forbidden,
    #[error("A tag with the name '{0}' already exists.")]
    DuplicateName(String),
    #[error("The relation {0} -> {1} already exists.")]
    DuplicateRelation(i32, i32),
    #[error("{0}")]
    InvalidRelation(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, Default)]
pub struct NewTag {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    /// Existing tags of the same user that become parents of the new tag.
    pub parent_tag_ids: Vec<i32>,
}

/// Fields to change on a tag; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct TagChanges {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    pub search: Option<String>,
    pub parent_id: Option<i32>,
}

fn validate_name(name: &str) -> Result<String, TagServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TagServiceError::InvalidInput("Tag name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_TAG_NAME_LEN {
        return Err(TagServiceError::InvalidInput(format!(
            "Tag name cannot exceed {MAX_TAG_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_color(color: &str) -> Result<String, TagServiceError> {
    let color = color.trim();
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(TagServiceError::InvalidInput(format!(
            "Invalid color '{color}', expected #RRGGBB"
        )));
    }
    Ok(color.to_string())
}

/// Maps a unique-index violation on `(user_id, name)` to a name conflict.
fn name_conflict_or_db(err: DbErr, name: &str) -> TagServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => TagServiceError::DuplicateName(name.to_string()),
        _ => TagServiceError::DbErr(err),
    }
}

fn matches_search(tag: &tag::Model, search: &str) -> bool {
    tag.name.contains(search)
        || tag
            .description
            .as_deref()
            .is_some_and(|description| description.contains(search))
}

async fn name_taken<C>(
    conn: &C,
    user_id: i32,
    name: &str,
    except_tag_id: Option<i32>,
) -> Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    let mut query = Tag::find()
        .filter(tag::Column::UserId.eq(user_id))
        .filter(tag::Column::Name.eq(name));
    if let Some(tag_id) = except_tag_id {
        query = query.filter(tag::Column::Id.ne(tag_id));
    }
    Ok(query.one(conn).await?.is_some())
}

/// Loads a tag and checks that `user_id` owns it.
pub async fn find_owned_tag<C>(conn: &C, tag_id: i32, user_id: i32) -> Result<tag::Model, TagServiceError>
where
    C: ConnectionTrait,
{
    let tag = Tag::find_by_id(tag_id)
        .one(conn)
        .await?
        .ok_or(TagServiceError::TagNotFound(tag_id))?;
    if tag.user_id != user_id {
        return Err(TagServiceError::Forbidden);
    }
    Ok(tag)
}

/// Validates and inserts a tag on the caller's connection.
///
/// Callers mutating a user's tags must hold that user's lock.
pub(crate) async fn insert_tag<C>(conn: &C, user_id: i32, new_tag: &NewTag) -> Result<tag::Model, TagServiceError>
where
    C: ConnectionTrait,
{
    let name = validate_name(&new_tag.name)?;
    let color = match new_tag.color.as_deref() {
        Some(color) => validate_color(color)?,
        None => DEFAULT_TAG_COLOR.to_string(),
    };
    if name_taken(conn, user_id, &name, None).await? {
        return Err(TagServiceError::DuplicateName(name));
    }

    let now = Utc::now();
    tag::ActiveModel {
        user_id: Set(user_id),
        name: Set(name.clone()),
        description: Set(new_tag.description.clone()),
        color: Set(color),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(|e| name_conflict_or_db(e, &name))
}

/// Creates a tag, linking it under any listed parents owned by the same user.
///
/// Parents that do not exist or belong to someone else are skipped. The tag
/// and its relations are written in one transaction under the user's lock.
pub async fn create_tag(
    db: &DatabaseConnection,
    locks: &UserLocks,
    user_id: i32,
    new_tag: NewTag,
) -> Result<tag::Model, TagServiceError> {
    let _guard = locks.lock(user_id).await;
    let txn = db.begin().await?;

    let created = insert_tag(&txn, user_id, &new_tag).await?;

    if !new_tag.parent_tag_ids.is_empty() {
        let mut graph = tag_relation_service::load_user_graph(&txn, user_id).await?;
        let mut seen = HashSet::new();
        for parent_id in new_tag.parent_tag_ids {
            if !seen.insert(parent_id) {
                continue;
            }
            let parent = Tag::find_by_id(parent_id)
                .filter(tag::Column::UserId.eq(user_id))
                .one(&txn)
                .await?;
            if parent.is_none() {
                debug!(user_id, parent_id, "Skipping unknown parent tag.");
                continue;
            }

            let check = graph.check_edge(parent_id, created.id);
            if !check.is_valid() {
                return Err(TagServiceError::InvalidRelation(check.reason().to_string()));
            }
            tag_relation_service::insert_relation(&txn, user_id, parent_id, created.id).await?;
            graph.add_edge(parent_id, created.id);
        }
    }

    txn.commit().await?;
    info!(user_id, tag_id = created.id, "Tag created.");
    Ok(created)
}

/// Lists a user's tags ordered by name.
///
/// `search` is a case-sensitive substring match on name or description;
/// `parent_id` restricts the result to direct children of that tag.
pub async fn list_tags<C>(conn: &C, user_id: i32, filter: &TagFilter) -> Result<Vec<tag::Model>, DbErr>
where
    C: ConnectionTrait,
{
    let mut query = Tag::find().filter(tag::Column::UserId.eq(user_id));
    if let Some(parent_id) = filter.parent_id {
        query = query.filter(
            tag::Column::Id.in_subquery(
                Query::select()
                    .column(tag_relation::Column::ChildTagId)
                    .from(tag_relation::Entity)
                    .and_where(tag_relation::Column::ParentTagId.eq(parent_id))
                    .to_owned(),
            ),
        );
    }

    let mut tags = query.all(conn).await?;
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        tags.retain(|tag| matches_search(tag, search));
    }
    tags.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(tags)
}

/// Fetches tags by id, keyed by id.
pub async fn tags_by_ids<C>(conn: &C, ids: &[i32]) -> Result<HashMap<i32, tag::Model>, DbErr>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let tags = Tag::find()
        .filter(tag::Column::Id.is_in(ids.to_vec()))
        .all(conn)
        .await?;
    Ok(tags.into_iter().map(|t| (t.id, t)).collect())
}

/// Groups `(owner_id, tag_id)` join rows into each owner's tags, sorted by name.
pub async fn group_tags<C>(conn: &C, links: &[(i32, i32)]) -> Result<HashMap<i32, Vec<tag::Model>>, DbErr>
where
    C: ConnectionTrait,
{
    let tag_ids: Vec<i32> = links
        .iter()
        .map(|(_, tag_id)| *tag_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let tags = tags_by_ids(conn, &tag_ids).await?;

    let mut grouped: HashMap<i32, Vec<tag::Model>> = HashMap::new();
    for (owner_id, tag_id) in links {
        if let Some(tag) = tags.get(tag_id) {
            grouped.entry(*owner_id).or_default().push(tag.clone());
        }
    }
    for tags in grouped.values_mut() {
        tags.sort_by(|a, b| a.name.cmp(&b.name));
    }
    Ok(grouped)
}

/// Keeps only the ids in `ids` that are tags owned by `user_id`.
pub async fn owned_tag_ids<C>(conn: &C, user_id: i32, ids: &[i32]) -> Result<Vec<i32>, DbErr>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Tag::find()
        .select_only()
        .column(tag::Column::Id)
        .filter(tag::Column::Id.is_in(ids.to_vec()))
        .filter(tag::Column::UserId.eq(user_id))
        .into_tuple::<i32>()
        .all(conn)
        .await
}

/// A tag with its direct parents and children.
pub async fn get_tag_details<C>(conn: &C, tag_id: i32) -> Result<TagDetails, TagServiceError>
where
    C: ConnectionTrait,
{
    let tag = Tag::find_by_id(tag_id)
        .one(conn)
        .await?
        .ok_or(TagServiceError::TagNotFound(tag_id))?;

    let parent_ids: Vec<i32> = TagRelation::find()
        .select_only()
        .column(tag_relation::Column::ParentTagId)
        .filter(tag_relation::Column::ChildTagId.eq(tag_id))
        .into_tuple()
        .all(conn)
        .await?;
    let child_ids: Vec<i32> = TagRelation::find()
        .select_only()
        .column(tag_relation::Column::ChildTagId)
        .filter(tag_relation::Column::ParentTagId.eq(tag_id))
        .into_tuple()
        .all(conn)
        .await?;

    let sorted = |map: HashMap<i32, tag::Model>| {
        let mut tags: Vec<tag::Model> = map.into_values().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    };

    Ok(TagDetails {
        tag,
        parent_tags: sorted(tags_by_ids(conn, &parent_ids).await?),
        child_tags: sorted(tags_by_ids(conn, &child_ids).await?),
    })
}

/// Renames or edits a tag owned by `user_id`.
pub async fn update_tag<C>(
    conn: &C,
    tag_id: i32,
    user_id: i32,
    changes: TagChanges,
) -> Result<tag::Model, TagServiceError>
where
    C: ConnectionTrait,
{
    let existing = find_owned_tag(conn, tag_id, user_id).await?;
    let mut active: tag::ActiveModel = existing.into();

    let mut new_name = None;
    if let Some(name) = changes.name.as_deref() {
        let name = validate_name(name)?;
        if name_taken(conn, user_id, &name, Some(tag_id)).await? {
            return Err(TagServiceError::DuplicateName(name));
        }
        active.name = Set(name.clone());
        new_name = Some(name);
    }
    if let Some(description) = changes.description {
        active.description = Set(description);
    }
    if let Some(color) = changes.color.as_deref() {
        active.color = Set(validate_color(color)?);
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(conn).await.map_err(|e| match &new_name {
        Some(name) => name_conflict_or_db(e, name),
        None => TagServiceError::DbErr(e),
    })?;
    debug!(user_id, tag_id, "Tag updated.");
    Ok(updated)
}

/// Removes a tag, every relation touching it and its content associations.
/// Runs on the caller's connection so it can join an outer transaction.
pub async fn delete_tag_cascade<C>(conn: &C, tag_id: i32) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    let relations = TagRelation::delete_many()
        .filter(
            Condition::any()
                .add(tag_relation::Column::ParentTagId.eq(tag_id))
                .add(tag_relation::Column::ChildTagId.eq(tag_id)),
        )
        .exec(conn)
        .await?;
    ArticleTag::delete_many()
        .filter(article_tag::Column::TagId.eq(tag_id))
        .exec(conn)
        .await?;
    RoadmapTag::delete_many()
        .filter(roadmap_tag::Column::TagId.eq(tag_id))
        .exec(conn)
        .await?;
    MindmapTag::delete_many()
        .filter(mindmap_tag::Column::TagId.eq(tag_id))
        .exec(conn)
        .await?;
    Tag::delete_by_id(tag_id).exec(conn).await?;
    Ok(relations.rows_affected)
}

pub async fn delete_tag(
    db: &DatabaseConnection,
    locks: &UserLocks,
    tag_id: i32,
    user_id: i32,
) -> Result<(), TagServiceError> {
    let _guard = locks.lock(user_id).await;
    let txn = db.begin().await?;
    find_owned_tag(&txn, tag_id, user_id).await?;
    let removed_relations = delete_tag_cascade(&txn, tag_id).await?;
    txn.commit().await?;
    info!(user_id, tag_id, removed_relations, "Tag deleted.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::services::tag_relation_service::{create_relation, get_graph};
    use crate::db::test_support::{insert_user, setup_db};

    fn named(name: &str) -> NewTag {
        NewTag {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_tag_defaults_and_conflict() {
        let db = setup_db().await;
        let locks = UserLocks::new();
        let alice = insert_user(&db, "alice").await;
        let bob = insert_user(&db, "bob").await;

        let rust = create_tag(&db, &locks, alice.id, named("  rust ")).await.unwrap();
        assert_eq!(rust.name, "rust");
        assert_eq!(rust.color, DEFAULT_TAG_COLOR);
        assert_eq!(rust.user_id, alice.id);

        let dup = create_tag(&db, &locks, alice.id, named("rust")).await;
        assert!(matches!(dup, Err(TagServiceError::DuplicateName(name)) if name == "rust"));

        // Names are only unique per user.
        let other = create_tag(&db, &locks, bob.id, named("rust")).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_create_tag_rejects_bad_input() {
        let db = setup_db().await;
        let locks = UserLocks::new();
        let alice = insert_user(&db, "alice").await;

        let empty = create_tag(&db, &locks, alice.id, named("   ")).await;
        assert!(matches!(empty, Err(TagServiceError::InvalidInput(_))));

        let bad_color = NewTag {
            name: "x".to_string(),
            color: Some("blue".to_string()),
            ..Default::default()
        };
        let result = create_tag(&db, &locks, alice.id, bad_color).await;
        assert!(matches!(result, Err(TagServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_create_tag_links_owned_parents_only() {
        let db = setup_db().await;
        let locks = UserLocks::new();
        let alice = insert_user(&db, "alice").await;
        let bob = insert_user(&db, "bob").await;

        let lang = create_tag(&db, &locks, alice.id, named("languages")).await.unwrap();
        let foreign = create_tag(&db, &locks, bob.id, named("bobs")).await.unwrap();

        let rust = create_tag(
            &db,
            &locks,
            alice.id,
            NewTag {
                name: "rust".to_string(),
                parent_tag_ids: vec![lang.id, foreign.id, 9999, lang.id],
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let graph = get_graph(&db, alice.id).await.unwrap();
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].parent_tag_id, lang.id);
        assert_eq!(graph.edges[0].child_tag_id, rust.id);
        assert!(get_graph(&db, bob.id).await.unwrap().edges.is_empty());
    }

    #[tokio::test]
    async fn test_rename_conflict_and_success() {
        let db = setup_db().await;
        let locks = UserLocks::new();
        let alice = insert_user(&db, "alice").await;
        let a = create_tag(&db, &locks, alice.id, named("A")).await.unwrap();
        create_tag(&db, &locks, alice.id, named("B")).await.unwrap();

        let clash = TagChanges {
            name: Some("B".to_string()),
            ..Default::default()
        };
        let result = update_tag(&db, a.id, alice.id, clash).await;
        assert!(matches!(result, Err(TagServiceError::DuplicateName(_))));

        let rename = TagChanges {
            name: Some("Alpha".to_string()),
            ..Default::default()
        };
        let renamed = update_tag(&db, a.id, alice.id, rename).await.unwrap();
        assert_eq!(renamed.name, "Alpha");

        let names: Vec<String> = list_tags(&db, alice.id, &TagFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Alpha".to_string(), "B".to_string()]);

        // Keeping the same name is not a conflict with itself.
        let same = TagChanges {
            name: Some("Alpha".to_string()),
            color: Some("#000000".to_string()),
            ..Default::default()
        };
        assert!(update_tag(&db, a.id, alice.id, same).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_not_found_and_forbidden() {
        let db = setup_db().await;
        let locks = UserLocks::new();
        let alice = insert_user(&db, "alice").await;
        let bob = insert_user(&db, "bob").await;
        let tag = create_tag(&db, &locks, alice.id, named("mine")).await.unwrap();

        let missing = update_tag(&db, 4242, alice.id, TagChanges::default()).await;
        assert!(matches!(missing, Err(TagServiceError::TagNotFound(4242))));

        let stolen = update_tag(&db, tag.id, bob.id, TagChanges::default()).await;
        assert!(matches!(stolen, Err(TagServiceError::Forbidden)));

        let delete = delete_tag(&db, &locks, tag.id, bob.id).await;
        assert!(matches!(delete, Err(TagServiceError::Forbidden)));
    }

    #[tokio::test]
    async fn test_update_description_keep_or_clear() {
        let db = setup_db().await;
        let locks = UserLocks::new();
        let alice = insert_user(&db, "alice").await;
        let tag = create_tag(
            &db,
            &locks,
            alice.id,
            NewTag {
                name: "notes".to_string(),
                description: Some("scratch".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let recolor = TagChanges {
            color: Some("#112233".to_string()),
            ..Default::default()
        };
        let kept = update_tag(&db, tag.id, alice.id, recolor).await.unwrap();
        assert_eq!(kept.description.as_deref(), Some("scratch"));

        let clear = TagChanges {
            description: Some(None),
            ..Default::default()
        };
        let cleared = update_tag(&db, tag.id, alice.id, clear).await.unwrap();
        assert_eq!(cleared.description, None);
        assert_eq!(cleared.color, "#112233");
    }

    #[tokio::test]
    async fn test_list_search_is_case_sensitive_and_sorted() {
        let db = setup_db().await;
        let locks = UserLocks::new();
        let alice = insert_user(&db, "alice").await;
        for (name, description) in [("zeta", "Rust notes"), ("alpha", "rust crates"), ("Rustacean", "")] {
            create_tag(
                &db,
                &locks,
                alice.id,
                NewTag {
                    name: name.to_string(),
                    description: Some(description.to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }

        let filter = TagFilter {
            search: Some("Rust".to_string()),
            ..Default::default()
        };
        let names: Vec<String> = list_tags(&db, alice.id, &filter)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Rustacean".to_string(), "zeta".to_string()]);
    }

    #[tokio::test]
    async fn test_list_children_of_parent() {
        let db = setup_db().await;
        let locks = UserLocks::new();
        let alice = insert_user(&db, "alice").await;
        let root = create_tag(&db, &locks, alice.id, named("root")).await.unwrap();
        let child = create_tag(&db, &locks, alice.id, named("child")).await.unwrap();
        create_tag(&db, &locks, alice.id, named("loner")).await.unwrap();
        create_relation(&db, &locks, alice.id, root.id, child.id).await.unwrap();

        let filter = TagFilter {
            parent_id: Some(root.id),
            ..Default::default()
        };
        let children = list_tags(&db, alice.id, &filter).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, child.id);

        let details = get_tag_details(&db, child.id).await.unwrap();
        assert_eq!(details.parent_tags.len(), 1);
        assert_eq!(details.parent_tags[0].id, root.id);
        assert!(details.child_tags.is_empty());
    }

    #[tokio::test]
    async fn test_delete_tag_cascades_relations() {
        let db = setup_db().await;
        let locks = UserLocks::new();
        let alice = insert_user(&db, "alice").await;
        let a = create_tag(&db, &locks, alice.id, named("A")).await.unwrap();
        let b = create_tag(&db, &locks, alice.id, named("B")).await.unwrap();
        let c = create_tag(&db, &locks, alice.id, named("C")).await.unwrap();
        create_relation(&db, &locks, alice.id, a.id, b.id).await.unwrap();
        create_relation(&db, &locks, alice.id, b.id, c.id).await.unwrap();
        create_relation(&db, &locks, alice.id, a.id, c.id).await.unwrap();

        delete_tag(&db, &locks, b.id, alice.id).await.unwrap();

        let graph = get_graph(&db, alice.id).await.unwrap();
        let node_ids: HashSet<i32> = graph.nodes.iter().map(|t| t.id).collect();
        assert!(!node_ids.contains(&b.id));
        assert_eq!(graph.edges.len(), 1);
        for edge in &graph.edges {
            assert!(node_ids.contains(&edge.parent_tag_id));
            assert!(node_ids.contains(&edge.child_tag_id));
        }

        let again = delete_tag(&db, &locks, b.id, alice.id).await;
        assert!(matches!(again, Err(TagServiceError::TagNotFound(_))));
    }
}
