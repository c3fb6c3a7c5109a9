use chrono::Utc;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::content;
use crate::db::entities::{article, article_tag, mindmap, prelude::*, roadmap, tag};
use crate::db::enums::ContentStatus;
use crate::db::models::{ArticleView, Page, Pagination};
use crate::db::services::{ContentError, ListQuery, next_published_at, require_title, tag_service, user_service};

const KIND: &str = "Article";

#[derive(Debug, Clone, Default)]
pub struct NewArticle {
    pub title: String,
    pub content: Value,
    pub content_html: Option<String>,
    pub excerpt: Option<String>,
    pub status: ContentStatus,
    pub tag_ids: Vec<i32>,
    pub roadmap_id: Option<i32>,
    pub mindmap_id: Option<i32>,
}

/// Partial update of an article; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub content: Option<Value>,
    pub content_html: Option<String>,
    pub excerpt: Option<String>,
    pub status: Option<ContentStatus>,
    pub tag_ids: Option<Vec<i32>>,
    pub roadmap_id: Option<i32>,
    pub mindmap_id: Option<i32>,
}

async fn tags_for<C>(conn: &C, article_ids: &[i32]) -> Result<HashMap<i32, Vec<tag::Model>>, DbErr>
where
    C: ConnectionTrait,
{
    if article_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let links: Vec<(i32, i32)> = ArticleTag::find()
        .select_only()
        .column(article_tag::Column::ArticleId)
        .column(article_tag::Column::TagId)
        .filter(article_tag::Column::ArticleId.is_in(article_ids.to_vec()))
        .into_tuple()
        .all(conn)
        .await?;
    tag_service::group_tags(conn, &links).await
}

pub(crate) async fn into_views<C>(
    conn: &C,
    articles: Vec<article::Model>,
    include_content: bool,
) -> Result<Vec<ArticleView>, DbErr>
where
    C: ConnectionTrait,
{
    let ids: Vec<i32> = articles.iter().map(|a| a.id).collect();
    let author_ids: Vec<i32> = articles
        .iter()
        .map(|a| a.user_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let mut tags = tags_for(conn, &ids).await?;
    let authors = user_service::profiles_by_ids(conn, &author_ids).await?;

    Ok(articles
        .into_iter()
        .map(|article| {
            let tags = tags.remove(&article.id).unwrap_or_default();
            let author = authors.get(&article.user_id).cloned();
            ArticleView::new(article, include_content, author, tags)
        })
        .collect())
}

pub(crate) async fn into_view<C>(conn: &C, article: article::Model) -> Result<ArticleView, ContentError>
where
    C: ConnectionTrait,
{
    into_views(conn, vec![article], true)
        .await?
        .pop()
        .ok_or(ContentError::NotFound(KIND))
}

/// Replaces an article's tags with the ids in `tag_ids` that `user_id` owns.
pub(crate) async fn replace_tags<C>(conn: &C, article_id: i32, user_id: i32, tag_ids: &[i32]) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    ArticleTag::delete_many()
        .filter(article_tag::Column::ArticleId.eq(article_id))
        .exec(conn)
        .await?;

    let owned = tag_service::owned_tag_ids(conn, user_id, tag_ids).await?;
    if owned.is_empty() {
        return Ok(());
    }
    let now = Utc::now();
    let rows = owned.into_iter().map(|tag_id| article_tag::ActiveModel {
        article_id: Set(article_id),
        tag_id: Set(tag_id),
        created_at: Set(now),
    });
    ArticleTag::insert_many(rows).exec_without_returning(conn).await?;
    Ok(())
}

async fn check_links<C>(
    conn: &C,
    user_id: i32,
    roadmap_id: Option<i32>,
    mindmap_id: Option<i32>,
) -> Result<(), ContentError>
where
    C: ConnectionTrait,
{
    if let Some(id) = roadmap_id {
        let found = Roadmap::find_by_id(id)
            .filter(roadmap::Column::UserId.eq(user_id))
            .one(conn)
            .await?;
        if found.is_none() {
            return Err(ContentError::InvalidInput(format!("Roadmap {id} does not exist")));
        }
    }
    if let Some(id) = mindmap_id {
        let found = Mindmap::find_by_id(id)
            .filter(mindmap::Column::UserId.eq(user_id))
            .one(conn)
            .await?;
        if found.is_none() {
            return Err(ContentError::InvalidInput(format!("Mindmap {id} does not exist")));
        }
    }
    Ok(())
}

async fn find_owned<C>(conn: &C, article_id: i32, user_id: i32) -> Result<article::Model, ContentError>
where
    C: ConnectionTrait,
{
    let article = Article::find_by_id(article_id)
        .one(conn)
        .await?
        .ok_or(ContentError::NotFound(KIND))?;
    if article.user_id != user_id {
        return Err(ContentError::Forbidden(KIND));
    }
    Ok(article)
}

/// Lists articles with the given status, newest publication first.
pub async fn list_articles<C>(conn: &C, query: &ListQuery) -> Result<Page<ArticleView>, ContentError>
where
    C: ConnectionTrait,
{
    let (page, limit) = query.page_and_limit();

    let mut select = Article::find().filter(article::Column::Status.eq(query.status));
    if let Some(user_id) = query.user_id {
        select = select.filter(article::Column::UserId.eq(user_id));
    }
    if let Some(tag_id) = query.tag_id {
        select = select.filter(
            article::Column::Id.in_subquery(
                Query::select()
                    .column(article_tag::Column::ArticleId)
                    .from(article_tag::Entity)
                    .and_where(article_tag::Column::TagId.eq(tag_id))
                    .to_owned(),
            ),
        );
    }
    if let Some(search) = query.search_term() {
        select = select.filter(
            Condition::any()
                .add(article::Column::Title.contains(search))
                .add(article::Column::Excerpt.contains(search)),
        );
    }

    let paginator = select
        .order_by_desc(article::Column::PublishedAt)
        .order_by_desc(article::Column::CreatedAt)
        .order_by_desc(article::Column::Id)
        .paginate(conn, limit);
    let totals = paginator.num_items_and_pages().await?;
    let articles = paginator.fetch_page(page - 1).await?;

    Ok(Page {
        items: into_views(conn, articles, false).await?,
        pagination: Pagination::new(page, limit, totals.number_of_items, totals.number_of_pages),
    })
}

/// Fetches an article for `viewer`. Unpublished articles are only visible to
/// their author; a view by anyone else is counted.
pub async fn get_article<C>(conn: &C, article_id: i32, viewer: Option<i32>) -> Result<ArticleView, ContentError>
where
    C: ConnectionTrait,
{
    let mut article = Article::find_by_id(article_id)
        .one(conn)
        .await?
        .ok_or(ContentError::NotFound(KIND))?;

    let is_author = viewer == Some(article.user_id);
    if article.status != ContentStatus::Published && !is_author {
        return Err(ContentError::Forbidden(KIND));
    }
    if !is_author {
        Article::update_many()
            .col_expr(article::Column::ViewCount, Expr::col(article::Column::ViewCount).add(1))
            .filter(article::Column::Id.eq(article_id))
            .exec(conn)
            .await?;
        article.view_count += 1;
    }

    into_view(conn, article).await
}

pub async fn create_article(
    db: &DatabaseConnection,
    user_id: i32,
    new_article: NewArticle,
) -> Result<ArticleView, ContentError> {
    let title = require_title(&new_article.title)?;
    if content::is_blank(&new_article.content) {
        return Err(ContentError::InvalidInput("Content is required".to_string()));
    }
    let body = content::normalize_rich_text(new_article.content);

    let txn = db.begin().await?;
    check_links(&txn, user_id, new_article.roadmap_id, new_article.mindmap_id).await?;

    let now = Utc::now();
    let created = article::ActiveModel {
        user_id: Set(user_id),
        title: Set(title),
        content: Set(body),
        content_html: Set(new_article.content_html),
        excerpt: Set(new_article.excerpt),
        status: Set(new_article.status),
        is_tag_article: Set(false),
        roadmap_id: Set(new_article.roadmap_id),
        mindmap_id: Set(new_article.mindmap_id),
        view_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        published_at: Set(next_published_at(None, None, new_article.status, now)),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    replace_tags(&txn, created.id, user_id, &new_article.tag_ids).await?;

    let view = into_view(&txn, created).await?;
    txn.commit().await?;
    info!(user_id, article_id = view.id, "Article created.");
    Ok(view)
}

pub async fn update_article(
    db: &DatabaseConnection,
    article_id: i32,
    user_id: i32,
    changes: ArticleChanges,
) -> Result<ArticleView, ContentError> {
    let txn = db.begin().await?;
    let existing = find_owned(&txn, article_id, user_id).await?;
    let previous_status = existing.status;
    let published_at = existing.published_at;
    let mut active: article::ActiveModel = existing.into();
    let now = Utc::now();

    if let Some(title) = changes.title {
        active.title = Set(require_title(&title)?);
    }
    if let Some(body) = changes.content {
        if content::is_blank(&body) {
            return Err(ContentError::InvalidInput("Content cannot be empty".to_string()));
        }
        active.content = Set(content::normalize_rich_text(body));
    }
    if let Some(html) = changes.content_html {
        active.content_html = Set(Some(html));
    }
    if let Some(excerpt) = changes.excerpt {
        active.excerpt = Set(Some(excerpt));
    }
    check_links(&txn, user_id, changes.roadmap_id, changes.mindmap_id).await?;
    if let Some(roadmap_id) = changes.roadmap_id {
        active.roadmap_id = Set(Some(roadmap_id));
    }
    if let Some(mindmap_id) = changes.mindmap_id {
        active.mindmap_id = Set(Some(mindmap_id));
    }
    if let Some(status) = changes.status {
        active.status = Set(status);
        active.published_at = Set(next_published_at(Some(previous_status), published_at, status, now));
    }
    active.updated_at = Set(now);

    let updated = active.update(&txn).await?;
    if let Some(tag_ids) = changes.tag_ids {
        replace_tags(&txn, article_id, user_id, &tag_ids).await?;
    }

    let view = into_view(&txn, updated).await?;
    txn.commit().await?;
    info!(user_id, article_id, "Article updated.");
    Ok(view)
}

pub async fn publish_article(
    db: &DatabaseConnection,
    article_id: i32,
    user_id: i32,
) -> Result<ArticleView, ContentError> {
    let changes = ArticleChanges {
        status: Some(ContentStatus::Published),
        ..Default::default()
    };
    update_article(db, article_id, user_id, changes).await
}

pub async fn delete_article(db: &DatabaseConnection, article_id: i32, user_id: i32) -> Result<(), ContentError> {
    let txn = db.begin().await?;
    find_owned(&txn, article_id, user_id).await?;
    ArticleTag::delete_many()
        .filter(article_tag::Column::ArticleId.eq(article_id))
        .exec(&txn)
        .await?;
    Article::delete_by_id(article_id).exec(&txn).await?;
    txn.commit().await?;
    info!(user_id, article_id, "Article deleted.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::services::tag_service::{NewTag, create_tag};
    use crate::db::test_support::{insert_user, setup_db};
    use crate::server::user_locks::UserLocks;
    use serde_json::json;

    fn published(title: &str, body: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            content: Value::String(body.to_string()),
            status: ContentStatus::Published,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_wraps_plain_text_and_keeps_owned_tags() {
        let db = setup_db().await;
        let locks = UserLocks::new();
        let alice = insert_user(&db, "alice").await;
        let bob = insert_user(&db, "bob").await;
        let mine = create_tag(&db, &locks, alice.id, NewTag { name: "mine".into(), ..Default::default() })
            .await
            .unwrap();
        let theirs = create_tag(&db, &locks, bob.id, NewTag { name: "theirs".into(), ..Default::default() })
            .await
            .unwrap();

        let mut new_article = published("Hello", "plain words");
        new_article.tag_ids = vec![mine.id, theirs.id];
        let view = create_article(&db, alice.id, new_article).await.unwrap();

        assert_eq!(view.content, Some(content::paragraph_doc("plain words")));
        assert!(view.published_at.is_some());
        assert_eq!(view.tags.len(), 1);
        assert_eq!(view.tags[0].id, mine.id);
        assert_eq!(view.author.as_ref().map(|a| a.username.as_str()), Some("alice"));
    }

    #[tokio::test]
    async fn test_create_requires_title_and_content() {
        let db = setup_db().await;
        let alice = insert_user(&db, "alice").await;

        let no_title = create_article(&db, alice.id, published("  ", "body")).await;
        assert!(matches!(no_title, Err(ContentError::InvalidInput(_))));

        let no_body = NewArticle {
            title: "Title".into(),
            content: json!({}),
            ..Default::default()
        };
        let result = create_article(&db, alice.id, no_body).await;
        assert!(matches!(result, Err(ContentError::InvalidInput(_))));

        let bad_link = NewArticle {
            roadmap_id: Some(404),
            ..published("Linked", "body")
        };
        let result = create_article(&db, alice.id, bad_link).await;
        assert!(matches!(result, Err(ContentError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let db = setup_db().await;
        let locks = UserLocks::new();
        let alice = insert_user(&db, "alice").await;
        let rust = create_tag(&db, &locks, alice.id, NewTag { name: "rust".into(), ..Default::default() })
            .await
            .unwrap();

        for i in 0..5 {
            let mut new_article = published(&format!("Post {i}"), "body");
            if i % 2 == 0 {
                new_article.tag_ids = vec![rust.id];
            }
            create_article(&db, alice.id, new_article).await.unwrap();
        }
        let draft = NewArticle {
            status: ContentStatus::Draft,
            ..published("Secret draft", "body")
        };
        create_article(&db, alice.id, draft).await.unwrap();

        let first = list_articles(&db, &ListQuery { limit: 2, ..Default::default() }).await.unwrap();
        assert_eq!(first.pagination.total, 5);
        assert_eq!(first.pagination.pages, 3);
        assert!(first.pagination.has_next);
        assert_eq!(first.items.len(), 2);
        assert!(first.items.iter().all(|a| a.content.is_none()));

        let tagged = list_articles(&db, &ListQuery { tag_id: Some(rust.id), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(tagged.pagination.total, 3);

        let drafts = list_articles(
            &db,
            &ListQuery {
                status: ContentStatus::Draft,
                search: Some("Secret".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(drafts.items.len(), 1);
        assert_eq!(drafts.items[0].title, "Secret draft");
    }

    #[tokio::test]
    async fn test_visibility_and_view_counting() {
        let db = setup_db().await;
        let alice = insert_user(&db, "alice").await;
        let bob = insert_user(&db, "bob").await;

        let draft = NewArticle {
            status: ContentStatus::Draft,
            ..published("Draft", "body")
        };
        let draft = create_article(&db, alice.id, draft).await.unwrap();
        assert!(draft.published_at.is_none());

        let denied = get_article(&db, draft.id, Some(bob.id)).await;
        assert!(matches!(denied, Err(ContentError::Forbidden(_))));
        let anonymous = get_article(&db, draft.id, None).await;
        assert!(matches!(anonymous, Err(ContentError::Forbidden(_))));

        let own = get_article(&db, draft.id, Some(alice.id)).await.unwrap();
        assert_eq!(own.view_count, 0);

        let published = publish_article(&db, draft.id, alice.id).await.unwrap();
        assert!(published.published_at.is_some());

        let seen = get_article(&db, draft.id, Some(bob.id)).await.unwrap();
        assert_eq!(seen.view_count, 1);
        let seen = get_article(&db, draft.id, None).await.unwrap();
        assert_eq!(seen.view_count, 2);

        let missing = get_article(&db, 999, None).await;
        assert!(matches!(missing, Err(ContentError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete_are_owner_only() {
        let db = setup_db().await;
        let alice = insert_user(&db, "alice").await;
        let bob = insert_user(&db, "bob").await;
        let article = create_article(&db, alice.id, published("Mine", "body")).await.unwrap();

        let hijack = ArticleChanges {
            title: Some("Stolen".into()),
            ..Default::default()
        };
        let result = update_article(&db, article.id, bob.id, hijack).await;
        assert!(matches!(result, Err(ContentError::Forbidden(_))));

        let rename = ArticleChanges {
            title: Some("Renamed".into()),
            content: Some(json!({"type": "doc", "content": []})),
            ..Default::default()
        };
        let updated = update_article(&db, article.id, alice.id, rename).await.unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.published_at, article.published_at);

        let result = delete_article(&db, article.id, bob.id).await;
        assert!(matches!(result, Err(ContentError::Forbidden(_))));
        delete_article(&db, article.id, alice.id).await.unwrap();
        assert!(matches!(
            get_article(&db, article.id, Some(alice.id)).await,
            Err(ContentError::NotFound(_))
        ));
    }
}
