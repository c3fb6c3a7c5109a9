//! Creates the tables and indexes on startup.
//!
//! Tables are derived from the entity definitions, so the same bootstrap runs
//! against Postgres in production and SQLite in tests.

use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema};
use tracing::info;

use crate::db::entities::{
    article, article_tag, mindmap, mindmap_tag, roadmap, roadmap_tag, tag, tag_relation, upload,
    user,
};

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait + Copy,
{
    let backend = db.get_database_backend();
    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(backend.build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        db.execute(backend.build(&index)).await?;
    }
    Ok(())
}

async fn create_index(db: &DatabaseConnection, mut index: IndexCreateStatement) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    index.if_not_exists();
    db.execute(backend.build(&index)).await?;
    Ok(())
}

/// Creates every table in dependency order, then the composite unique indexes.
pub async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, user::Entity).await?;
    create_table(db, &schema, tag::Entity).await?;
    create_table(db, &schema, tag_relation::Entity).await?;
    create_table(db, &schema, roadmap::Entity).await?;
    create_table(db, &schema, mindmap::Entity).await?;
    create_table(db, &schema, article::Entity).await?;
    create_table(db, &schema, article_tag::Entity).await?;
    create_table(db, &schema, roadmap_tag::Entity).await?;
    create_table(db, &schema, mindmap_tag::Entity).await?;
    create_table(db, &schema, upload::Entity).await?;

    create_index(
        db,
        Index::create()
            .name("unique_user_tag")
            .table(tag::Entity)
            .col(tag::Column::UserId)
            .col(tag::Column::Name)
            .unique()
            .to_owned(),
    )
    .await?;
    create_index(
        db,
        Index::create()
            .name("unique_tag_relation")
            .table(tag_relation::Entity)
            .col(tag_relation::Column::ParentTagId)
            .col(tag_relation::Column::ChildTagId)
            .unique()
            .to_owned(),
    )
    .await?;

    info!("Database schema is up to date.");
    Ok(())
}
