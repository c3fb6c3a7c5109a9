//! SeaORM entities.
//!
//! Each table is defined in its own module; the prelude re-exports the entity
//! types under table-like names.

pub mod article;
pub mod article_tag;
pub mod mindmap;
pub mod mindmap_tag;
pub mod roadmap;
pub mod roadmap_tag;
pub mod tag;
pub mod tag_relation;
pub mod upload;
pub mod user;

pub mod prelude {
    pub use super::user::Entity as User;
    pub use super::user::Model as UserModel;

    pub use super::tag::Entity as Tag;
    pub use super::tag::Model as TagModel;

    pub use super::tag_relation::Entity as TagRelation;
    pub use super::tag_relation::Model as TagRelationModel;

    pub use super::article::Entity as Article;
    pub use super::article::Model as ArticleModel;
    pub use super::article_tag::Entity as ArticleTag;

    pub use super::roadmap::Entity as Roadmap;
    pub use super::roadmap::Model as RoadmapModel;
    pub use super::roadmap_tag::Entity as RoadmapTag;

    pub use super::mindmap::Entity as Mindmap;
    pub use super::mindmap::Model as MindmapModel;
    pub use super::mindmap_tag::Entity as MindmapTag;

    pub use super::upload::Entity as Upload;
    pub use super::upload::Model as UploadModel;
}
