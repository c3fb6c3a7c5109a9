pub mod admin_routes;
pub mod article_routes;
pub mod auth_routes;
pub mod mindmap_routes;
pub mod roadmap_routes;
pub mod tag_routes;
pub mod upload_routes;
