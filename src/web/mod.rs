use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Method,
    middleware as axum_middleware,
    routing::get,
};
use sea_orm::DatabaseConnection;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_status::SetStatus;
use tower_http::trace::TraceLayer;

use crate::server::config::ServerConfig;
use crate::server::user_locks::UserLocks;
use crate::services::file_storage::FileStorage;
use crate::web::{middleware::auth, routes::*};

pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;

#[cfg(test)]
mod tests;

pub use error::AppError;
pub use extract::AppJson;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub config: Arc<ServerConfig>,
    pub user_locks: UserLocks,
    pub storage: FileStorage,
}

impl AppState {
    pub fn new(db_pool: DatabaseConnection, config: Arc<ServerConfig>) -> Self {
        let storage = FileStorage::new(&config.upload_dir);
        Self {
            db_pool,
            config,
            user_locks: UserLocks::new(),
            storage,
        }
    }
}

async fn health_check_handler() -> &'static str {
    "OK"
}

/// Public routes get `optional_auth`, protected ones `auth`, both under the same prefix.
fn split_router(
    app_state: &Arc<AppState>,
    public: Router<Arc<AppState>>,
    protected: Router<Arc<AppState>>,
) -> Router<Arc<AppState>> {
    public
        .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::optional_auth))
        .merge(protected.route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth)))
}

/// Serves `static_dir`, answering unknown paths with `index.html`.
pub fn create_static_file_service(static_dir: &str) -> ServeDir<SetStatus<ServeFile>> {
    ServeDir::new(static_dir).not_found_service(ServeFile::new(Path::new(static_dir).join("index.html")))
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    // Layers added later run first, so `auth` wraps `require_admin`.
    let admin_protected = admin_routes::create_protected_router()
        .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth));

    Router::new()
        .route("/api/health", get(health_check_handler))
        .nest(
            "/api/auth",
            split_router(
                &app_state,
                auth_routes::create_public_router(),
                auth_routes::create_protected_router(),
            ),
        )
        .nest(
            "/api/tags",
            split_router(
                &app_state,
                tag_routes::create_public_router(),
                tag_routes::create_protected_router(),
            ),
        )
        .nest(
            "/api/articles",
            split_router(
                &app_state,
                article_routes::create_public_router(),
                article_routes::create_protected_router(),
            ),
        )
        .nest(
            "/api/roadmaps",
            split_router(
                &app_state,
                roadmap_routes::create_public_router(),
                roadmap_routes::create_protected_router(),
            ),
        )
        .nest(
            "/api/mindmaps",
            split_router(
                &app_state,
                mindmap_routes::create_public_router(),
                mindmap_routes::create_protected_router(),
            ),
        )
        .nest(
            "/api/upload",
            upload_routes::create_uploads_router()
                .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth)),
        )
        .nest(
            "/api/admin",
            admin_routes::create_public_router().merge(admin_protected),
        )
        .nest_service("/uploads", ServeDir::new(&app_state.config.upload_dir))
        .fallback_service(create_static_file_service(&app_state.config.static_dir))
        .layer(DefaultBodyLimit::max(app_state.config.max_upload_bytes))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
