pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::access_service::AccessService;
use crate::services::document_service::DocumentService;
use crate::services::link_service::LinkService;
use crate::services::stats_service::StatsService;
use crate::services::storage::StorageService;
use crate::utils::clock::Clock;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::documents::upload_document,
        api::handlers::documents::list_documents,
        api::handlers::documents::delete_document,
        api::handlers::links::create_link,
        api::handlers::links::list_links,
        api::handlers::links::revoke_link,
        api::handlers::links::delete_link,
        api::handlers::links::link_stats,
        api::handlers::view::view_link,
        api::handlers::view::fetch_file,
        api::handlers::dashboard::dashboard_stats,
        api::handlers::dashboard::admin_stats,
        api::handlers::dashboard::admin_revoke_link,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::auth::AuthRequest,
            api::handlers::auth::AuthResponse,
            api::handlers::documents::DocumentResponse,
            api::handlers::documents::DeleteDocumentResponse,
            api::handlers::links::CreateLinkRequest,
            api::handlers::links::LinkResponse,
            api::handlers::links::AccessLogEntryResponse,
            api::handlers::links::ViewerSessionResponse,
            api::handlers::links::LinkStatsResponse,
            api::handlers::view::ViewResponse,
            api::handlers::view::Watermark,
            services::stats_service::DashboardStats,
            services::stats_service::PlatformStats,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "auth", description = "Authentication endpoints"),
        (name = "documents", description = "Document registry endpoints"),
        (name = "links", description = "Share link lifecycle endpoints"),
        (name = "view", description = "Public viewer endpoints"),
        (name = "dashboard", description = "Owner and admin statistics"),
        (name = "system", description = "Health and diagnostics")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub clock: Arc<dyn Clock>,
    pub access_service: Arc<AccessService>,
    pub link_service: Arc<LinkService>,
    pub document_service: Arc<DocumentService>,
    pub stats_service: Arc<StatsService>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn StorageService>,
        clock: Arc<dyn Clock>,
        config: AppConfig,
    ) -> Self {
        Self {
            access_service: Arc::new(AccessService::new(
                db.clone(),
                clock.clone(),
                config.access_log_cap,
            )),
            link_service: Arc::new(LinkService::new(db.clone(), clock.clone())),
            document_service: Arc::new(DocumentService::new(
                db.clone(),
                storage.clone(),
                clock.clone(),
            )),
            stats_service: Arc::new(StatsService::new(db.clone(), clock.clone())),
            clock,
            db,
            storage,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = if state.config.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .route("/register", post(api::handlers::auth::register))
        .route("/login", post(api::handlers::auth::login))
        .route("/view/:token", get(api::handlers::view::view_link))
        .route("/view/:token/file", get(api::handlers::view::fetch_file))
        .route(
            "/documents",
            get(api::handlers::documents::list_documents)
                .post(api::handlers::documents::upload_document)
                .layer(axum::extract::DefaultBodyLimit::max(
                    state.config.max_file_size + 1024 * 1024,
                ))
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .route(
            "/documents/:id",
            axum::routing::delete(api::handlers::documents::delete_document).layer(
                from_fn_with_state(state.clone(), api::middleware::auth::auth_middleware),
            ),
        )
        .route(
            "/links",
            get(api::handlers::links::list_links)
                .post(api::handlers::links::create_link)
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .route(
            "/links/:id",
            axum::routing::delete(api::handlers::links::delete_link).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/links/:id/revoke",
            post(api::handlers::links::revoke_link).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/links/:id/stats",
            get(api::handlers::links::link_stats).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/dashboard/stats",
            get(api::handlers::dashboard::dashboard_stats).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/admin/stats",
            get(api::handlers::dashboard::admin_stats).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/admin/links/:id/revoke",
            post(api::handlers::dashboard::admin_revoke_link).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .layer(cors)
        .with_state(state)
}
