//! Equipment lending backend
//!
//! Stock ledger for warehouse equipment borrowed against projects, with damage
//! reports, warranties, lending reports and an audit trail.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowMethods, Any, CorsLayer},
};
use utoipa::ToSchema;

use crate::auth::{AuthRouterExt, AuthService, Capability};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Wires services, the account service and shared handles around one pool.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender.clone());
        let auth = services.auth_service(db.clone(), &config);
        Self {
            db,
            config,
            event_sender,
            services,
            auth,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// `/api/v1` routes, each group gated on the capability it needs.
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{
        categories, damage_reports, items, lending, projects, reports, users, warranties,
    };

    let catalog_read = Router::new()
        .route("/items", get(items::list_items))
        .route("/items/:id", get(items::get_item))
        .route("/categories", get(categories::list_categories))
        .route("/categories/:id", get(categories::get_category))
        .route("/projects", get(projects::list_projects))
        .route("/projects/:id", get(projects::get_project))
        .route(
            "/projects/filter-month/:year/:month",
            get(projects::list_projects_by_month),
        )
        .with_capability(Capability::ViewCatalog);

    let borrowing = Router::new()
        .route("/transactions/borrow", post(lending::borrow_item))
        .route("/transactions/borrows", get(lending::list_my_borrows))
        .route("/transactions/borrows/:id", get(lending::get_borrow))
        .with_capability(Capability::BorrowItems);

    let returning = Router::new()
        .route("/transactions/return", post(lending::return_item))
        .route("/transactions/returns", get(lending::list_my_returns))
        .with_capability(Capability::ReturnItems);

    let damage_report = Router::new()
        .route(
            "/damage-reports",
            post(damage_reports::create_damage_report),
        )
        .with_capability(Capability::ReportDamage);

    let damage_read = Router::new()
        .route("/damage-reports", get(damage_reports::list_damage_reports))
        .route(
            "/damage-reports/:id",
            get(damage_reports::get_damage_report),
        )
        .with_capability(Capability::ViewDamageReports);

    let damage_review = Router::new()
        .route(
            "/damage-reports/:id/status",
            put(damage_reports::update_damage_status),
        )
        .with_capability(Capability::ReviewDamage);

    let catalog_manage = Router::new()
        .route("/items", post(items::create_item))
        .route(
            "/items/:id",
            put(items::update_item).delete(items::delete_item),
        )
        .route("/categories", post(categories::create_category))
        .route(
            "/categories/:id",
            put(categories::update_category).delete(categories::delete_category),
        )
        .with_capability(Capability::ManageCatalog);

    let projects_manage = Router::new()
        .route("/projects", post(projects::create_project))
        .route(
            "/projects/:id",
            put(projects::update_project).delete(projects::delete_project),
        )
        .with_capability(Capability::ManageProjects);

    let users_manage = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", get(users::get_user).delete(users::delete_user))
        .route("/users/:id/role", put(users::update_user_role))
        .with_capability(Capability::ManageUsers);

    let warranties_manage = Router::new()
        .route(
            "/warranties",
            get(warranties::list_warranties).post(warranties::create_warranty),
        )
        .route(
            "/warranties/:id",
            get(warranties::get_warranty)
                .put(warranties::update_warranty)
                .delete(warranties::delete_warranty),
        )
        .with_capability(Capability::ManageWarranties);

    let admin_reports = Router::new()
        .route(
            "/admin/transactions/borrows",
            get(lending::admin_list_borrows),
        )
        .route(
            "/admin/transactions/borrows/project/:project_id",
            get(lending::admin_list_project_borrows),
        )
        .route(
            "/admin/transactions/returns",
            get(lending::admin_list_returns),
        )
        .route("/admin/inventory-summary", get(reports::inventory_summary))
        .route("/admin/summary-table", get(reports::summary_table))
        .route("/admin/audit-logs", get(reports::list_audit_logs))
        .with_capability(Capability::ViewLendingReports);

    Router::new()
        .merge(catalog_read)
        .merge(borrowing)
        .merge(returning)
        .merge(damage_report)
        .merge(damage_read)
        .merge(damage_review)
        .merge(catalog_manage)
        .merge(projects_manage)
        .merge(users_manage)
        .merge(warranties_manage)
        .merge(admin_reports)
}

/// Public account routes plus `/auth/me`.
pub fn auth_routes() -> Router<AppState> {
    use handlers::auth;

    let me = Router::new()
        .route("/me", get(auth::current_user))
        .with_auth();

    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh_token))
        .route(
            "/password-reset/request",
            post(auth::request_password_reset),
        )
        .route(
            "/password-reset/confirm",
            post(auth::confirm_password_reset),
        )
        .merge(me)
}

/// CORS from config: explicit origins, or permissive in development or when opted in.
pub fn cors_layer(cfg: &config::AppConfig) -> Result<CorsLayer, errors::ServiceError> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    let max_age = std::time::Duration::from_secs(cfg.cors_max_age_secs);
    if let Some(origins) = configured_origins {
        let layer = CorsLayer::new().allow_origin(origins).max_age(max_age);
        // Wildcards are not allowed alongside credentials
        Ok(if cfg.cors_allow_credentials {
            layer
                .allow_methods(AllowMethods::mirror_request())
                .allow_headers(AllowHeaders::mirror_request())
                .allow_credentials(true)
        } else {
            layer.allow_methods(Any).allow_headers(Any)
        })
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        Ok(CorsLayer::permissive().max_age(max_age))
    } else {
        Err(errors::ServiceError::InternalError(
            "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
        ))
    }
}

/// Full application router with every layer applied.
///
/// Layers, outermost first: request id, auth service injection, CORS,
/// compression, HTTP trace, audit.
pub fn build_app(state: AppState) -> Result<Router, errors::ServiceError> {
    let cors = cors_layer(&state.config)?;
    let auth_service = state.auth.clone();

    Ok(Router::<AppState>::new()
        .route("/", get(api_status))
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes())
        .nest("/auth", auth_routes())
        .merge(openapi::swagger_ui())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware_helpers::audit_middleware,
        ))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        // Inject AuthService into request extensions for auth middleware
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            |State(auth): State<Arc<AuthService>>,
             mut req: axum::extract::Request,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state))
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "equipment-lending",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<Value>>) {
    let healthy = db::check_connection(&state.db).await.is_ok();
    let health_data = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "checks": {
            "database": if healthy { "healthy" } else { "unhealthy" },
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ApiResponse::success(health_data)))
}
