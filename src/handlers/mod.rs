pub mod auth;
pub mod categories;
pub mod common;
pub mod damage_reports;
pub mod items;
pub mod lending;
pub mod projects;
pub mod reports;
pub mod users;
pub mod warranties;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::{
    auth::AuthService,
    events::EventSender,
    services::{
        audit::AuditService, categories::CategoryService, damage_reports::DamageReportService,
        items::ItemService, lending::LendingService, projects::ProjectService,
        reports::ReportService, users::UserService, warranties::WarrantyService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub lending: Arc<LendingService>,
    pub reports: Arc<ReportService>,
    pub categories: Arc<CategoryService>,
    pub items: Arc<ItemService>,
    pub projects: Arc<ProjectService>,
    pub damage_reports: Arc<DamageReportService>,
    pub warranties: Arc<WarrantyService>,
    pub users: Arc<UserService>,
    pub audit: Arc<AuditService>,
}

impl AppServices {
    /// Wires every service against one pool and event channel.
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        let audit = Arc::new(AuditService::new(db.clone()));
        Self {
            lending: Arc::new(LendingService::new(db.clone(), event_sender.clone())),
            reports: Arc::new(ReportService::new(db.clone())),
            categories: Arc::new(CategoryService::new(db.clone())),
            items: Arc::new(ItemService::new(db.clone(), audit.clone())),
            projects: Arc::new(ProjectService::new(db.clone())),
            damage_reports: Arc::new(DamageReportService::new(db.clone(), event_sender)),
            warranties: Arc::new(WarrantyService::new(db.clone())),
            users: Arc::new(UserService::new(db, audit.clone())),
            audit,
        }
    }

    /// Builds the account service on top of the shared user and audit services.
    pub fn auth_service(
        &self,
        db: Arc<DatabaseConnection>,
        config: &crate::config::AppConfig,
    ) -> Arc<AuthService> {
        Arc::new(AuthService::new(
            db,
            crate::auth::TokenSigner::from_config(config),
            self.users.clone(),
            self.audit.clone(),
            chrono::Duration::seconds(config.password_reset_expiration as i64),
        ))
    }
}
