use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder, Set,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::{entities::audit_log, errors::ServiceError};

/// One row for the audit trail.
#[derive(Debug, Clone, Default)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub table_name: Option<String>,
    pub record_id: Option<Uuid>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub ip_address: Option<String>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn by(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn on(mut self, table_name: &str, record_id: Uuid) -> Self {
        self.table_name = Some(table_name.to_string());
        self.record_id = Some(record_id);
        self
    }

    pub fn change(mut self, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }
}

#[derive(Clone)]
pub struct AuditService {
    db: Arc<DatabaseConnection>,
}

impl AuditService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Persists `entry`. Never fails the caller; storage errors are logged.
    pub async fn record(&self, entry: AuditEntry) {
        let action = entry.action.clone();
        let model = audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(entry.user_id),
            action: Set(entry.action),
            table_name: Set(entry.table_name),
            record_id: Set(entry.record_id),
            old_value: Set(entry.old_value),
            new_value: Set(entry.new_value),
            ip_address: Set(entry.ip_address),
            ..Default::default()
        };

        if let Err(e) = model.insert(&*self.db).await {
            warn!(action = %action, error = %e, "failed to write audit entry");
        }
    }

    /// Newest first.
    pub async fn list(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<audit_log::Model>, u64), ServiceError> {
        let paginator = audit_log::Entity::find()
            .order_by_desc(audit_log::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let entries = paginator.fetch_page(super::page_index(page)).await?;
        Ok((entries, total))
    }
}
