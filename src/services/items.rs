use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    db::{in_transaction, lock_for_update},
    entities::{borrow_record, category, item},
    errors::ServiceError,
    services::audit::{AuditEntry, AuditService},
};

pub const DEFAULT_ITEM_STATUS: &str = "available";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ItemInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 32))]
    pub status: Option<String>,
    pub category_id: Uuid,
    #[validate(length(max = 2000))]
    pub remark: Option<String>,
}

/// Catalog edit. Stock is never replaced wholesale: `quantity_adjustment` is a
/// signed delta applied to the current on-hand count under a row lock.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "name": "Tripod v2",
    "category_id": "550e8400-e29b-41d4-a716-446655440000",
    "quantity_adjustment": 2
}))]
pub struct ItemUpdate {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub status: Option<String>,
    pub category_id: Uuid,
    #[validate(length(max = 2000))]
    pub remark: Option<String>,
    /// Units added (positive) or written off (negative)
    #[serde(default)]
    pub quantity_adjustment: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub status: Option<String>,
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
}

/// An item with its category name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ItemView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub quantity: i32,
    pub status: String,
    pub category_id: Uuid,
    pub category_name: Option<String>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ItemView {
    fn new(model: item::Model, category: Option<&category::Model>) -> Self {
        Self {
            category_name: category.map(|c| c.name.clone()),
            id: model.id,
            name: model.name,
            description: model.description,
            quantity: model.quantity,
            status: model.status,
            category_id: model.category_id,
            remark: model.remark,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct ItemService {
    db: Arc<DatabaseConnection>,
    audit: Arc<AuditService>,
}

impl ItemService {
    pub fn new(db: Arc<DatabaseConnection>, audit: Arc<AuditService>) -> Self {
        Self { db, audit }
    }

    async fn require_category(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        category::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::InvalidInput(format!("Invalid category id {}", id)))
    }

    fn status_or_default(status: Option<String>) -> Result<String, ServiceError> {
        match status {
            Some(s) => super::require_non_blank("status", &s),
            None => Ok(DEFAULT_ITEM_STATUS.to_string()),
        }
    }

    /// Registers a new item. The opening quantity is an external replenishment
    /// and is written to the audit log.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn create(&self, actor: &AuthUser, input: ItemInput) -> Result<ItemView, ServiceError> {
        input.validate()?;
        let name = super::require_non_blank("name", &input.name)?;
        let category = self.require_category(input.category_id).await?;

        let created = item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            description: Set(input.description),
            quantity: Set(input.quantity),
            status: Set(Self::status_or_default(input.status)?),
            category_id: Set(category.id),
            remark: Set(input.remark),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        self.audit
            .record(
                AuditEntry::new("create_item")
                    .by(actor.user_id)
                    .on("items", created.id)
                    .change(None, Some(json!({ "quantity": created.quantity }))),
            )
            .await;

        info!(item_id = %created.id, quantity = created.quantity, "item created");
        Ok(ItemView::new(created, Some(&category)))
    }

    pub async fn get(&self, id: Uuid) -> Result<ItemView, ServiceError> {
        let (model, category) = item::Entity::find_by_id(id)
            .find_also_related(category::Entity)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", id)))?;
        Ok(ItemView::new(model, category.as_ref()))
    }

    pub async fn list(
        &self,
        filter: ItemFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ItemView>, u64), ServiceError> {
        let mut select = item::Entity::find();
        if let Some(status) = filter.status.filter(|s| !s.trim().is_empty()) {
            select = select.filter(item::Column::Status.eq(status.trim()));
        }
        if let Some(category_id) = filter.category_id {
            select = select.filter(item::Column::CategoryId.eq(category_id));
        }
        if let Some(search) = filter.search.filter(|s| !s.trim().is_empty()) {
            select = select.filter(item::Column::Name.contains(search.trim()));
        }

        let paginator = select
            .order_by_asc(item::Column::Name)
            .find_also_related(category::Entity)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let rows = paginator
            .fetch_page(super::page_index(page))
            .await?
            .into_iter()
            .map(|(model, category)| ItemView::new(model, category.as_ref()))
            .collect();
        Ok((rows, total))
    }

    /// Edits the item's catalog fields. A `quantity_adjustment` is a manual
    /// stock correction: it is applied to the locked row, may not take stock
    /// below zero, and is audited with the before/after values.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn update(
        &self,
        actor: &AuthUser,
        id: Uuid,
        input: ItemUpdate,
    ) -> Result<ItemView, ServiceError> {
        input.validate()?;
        let name = super::require_non_blank("name", &input.name)?;
        let status = Self::status_or_default(input.status)?;
        let delta = input.quantity_adjustment.unwrap_or(0);

        let (before, updated, category) = in_transaction(&self.db, "update_item", move |txn| {
            Box::pin(async move {
                let existing = lock_for_update(
                    item::Entity::find_by_id(id),
                    txn.get_database_backend(),
                )
                .one(txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", id)))?;

                let category = category::Entity::find_by_id(input.category_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InvalidInput(format!(
                            "Invalid category id {}",
                            input.category_id
                        ))
                    })?;

                let before = existing.quantity;
                let mut active: item::ActiveModel = existing.into();
                active.name = Set(name);
                active.description = Set(input.description);
                active.status = Set(status);
                active.category_id = Set(category.id);
                active.remark = Set(input.remark);
                let edited = active.update(txn).await?;

                if delta != 0 {
                    let adjusted = item::Entity::update_many()
                        .col_expr(
                            item::Column::Quantity,
                            Expr::col(item::Column::Quantity).add(delta),
                        )
                        .col_expr(item::Column::UpdatedAt, Expr::value(Utc::now()))
                        .filter(item::Column::Id.eq(id))
                        .filter(item::Column::Quantity.gte(-delta))
                        .exec(txn)
                        .await?;

                    if adjusted.rows_affected == 0 {
                        return Err(ServiceError::InsufficientStock {
                            item_id: id,
                            item_name: edited.name,
                            available: before,
                            requested: -delta,
                        });
                    }
                }

                let updated = item::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", id)))?;
                Ok((before, updated, category))
            })
        })
        .await?;

        if before != updated.quantity {
            info!(item_id = %id, before, after = updated.quantity, "stock adjusted");
            self.audit
                .record(
                    AuditEntry::new("adjust_stock")
                        .by(actor.user_id)
                        .on("items", id)
                        .change(
                            Some(json!({ "quantity": before })),
                            Some(json!({ "quantity": updated.quantity })),
                        ),
                )
                .await;
        }

        Ok(ItemView::new(updated, Some(&category)))
    }

    /// Refused while units of the item are still out on loan.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn delete(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        let existing = item::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", id)))?;

        let outstanding = borrow_record::Entity::find()
            .filter(borrow_record::Column::ItemId.eq(id))
            .filter(borrow_record::Column::RemainingQuantity.gt(0))
            .count(&*self.db)
            .await?;
        if outstanding > 0 {
            return Err(ServiceError::Conflict(format!(
                "Item '{}' has {} outstanding borrow(s)",
                existing.name, outstanding
            )));
        }

        let history = borrow_record::Entity::find()
            .filter(borrow_record::Column::ItemId.eq(id))
            .count(&*self.db)
            .await?;
        if history > 0 {
            return Err(ServiceError::Conflict(format!(
                "Item '{}' has lending history and cannot be deleted",
                existing.name
            )));
        }

        item::Entity::delete_by_id(id).exec(&*self.db).await?;
        self.audit
            .record(
                AuditEntry::new("delete_item")
                    .by(actor.user_id)
                    .on("items", id)
                    .change(Some(json!({ "name": existing.name, "quantity": existing.quantity })), None),
            )
            .await;
        Ok(())
    }
}
