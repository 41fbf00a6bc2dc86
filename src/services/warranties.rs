use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{item, warranty},
    errors::ServiceError,
};

pub const DEFAULT_COVERAGE_MONTHS: i32 = 12;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct WarrantyInput {
    pub item_id: Uuid,
    #[validate(length(min = 1, max = 128))]
    pub serial_number: String,
    /// `YYYY-MM-DD`
    pub purchase_date: String,
    #[validate(range(min = 0, max = 600))]
    pub coverage_months: Option<i32>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 128))]
    pub lot: Option<String>,
    #[validate(length(max = 2000))]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WarrantyFilter {
    pub q: Option<String>,
    pub item_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WarrantyView {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: Option<String>,
    pub item_status: Option<String>,
    pub serial_number: String,
    pub purchase_date: NaiveDate,
    pub coverage_months: i32,
    pub expires_on: NaiveDate,
    pub remaining_days: i64,
    pub description: Option<String>,
    pub lot: Option<String>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WarrantyView {
    pub fn new(model: warranty::Model, item: Option<&item::Model>, today: NaiveDate) -> Self {
        Self {
            item_name: item.map(|i| i.name.clone()),
            item_status: item.map(|i| i.status.clone()),
            expires_on: model.expires_on(),
            remaining_days: model.remaining_days(today),
            id: model.id,
            item_id: model.item_id,
            serial_number: model.serial_number,
            purchase_date: model.purchase_date,
            coverage_months: model.coverage_months,
            description: model.description,
            lot: model.lot,
            remark: model.remark,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Clone)]
pub struct WarrantyService {
    db: Arc<DatabaseConnection>,
}

impl WarrantyService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn require_item(&self, id: Uuid) -> Result<item::Model, ServiceError> {
        item::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", id)))
    }

    async fn ensure_serial_free(&self, serial: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query =
            warranty::Entity::find().filter(warranty::Column::SerialNumber.eq(serial));
        if let Some(id) = except {
            query = query.filter(warranty::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Serial number '{}' is already registered",
                serial
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: WarrantyInput) -> Result<WarrantyView, ServiceError> {
        input.validate()?;
        let serial = super::require_non_blank("serial_number", &input.serial_number)?;
        let purchase_date = super::parse_date("purchase_date", &input.purchase_date)?;
        let item = self.require_item(input.item_id).await?;
        self.ensure_serial_free(&serial, None).await?;

        let created = warranty::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_id: Set(item.id),
            serial_number: Set(serial.clone()),
            purchase_date: Set(purchase_date),
            coverage_months: Set(input.coverage_months.unwrap_or(DEFAULT_COVERAGE_MONTHS)),
            description: Set(input.description),
            lot: Set(input.lot),
            remark: Set(input.remark),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            super::map_unique_violation(e, format!("Serial number '{}' is already registered", serial))
        })?;

        info!(warranty_id = %created.id, serial = %created.serial_number, "warranty registered");
        Ok(WarrantyView::new(created, Some(&item), today()))
    }

    pub async fn get(&self, id: Uuid) -> Result<WarrantyView, ServiceError> {
        let (model, item) = warranty::Entity::find_by_id(id)
            .find_also_related(item::Entity)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Warranty {} not found", id)))?;
        Ok(WarrantyView::new(model, item.as_ref(), today()))
    }

    pub async fn list(
        &self,
        filter: WarrantyFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<WarrantyView>, u64), ServiceError> {
        let mut select = warranty::Entity::find();
        if let Some(q) = filter.q.filter(|q| !q.trim().is_empty()) {
            select = select.filter(warranty::Column::SerialNumber.contains(q.trim()));
        }
        if let Some(item_id) = filter.item_id {
            select = select.filter(warranty::Column::ItemId.eq(item_id));
        }

        let paginator = select
            .order_by_desc(warranty::Column::CreatedAt)
            .find_also_related(item::Entity)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let today = today();
        let rows = paginator
            .fetch_page(super::page_index(page))
            .await?
            .into_iter()
            .map(|(model, item)| WarrantyView::new(model, item.as_ref(), today))
            .collect();
        Ok((rows, total))
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: Uuid, input: WarrantyInput) -> Result<WarrantyView, ServiceError> {
        input.validate()?;
        let serial = super::require_non_blank("serial_number", &input.serial_number)?;
        let purchase_date = super::parse_date("purchase_date", &input.purchase_date)?;
        let existing = warranty::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Warranty {} not found", id)))?;
        let item = self.require_item(input.item_id).await?;
        if serial != existing.serial_number {
            self.ensure_serial_free(&serial, Some(id)).await?;
        }

        let coverage = input.coverage_months.unwrap_or(existing.coverage_months);
        let mut active: warranty::ActiveModel = existing.into();
        active.item_id = Set(item.id);
        active.serial_number = Set(serial.clone());
        active.purchase_date = Set(purchase_date);
        active.coverage_months = Set(coverage);
        active.description = Set(input.description);
        active.lot = Set(input.lot);
        active.remark = Set(input.remark);
        let updated = active.update(&*self.db).await.map_err(|e| {
            super::map_unique_violation(e, format!("Serial number '{}' is already registered", serial))
        })?;

        Ok(WarrantyView::new(updated, Some(&item), today()))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = warranty::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Warranty {} not found", id)));
        }
        info!(warranty_id = %id, "warranty deleted");
        Ok(())
    }
}
