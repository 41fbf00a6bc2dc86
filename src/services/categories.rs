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
    entities::{category, item},
    errors::ServiceError,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn ensure_name_free(&self, name: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = category::Entity::find().filter(category::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(category::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Category '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: CategoryInput) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let name = super::require_non_blank("name", &input.name)?;
        self.ensure_name_free(&name, None).await?;

        let created = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.clone()),
            description: Set(input.description),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| super::map_unique_violation(e, format!("Category '{}' already exists", name)))?;

        info!(category_id = %created.id, "category created");
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        category::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))
    }

    pub async fn list(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<category::Model>, u64), ServiceError> {
        let paginator = category::Entity::find()
            .order_by_asc(category::Column::Name)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let categories = paginator.fetch_page(super::page_index(page)).await?;
        Ok((categories, total))
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: Uuid,
        input: CategoryInput,
    ) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let name = super::require_non_blank("name", &input.name)?;
        let existing = self.get(id).await?;
        self.ensure_name_free(&name, Some(id)).await?;

        let mut active: category::ActiveModel = existing.into();
        active.name = Set(name.clone());
        active.description = Set(input.description);
        active
            .update(&*self.db)
            .await
            .map_err(|e| super::map_unique_violation(e, format!("Category '{}' already exists", name)))
    }

    /// Refused while any item still belongs to the category.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        let items = item::Entity::find()
            .filter(item::Column::CategoryId.eq(id))
            .count(&*self.db)
            .await?;
        if items > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category '{}' still has {} item(s)",
                existing.name, items
            )));
        }
        category::Entity::delete_by_id(id).exec(&*self.db).await?;
        info!(category_id = %id, "category deleted");
        Ok(())
    }
}
