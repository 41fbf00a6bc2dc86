use chrono::NaiveDate;
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
    entities::{borrow_record, project},
    errors::ServiceError,
};

/// Project payload. Dates are ISO `YYYY-MM-DD` strings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProjectInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub drone_count: i32,
    #[validate(length(max = 255))]
    pub location: Option<String>,
}

#[derive(Debug)]
struct ProjectFields {
    name: String,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

impl ProjectInput {
    fn checked(&self) -> Result<ProjectFields, ServiceError> {
        self.validate()?;
        let name = super::require_non_blank("name", &self.name)?;
        let start_date = super::parse_optional_date("start_date", self.start_date.as_deref())?;
        let end_date = super::parse_optional_date("end_date", self.end_date.as_deref())?;
        if let (Some(s), Some(e)) = (start_date, end_date) {
            if e < s {
                return Err(ServiceError::InvalidInput(format!(
                    "end_date {} is before start_date {}",
                    e, s
                )));
            }
        }
        Ok(ProjectFields {
            name,
            start_date,
            end_date,
        })
    }
}

/// First day of `month` and first day of the following month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), ServiceError> {
    let invalid = || ServiceError::InvalidInput(format!("Invalid month {}-{}", year, month));
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    Ok((first, next))
}

#[derive(Clone)]
pub struct ProjectService {
    db: Arc<DatabaseConnection>,
}

impl ProjectService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn ensure_name_free(&self, name: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = project::Entity::find().filter(project::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(project::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Project '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: ProjectInput) -> Result<project::Model, ServiceError> {
        let fields = input.checked()?;
        self.ensure_name_free(&fields.name, None).await?;

        let name = fields.name.clone();
        let created = project::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(fields.name),
            description: Set(input.description),
            start_date: Set(fields.start_date),
            end_date: Set(fields.end_date),
            drone_count: Set(input.drone_count),
            location: Set(input.location),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| super::map_unique_violation(e, format!("Project '{}' already exists", name)))?;

        info!(project_id = %created.id, "project created");
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<project::Model, ServiceError> {
        project::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Project {} not found", id)))
    }

    pub async fn list(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<project::Model>, u64), ServiceError> {
        let paginator = project::Entity::find()
            .order_by_desc(project::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let projects = paginator.fetch_page(super::page_index(page)).await?;
        Ok((projects, total))
    }

    /// Projects whose start date falls within the given calendar month.
    pub async fn list_by_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<project::Model>, ServiceError> {
        let (first, next) = month_bounds(year, month)?;
        let projects = project::Entity::find()
            .filter(project::Column::StartDate.gte(first))
            .filter(project::Column::StartDate.lt(next))
            .order_by_asc(project::Column::StartDate)
            .all(&*self.db)
            .await?;
        Ok(projects)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: Uuid,
        input: ProjectInput,
    ) -> Result<project::Model, ServiceError> {
        let fields = input.checked()?;
        let existing = self.get(id).await?;
        self.ensure_name_free(&fields.name, Some(id)).await?;

        let name = fields.name.clone();
        let mut active: project::ActiveModel = existing.into();
        active.name = Set(fields.name);
        active.description = Set(input.description);
        active.start_date = Set(fields.start_date);
        active.end_date = Set(fields.end_date);
        active.drone_count = Set(input.drone_count);
        active.location = Set(input.location);
        active
            .update(&*self.db)
            .await
            .map_err(|e| super::map_unique_violation(e, format!("Project '{}' already exists", name)))
    }

    /// Refused while items are still out on loan to the project, or when the
    /// project has any lending history.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;

        let outstanding = borrow_record::Entity::find()
            .filter(borrow_record::Column::ProjectId.eq(id))
            .filter(borrow_record::Column::RemainingQuantity.gt(0))
            .count(&*self.db)
            .await?;
        if outstanding > 0 {
            return Err(ServiceError::Conflict(format!(
                "Project '{}' has {} outstanding borrow(s)",
                existing.name, outstanding
            )));
        }

        let history = borrow_record::Entity::find()
            .filter(borrow_record::Column::ProjectId.eq(id))
            .count(&*self.db)
            .await?;
        if history > 0 {
            return Err(ServiceError::Conflict(format!(
                "Project '{}' has lending history and cannot be deleted",
                existing.name
            )));
        }

        project::Entity::delete_by_id(id).exec(&*self.db).await?;
        info!(project_id = %id, "project deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn month_bounds_rolls_over_december() {
        let (first, next) = month_bounds(2024, 12).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(next, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[test]
    fn month_bounds_rejects_month_13() {
        assert_matches!(month_bounds(2024, 13), Err(ServiceError::InvalidInput(_)));
        assert_matches!(month_bounds(2024, 0), Err(ServiceError::InvalidInput(_)));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let input = ProjectInput {
            name: "Survey".into(),
            description: None,
            start_date: Some("2024-05-10".into()),
            end_date: Some("2024-05-01".into()),
            drone_count: 2,
            location: None,
        };
        assert_matches!(input.checked(), Err(ServiceError::InvalidInput(_)));
    }
}
