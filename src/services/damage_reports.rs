use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, sync::Arc};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    entities::{
        damage_report::{self, DamageStatus},
        item, project,
    },
    errors::ServiceError,
    events::{EventSender, LendingEvent},
    services::lending::Lookup,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateDamageReport {
    pub item_id: Uuid,
    pub project_id: Uuid,
    #[validate(length(min = 1, max = 4000))]
    pub description: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub broken_units: i32,
}

/// Review update; omitted fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateDamageStatus {
    pub status: Option<String>,
    #[validate(range(min = 0))]
    pub broken_units: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct DamageReportFilter {
    pub status: Option<DamageStatus>,
    pub project_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DamageReportView {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: Option<String>,
    pub category_name: Option<String>,
    pub project_id: Uuid,
    pub project_name: Option<String>,
    pub reporter_id: Uuid,
    pub reporter_name: Option<String>,
    pub description: String,
    pub status: DamageStatus,
    pub broken_units: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Lookup {
    pub(crate) fn damage_view(&self, d: damage_report::Model) -> DamageReportView {
        DamageReportView {
            item_name: self.item_name(d.item_id),
            category_name: self.category_name(d.item_id),
            project_name: self.project_name(d.project_id),
            reporter_name: self.username(d.reporter_id),
            id: d.id,
            item_id: d.item_id,
            project_id: d.project_id,
            reporter_id: d.reporter_id,
            description: d.description,
            status: d.status,
            broken_units: d.broken_units,
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct DamageReportService {
    db: Arc<DatabaseConnection>,
    events: EventSender,
}

impl DamageReportService {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        Self { db, events }
    }

    async fn resolve(
        &self,
        reports: Vec<damage_report::Model>,
    ) -> Result<Vec<DamageReportView>, ServiceError> {
        let lookup = Lookup::load(
            &*self.db,
            reports.iter().map(|r| r.item_id).collect::<HashSet<_>>(),
            reports.iter().map(|r| r.project_id).collect(),
            reports.iter().map(|r| r.reporter_id).collect(),
        )
        .await?;
        Ok(reports.into_iter().map(|r| lookup.damage_view(r)).collect())
    }

    async fn resolve_one(&self, report: damage_report::Model) -> Result<DamageReportView, ServiceError> {
        self.resolve(vec![report])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::InternalError("damage report vanished while resolving".into()))
    }

    /// Files a new report in `Pending` status on behalf of `principal`.
    #[instrument(skip(self, principal, input), fields(user_id = %principal.user_id, item_id = %input.item_id))]
    pub async fn create(
        &self,
        principal: &AuthUser,
        input: CreateDamageReport,
    ) -> Result<DamageReportView, ServiceError> {
        input.validate()?;
        let description = super::require_non_blank("description", &input.description)?;

        item::Entity::find_by_id(input.item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", input.item_id)))?;
        project::Entity::find_by_id(input.project_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Project {} not found", input.project_id))
            })?;

        let created = damage_report::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_id: Set(input.item_id),
            reporter_id: Set(principal.user_id),
            project_id: Set(input.project_id),
            description: Set(description),
            status: Set(DamageStatus::Pending),
            broken_units: Set(input.broken_units),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(report_id = %created.id, broken_units = created.broken_units, "damage reported");
        self.events
            .send_or_log(LendingEvent::DamageReported {
                report_id: created.id,
                item_id: created.item_id,
            });

        self.resolve_one(created).await
    }

    pub async fn get(&self, id: Uuid) -> Result<DamageReportView, ServiceError> {
        let report = damage_report::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Damage report {} not found", id)))?;
        self.resolve_one(report).await
    }

    pub async fn list(
        &self,
        filter: DamageReportFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<DamageReportView>, u64), ServiceError> {
        let mut select = damage_report::Entity::find();
        if let Some(status) = filter.status {
            select = select.filter(damage_report::Column::Status.eq(status));
        }
        if let Some(project_id) = filter.project_id {
            select = select.filter(damage_report::Column::ProjectId.eq(project_id));
        }
        if let Some(item_id) = filter.item_id {
            select = select.filter(damage_report::Column::ItemId.eq(item_id));
        }

        let paginator = select
            .order_by_desc(damage_report::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let reports = paginator.fetch_page(super::page_index(page)).await?;
        Ok((self.resolve(reports).await?, total))
    }

    /// Applies a review decision. Only forward transitions are accepted.
    #[instrument(skip(self, reviewer, update), fields(reviewer = %reviewer.user_id))]
    pub async fn update_status(
        &self,
        reviewer: &AuthUser,
        id: Uuid,
        update: UpdateDamageStatus,
    ) -> Result<DamageReportView, ServiceError> {
        update.validate()?;
        let next = update
            .status
            .as_deref()
            .map(|s| s.parse::<DamageStatus>().map_err(ServiceError::InvalidInput))
            .transpose()?;

        let existing = damage_report::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Damage report {} not found", id)))?;
        let previous = existing.status;

        if let Some(next) = next {
            if !previous.can_transition_to(next) {
                warn!(report_id = %id, from = %previous, to = %next, "damage status transition rejected");
                return Err(ServiceError::InvalidOperation(format!(
                    "Cannot move damage report from {} to {}",
                    previous, next
                )));
            }
        }

        let updated = self
            .apply_review(id, previous, next, update.broken_units)
            .await?;

        if updated.status != previous {
            info!(report_id = %id, from = %previous, to = %updated.status, "damage status changed");
            self.events
                .send_or_log(LendingEvent::DamageStatusChanged {
                    report_id: id,
                    from: previous,
                    to: updated.status,
                });
        }

        self.resolve_one(updated).await
    }

    /// Writes a review decision only while the report is still in `expected`.
    async fn apply_review(
        &self,
        id: Uuid,
        expected: DamageStatus,
        next: Option<DamageStatus>,
        broken_units: Option<i32>,
    ) -> Result<damage_report::Model, ServiceError> {
        let mut guarded = damage_report::Entity::update_many()
            .col_expr(damage_report::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(damage_report::Column::Id.eq(id))
            .filter(damage_report::Column::Status.eq(expected.as_str()));
        if let Some(next) = next {
            guarded = guarded.col_expr(damage_report::Column::Status, Expr::value(next.as_str()));
        }
        if let Some(units) = broken_units {
            guarded = guarded.col_expr(damage_report::Column::BrokenUnits, Expr::value(units));
        }
        let applied = guarded.exec(&*self.db).await?;

        let current = damage_report::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Damage report {} not found", id)))?;

        if applied.rows_affected == 0 {
            warn!(report_id = %id, expected = %expected, found = %current.status, "damage report changed during review");
            return Err(ServiceError::InvalidOperation(format!(
                "Damage report {} moved from {} to {} during review",
                id, expected, current.status
            )));
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::entities::{category, user};
    use assert_matches::assert_matches;

    async fn service_with_report() -> (DamageReportService, AuthUser, Uuid) {
        let db = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&db).await.unwrap();

        let reviewer = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set("reviewer".into()),
            password_hash: Set("x".into()),
            role: Set(Role::Admin),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        let category = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Rotors".into()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        let item = item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Propeller set".into()),
            quantity: Set(8),
            status: Set("available".into()),
            category_id: Set(category.id),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        let project = project::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Coastline".into()),
            drone_count: Set(1),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let (events, _rx) = EventSender::channel(16);
        let service = DamageReportService::new(Arc::new(db), events);
        let principal = AuthUser {
            user_id: reviewer.id,
            username: reviewer.username,
            role: reviewer.role,
        };
        let report = service
            .create(
                &principal,
                CreateDamageReport {
                    item_id: item.id,
                    project_id: project.id,
                    description: "Chipped blade".into(),
                    broken_units: 1,
                },
            )
            .await
            .unwrap();
        (service, principal, report.id)
    }

    #[tokio::test]
    async fn stale_review_does_not_overwrite_a_newer_decision() {
        let (service, reviewer, id) = service_with_report().await;

        let approved = service
            .update_status(
                &reviewer,
                id,
                UpdateDamageStatus {
                    status: Some("Approved".into()),
                    broken_units: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(approved.status, DamageStatus::Approved);

        // A second reviewer still holding the Pending read decides to reject
        let stale = service
            .apply_review(id, DamageStatus::Pending, Some(DamageStatus::Rejected), Some(3))
            .await;
        assert_matches!(stale, Err(ServiceError::InvalidOperation(_)));

        let current = service.get(id).await.unwrap();
        assert_eq!(current.status, DamageStatus::Approved);
        assert_eq!(current.broken_units, 1);
    }

    #[tokio::test]
    async fn omitted_fields_are_left_unchanged() {
        let (service, reviewer, id) = service_with_report().await;

        let updated = service
            .update_status(
                &reviewer,
                id,
                UpdateDamageStatus {
                    status: None,
                    broken_units: Some(4),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, DamageStatus::Pending);
        assert_eq!(updated.broken_units, 4);
    }
}
