use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{password, AuthUser, Role},
    entities::{borrow_record, damage_report, return_record, user},
    errors::ServiceError,
    services::audit::{AuditEntry, AuditService},
};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 64;

/// Public projection of a user; never carries credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<user::Model> for UserView {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            role: model.role,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub fn normalize_username(username: &str) -> Result<String, ServiceError> {
    let trimmed = username.trim();
    let len = trimmed.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(ServiceError::InvalidInput(format!(
            "Username must be between {} and {} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }
    Ok(trimmed.to_string())
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    audit: Arc<AuditService>,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, audit: Arc<AuditService>) -> Self {
        Self { db, audit }
    }

    pub(crate) async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&*self.db)
            .await?)
    }

    /// Creates an account with an explicit role. Used by registration and the admin CLI.
    #[instrument(skip(self, password))]
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<user::Model, ServiceError> {
        let username = normalize_username(username)?;
        password::validate_password_strength(password)?;

        if self.find_by_username(&username).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.clone()),
            password_hash: Set(password::hash_password(password)?),
            role: Set(role),
            reset_token: Set(None),
            reset_token_expires_at: Set(None),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            super::map_unique_violation(e, format!("Username '{}' is already taken", username))
        })?;

        info!(user_id = %model.id, role = %model.role, "user created");
        Ok(model)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserView, ServiceError> {
        self.find_model(id).await.map(UserView::from)
    }

    pub(crate) async fn find_model(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))
    }

    pub async fn list_users(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<UserView>, u64), ServiceError> {
        let paginator = user::Entity::find()
            .order_by_asc(user::Column::Username)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let users = paginator
            .fetch_page(super::page_index(page))
            .await?
            .into_iter()
            .map(UserView::from)
            .collect();
        Ok((users, total))
    }

    /// Changes a user's role. An admin cannot demote themself.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn update_role(
        &self,
        actor: &AuthUser,
        id: Uuid,
        role: Role,
    ) -> Result<UserView, ServiceError> {
        if actor.user_id == id && role != actor.role {
            return Err(ServiceError::InvalidOperation(
                "You cannot change your own role".into(),
            ));
        }

        let existing = self.find_model(id).await?;
        let old_role = existing.role;
        let mut active: user::ActiveModel = existing.into();
        active.role = Set(role);
        let updated = active.update(&*self.db).await?;

        self.audit
            .record(
                AuditEntry::new("update_role")
                    .by(actor.user_id)
                    .on("users", id)
                    .change(
                        Some(json!({ "role": old_role })),
                        Some(json!({ "role": role })),
                    ),
            )
            .await;

        Ok(updated.into())
    }

    /// Deletes an account with no lending history. An admin cannot delete themself.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn delete_user(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        if actor.user_id == id {
            return Err(ServiceError::InvalidOperation(
                "You cannot delete your own account".into(),
            ));
        }

        let existing = self.find_model(id).await?;

        let borrow_count = borrow_record::Entity::find()
            .filter(borrow_record::Column::UserId.eq(id))
            .count(&*self.db)
            .await?;
        let report_count = damage_report::Entity::find()
            .filter(damage_report::Column::ReporterId.eq(id))
            .count(&*self.db)
            .await?;
        let return_count = return_record::Entity::find()
            .filter(return_record::Column::UserId.eq(id))
            .count(&*self.db)
            .await?;
        if borrow_count + report_count + return_count > 0 {
            return Err(ServiceError::Conflict(format!(
                "User '{}' has lending history and cannot be deleted",
                existing.username
            )));
        }

        user::Entity::delete_by_id(id).exec(&*self.db).await?;

        self.audit
            .record(
                AuditEntry::new("delete_user")
                    .by(actor.user_id)
                    .on("users", id)
                    .change(Some(json!({ "username": existing.username })), None),
            )
            .await;
        Ok(())
    }
}
