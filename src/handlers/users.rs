use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::common::{created, PaginationParams};
use crate::{
    auth::{AuthUser, Role},
    errors::ServiceError,
    services::{audit::AuditEntry, users::UserView},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[schema(example = json!({"username": "warehouse-lead", "password": "correct-horse-battery", "role": "admin"}))]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(length(min = 8, max = 256))]
    pub password: String,
    /// Defaults to `user`
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(PaginationParams),
    responses(
        (status = 200, description = "Users listed", body = ApiResponse<PaginatedResponse<UserView>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<UserView>> {
    let (page, limit) = params.resolve(&state.config);
    let (users, total) = state.services.users.list_users(page, limit).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        users, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User fetched", body = ApiResponse<UserView>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<UserView> {
    Ok(Json(ApiResponse::success(
        state.services.users.get_user(id).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserView>),
        (status = 409, description = "Username already taken", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserView>>), ServiceError> {
    payload.validate()?;
    let role = payload.role.unwrap_or(Role::User);
    let user = state
        .services
        .users
        .create_user(&payload.username, &payload.password, role)
        .await?;

    state
        .services
        .audit
        .record(
            AuditEntry::new("create_user")
                .by(actor.user_id)
                .on("users", user.id)
                .change(
                    None,
                    Some(serde_json::json!({ "username": user.username, "role": role })),
                ),
        )
        .await;

    Ok(created(UserView::from(user)))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = ApiResponse<UserView>),
        (status = 409, description = "Cannot change your own role", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user_role(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<UserView> {
    Ok(Json(ApiResponse::success(
        state
            .services
            .users
            .update_role(&actor, id, payload.role)
            .await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 409, description = "User has lending history or is the caller", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.users.delete_user(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
