use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use super::common::{created, PaginationParams};
use crate::{
    entities::project,
    errors::ServiceError,
    services::projects::ProjectInput,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[utoipa::path(
    get,
    path = "/api/v1/projects",
    params(PaginationParams),
    responses(
        (status = 200, description = "Projects listed", body = ApiResponse<PaginatedResponse<project::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<project::Model>> {
    let (page, limit) = params.resolve(&state.config);
    let (projects, total) = state.services.projects.list(page, limit).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        projects, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/filter-month/{year}/{month}",
    params(
        ("year" = i32, Path, description = "Calendar year"),
        ("month" = u32, Path, description = "Month, 1-12")
    ),
    responses(
        (status = 200, description = "Projects starting in the month", body = ApiResponse<Vec<project::Model>>),
        (status = 400, description = "Invalid month", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn list_projects_by_month(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> ApiResult<Vec<project::Model>> {
    Ok(Json(ApiResponse::success(
        state.services.projects.list_by_month(year, month).await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project fetched", body = ApiResponse<project::Model>),
        (status = 404, description = "Project not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<project::Model> {
    Ok(Json(ApiResponse::success(
        state.services.projects.get(id).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects",
    request_body = ProjectInput,
    responses(
        (status = 201, description = "Project created", body = ApiResponse<project::Model>),
        (status = 409, description = "Name already taken", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn create_project(
    State(state): State<AppState>,
    Json(payload): Json<ProjectInput>,
) -> Result<(StatusCode, Json<ApiResponse<project::Model>>), ServiceError> {
    Ok(created(state.services.projects.create(payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/projects/{id}",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = ProjectInput,
    responses(
        (status = 200, description = "Project updated", body = ApiResponse<project::Model>),
        (status = 404, description = "Project not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProjectInput>,
) -> ApiResult<project::Model> {
    Ok(Json(ApiResponse::success(
        state.services.projects.update(id, payload).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/projects/{id}",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 409, description = "Project has outstanding borrows", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.projects.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
