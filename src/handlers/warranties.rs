use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::{created, PaginationParams};
use crate::{
    errors::ServiceError,
    services::warranties::{WarrantyFilter, WarrantyInput, WarrantyView},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WarrantyListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Substring match on the serial number
    pub q: Option<String>,
    pub item_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/v1/warranties",
    params(WarrantyListQuery),
    responses(
        (status = 200, description = "Warranties listed", body = ApiResponse<PaginatedResponse<WarrantyView>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "warranties"
)]
pub async fn list_warranties(
    State(state): State<AppState>,
    Query(query): Query<WarrantyListQuery>,
) -> ApiResult<PaginatedResponse<WarrantyView>> {
    let (page, limit) = PaginationParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(&state.config);
    let filter = WarrantyFilter {
        q: query.q,
        item_id: query.item_id,
    };
    let (records, total) = state.services.warranties.list(filter, page, limit).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        records, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/warranties/{id}",
    params(("id" = Uuid, Path, description = "Warranty ID")),
    responses(
        (status = 200, description = "Warranty fetched", body = ApiResponse<WarrantyView>),
        (status = 404, description = "Warranty not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "warranties"
)]
pub async fn get_warranty(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<WarrantyView> {
    Ok(Json(ApiResponse::success(
        state.services.warranties.get(id).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/warranties",
    request_body = WarrantyInput,
    responses(
        (status = 201, description = "Warranty created", body = ApiResponse<WarrantyView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Serial number already registered", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "warranties"
)]
pub async fn create_warranty(
    State(state): State<AppState>,
    Json(payload): Json<WarrantyInput>,
) -> Result<(StatusCode, Json<ApiResponse<WarrantyView>>), ServiceError> {
    Ok(created(state.services.warranties.create(payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/warranties/{id}",
    params(("id" = Uuid, Path, description = "Warranty ID")),
    request_body = WarrantyInput,
    responses(
        (status = 200, description = "Warranty updated", body = ApiResponse<WarrantyView>),
        (status = 404, description = "Warranty not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Serial number already registered", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "warranties"
)]
pub async fn update_warranty(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<WarrantyInput>,
) -> ApiResult<WarrantyView> {
    Ok(Json(ApiResponse::success(
        state.services.warranties.update(id, payload).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/warranties/{id}",
    params(("id" = Uuid, Path, description = "Warranty ID")),
    responses(
        (status = 204, description = "Warranty deleted"),
        (status = 404, description = "Warranty not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "warranties"
)]
pub async fn delete_warranty(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.warranties.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
