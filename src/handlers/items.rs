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
    auth::AuthUser,
    errors::ServiceError,
    services::items::{ItemFilter, ItemInput, ItemUpdate, ItemView},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ItemListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Exact status match, e.g. `available`
    pub status: Option<String>,
    pub category_id: Option<Uuid>,
    /// Substring match on the item name
    pub search: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/items",
    params(ItemListQuery),
    responses(
        (status = 200, description = "Items listed", body = ApiResponse<PaginatedResponse<ItemView>>)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemListQuery>,
) -> ApiResult<PaginatedResponse<ItemView>> {
    let (page, limit) = PaginationParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(&state.config);
    let filter = ItemFilter {
        status: query.status,
        category_id: query.category_id,
        search: query.search,
    };
    let (items, total) = state.services.items.list(filter, page, limit).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item fetched", body = ApiResponse<ItemView>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn get_item(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<ItemView> {
    Ok(Json(ApiResponse::success(state.services.items.get(id).await?)))
}

#[utoipa::path(
    post,
    path = "/api/v1/items",
    request_body = ItemInput,
    responses(
        (status = 201, description = "Item created", body = ApiResponse<ItemView>),
        (status = 400, description = "Invalid category or quantity", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn create_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ItemInput>,
) -> Result<(StatusCode, Json<ApiResponse<ItemView>>), ServiceError> {
    Ok(created(state.services.items.create(&user, payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    request_body = ItemUpdate,
    responses(
        (status = 200, description = "Item updated", body = ApiResponse<ItemView>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Adjustment would take stock below zero", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ItemUpdate>,
) -> ApiResult<ItemView> {
    Ok(Json(ApiResponse::success(
        state.services.items.update(&user, id, payload).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item ID")),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 409, description = "Item is still on loan", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "catalog"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.items.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
