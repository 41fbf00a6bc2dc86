use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::common::{created, PaginationParams};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::{
        lending::{
            BorrowItemCommand, BorrowQuery, BorrowRecordView, ReturnItemCommand, ReturnQuery,
            ReturnRecordView,
        },
        parse_date, DateRange,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[schema(example = json!({
    "item_id": "550e8400-e29b-41d4-a716-446655440000",
    "project_id": "660e8400-e29b-41d4-a716-446655440000",
    "quantity": 4,
    "borrow_date": "2024-06-01",
    "due_date": "2024-06-14"
}))]
pub struct BorrowRequest {
    pub item_id: Uuid,
    pub project_id: Uuid,
    /// Units to take out; must be positive
    pub quantity: i32,
    /// `YYYY-MM-DD`
    #[validate(length(min = 1))]
    pub borrow_date: String,
    /// `YYYY-MM-DD`, not before `borrow_date`
    #[validate(length(min = 1))]
    pub due_date: String,
}

impl BorrowRequest {
    fn into_command(self) -> Result<BorrowItemCommand, ServiceError> {
        Ok(BorrowItemCommand {
            item_id: self.item_id,
            project_id: self.project_id,
            quantity: self.quantity,
            borrow_date: parse_date("borrow_date", &self.borrow_date)?,
            due_date: parse_date("due_date", &self.due_date)?,
        })
    }
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[schema(example = json!({
    "borrow_id": "770e8400-e29b-41d4-a716-446655440000",
    "quantity": 2,
    "return_date": "2024-06-10"
}))]
pub struct ReturnRequest {
    pub borrow_id: Uuid,
    /// Units handed back; at most the borrow's remaining quantity
    pub quantity: i32,
    /// `YYYY-MM-DD`
    #[validate(length(min = 1))]
    pub return_date: String,
}

impl ReturnRequest {
    fn into_command(self) -> Result<ReturnItemCommand, ServiceError> {
        Ok(ReturnItemCommand {
            borrow_id: self.borrow_id,
            quantity: self.quantity,
            return_date: parse_date("return_date", &self.return_date)?,
        })
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BorrowListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub project_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    /// Admin listings only
    pub user_id: Option<Uuid>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Only borrows with units still out
    #[serde(default)]
    pub outstanding: bool,
}

impl BorrowListQuery {
    fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            limit: self.limit,
        }
    }

    fn to_query(&self, user_id: Option<Uuid>) -> Result<BorrowQuery, ServiceError> {
        Ok(BorrowQuery {
            project_id: self.project_id,
            item_id: self.item_id,
            user_id,
            dates: DateRange::parse(self.start_date.as_deref(), self.end_date.as_deref())?,
            outstanding_only: self.outstanding,
        })
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReturnListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub project_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub borrow_id: Option<Uuid>,
    /// Admin listings only
    pub user_id: Option<Uuid>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl ReturnListQuery {
    fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            limit: self.limit,
        }
    }

    fn to_query(&self, user_id: Option<Uuid>) -> Result<ReturnQuery, ServiceError> {
        Ok(ReturnQuery {
            project_id: self.project_id,
            item_id: self.item_id,
            borrow_id: self.borrow_id,
            user_id,
            dates: DateRange::parse(self.start_date.as_deref(), self.end_date.as_deref())?,
        })
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/transactions/borrow",
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Items borrowed", body = ApiResponse<BorrowRecordView>),
        (status = 400, description = "Invalid quantity or date", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item or project not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "lending"
)]
pub async fn borrow_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BorrowRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BorrowRecordView>>), ServiceError> {
    payload.validate()?;
    let record = state
        .services
        .lending
        .borrow_item(&user, payload.into_command()?)
        .await?;
    Ok(created(record))
}

#[utoipa::path(
    post,
    path = "/api/v1/transactions/return",
    request_body = ReturnRequest,
    responses(
        (status = 201, description = "Items returned", body = ApiResponse<ReturnRecordView>),
        (status = 400, description = "Invalid quantity or date", body = crate::errors::ErrorResponse),
        (status = 404, description = "Borrow record not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Return exceeds the outstanding quantity", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "lending"
)]
pub async fn return_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ReturnRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReturnRecordView>>), ServiceError> {
    payload.validate()?;
    let record = state
        .services
        .lending
        .return_item(&user, payload.into_command()?)
        .await?;
    Ok(created(record))
}

#[utoipa::path(
    get,
    path = "/api/v1/transactions/borrows",
    params(BorrowListQuery),
    responses(
        (status = 200, description = "The caller's borrow records", body = ApiResponse<PaginatedResponse<BorrowRecordView>>)
    ),
    security(("bearer_auth" = [])),
    tag = "lending"
)]
pub async fn list_my_borrows(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<BorrowListQuery>,
) -> ApiResult<PaginatedResponse<BorrowRecordView>> {
    let (page, limit) = query.pagination().resolve(&state.config);
    let (records, total) = state
        .services
        .lending
        .list_borrows(query.to_query(Some(user.user_id))?, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        records, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/transactions/returns",
    params(ReturnListQuery),
    responses(
        (status = 200, description = "The caller's return records", body = ApiResponse<PaginatedResponse<ReturnRecordView>>)
    ),
    security(("bearer_auth" = [])),
    tag = "lending"
)]
pub async fn list_my_returns(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ReturnListQuery>,
) -> ApiResult<PaginatedResponse<ReturnRecordView>> {
    let (page, limit) = query.pagination().resolve(&state.config);
    let (records, total) = state
        .services
        .lending
        .list_returns(query.to_query(Some(user.user_id))?, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        records, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/transactions/borrows/{id}",
    params(("id" = Uuid, Path, description = "Borrow record ID")),
    responses(
        (status = 200, description = "Borrow record", body = ApiResponse<BorrowRecordView>),
        (status = 404, description = "Borrow record not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "lending"
)]
pub async fn get_borrow(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<BorrowRecordView> {
    let record = state.services.lending.get_borrow(&user, id).await?;
    Ok(Json(ApiResponse::success(record)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/transactions/borrows",
    params(BorrowListQuery),
    responses(
        (status = 200, description = "All borrow records", body = ApiResponse<PaginatedResponse<BorrowRecordView>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn admin_list_borrows(
    State(state): State<AppState>,
    Query(query): Query<BorrowListQuery>,
) -> ApiResult<PaginatedResponse<BorrowRecordView>> {
    let (page, limit) = query.pagination().resolve(&state.config);
    let (records, total) = state
        .services
        .lending
        .list_borrows(query.to_query(query.user_id)?, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        records, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/transactions/borrows/project/{project_id}",
    params(
        ("project_id" = Uuid, Path, description = "Project ID"),
        BorrowListQuery
    ),
    responses(
        (status = 200, description = "Borrow records for one project", body = ApiResponse<PaginatedResponse<BorrowRecordView>>),
        (status = 404, description = "Project not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn admin_list_project_borrows(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<BorrowListQuery>,
) -> ApiResult<PaginatedResponse<BorrowRecordView>> {
    state.services.projects.get(project_id).await?;

    let (page, limit) = query.pagination().resolve(&state.config);
    let mut filter = query.to_query(query.user_id)?;
    filter.project_id = Some(project_id);
    let (records, total) = state
        .services
        .lending
        .list_borrows(filter, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        records, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/transactions/returns",
    params(ReturnListQuery),
    responses(
        (status = 200, description = "All return records", body = ApiResponse<PaginatedResponse<ReturnRecordView>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn admin_list_returns(
    State(state): State<AppState>,
    Query(query): Query<ReturnListQuery>,
) -> ApiResult<PaginatedResponse<ReturnRecordView>> {
    let (page, limit) = query.pagination().resolve(&state.config);
    let (records, total) = state
        .services
        .lending
        .list_returns(query.to_query(query.user_id)?, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        records, total, page, limit,
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn borrow_request_rejects_malformed_dates() {
        let request = BorrowRequest {
            item_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            quantity: 1,
            borrow_date: "01/06/2024".into(),
            due_date: "2024-06-14".into(),
        };
        assert_matches!(request.into_command(), Err(ServiceError::InvalidInput(msg)) if msg.contains("borrow_date"));
    }

    #[test]
    fn list_query_rejects_inverted_range() {
        let query = BorrowListQuery {
            start_date: Some("2024-06-10".into()),
            end_date: Some("2024-06-01".into()),
            ..Default::default()
        };
        assert_matches!(query.to_query(None), Err(ServiceError::InvalidInput(_)));
    }
}
