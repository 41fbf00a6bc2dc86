use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::PaginationParams;
use crate::{
    entities::audit_log,
    errors::ServiceError,
    services::{
        reports::{InventorySummary, LendingReport, ReportKind, ReportQuery},
        DateRange,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InventorySummaryQuery {
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryTableQuery {
    pub project_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    /// `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`
    pub end_date: Option<String>,
    /// `borrow`, `return` or `all`
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl SummaryTableQuery {
    fn to_query(&self) -> Result<ReportQuery, ServiceError> {
        Ok(ReportQuery {
            project_id: self.project_id,
            item_id: self.item_id,
            dates: DateRange::parse(self.start_date.as_deref(), self.end_date.as_deref())?,
            kind: match self.kind.as_deref() {
                Some(kind) => kind.parse::<ReportKind>()?,
                None => ReportKind::All,
            },
        })
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/inventory-summary",
    params(InventorySummaryQuery),
    responses(
        (status = 200, description = "Per-item stock position", body = ApiResponse<InventorySummary>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn inventory_summary(
    State(state): State<AppState>,
    Query(query): Query<InventorySummaryQuery>,
) -> ApiResult<InventorySummary> {
    Ok(Json(ApiResponse::success(
        state
            .services
            .reports
            .inventory_summary(query.category_id)
            .await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/summary-table",
    params(SummaryTableQuery),
    responses(
        (status = 200, description = "Borrow and return activity grouped by project", body = ApiResponse<LendingReport>),
        (status = 400, description = "Malformed date or report type", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn summary_table(
    State(state): State<AppState>,
    Query(query): Query<SummaryTableQuery>,
) -> ApiResult<LendingReport> {
    Ok(Json(ApiResponse::success(
        state.services.reports.lending_report(query.to_query()?).await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/audit-logs",
    params(PaginationParams),
    responses(
        (status = 200, description = "Audit trail, newest first", body = ApiResponse<PaginatedResponse<audit_log::Model>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<audit_log::Model>> {
    let (page, limit) = params.resolve(&state.config);
    let (entries, total) = state.services.audit.list(page, limit).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        entries, total, page, limit,
    ))))
}
