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
    entities::damage_report::DamageStatus,
    errors::ServiceError,
    services::damage_reports::{
        CreateDamageReport, DamageReportFilter, DamageReportView, UpdateDamageStatus,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DamageReportListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Pending, Approved, Rejected or Resolved
    pub status: Option<String>,
    pub project_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
}

impl DamageReportListQuery {
    fn filter(&self) -> Result<DamageReportFilter, ServiceError> {
        let status = self
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<DamageStatus>().map_err(ServiceError::InvalidInput))
            .transpose()?;
        Ok(DamageReportFilter {
            status,
            project_id: self.project_id,
            item_id: self.item_id,
        })
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/damage-reports",
    request_body = CreateDamageReport,
    responses(
        (status = 201, description = "Damage reported", body = ApiResponse<DamageReportView>),
        (status = 404, description = "Item or project not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "damage-reports"
)]
pub async fn create_damage_report(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateDamageReport>,
) -> Result<(StatusCode, Json<ApiResponse<DamageReportView>>), ServiceError> {
    Ok(created(
        state.services.damage_reports.create(&user, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/damage-reports",
    params(DamageReportListQuery),
    responses(
        (status = 200, description = "Damage reports listed", body = ApiResponse<PaginatedResponse<DamageReportView>>),
        (status = 400, description = "Unknown status filter", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "damage-reports"
)]
pub async fn list_damage_reports(
    State(state): State<AppState>,
    Query(query): Query<DamageReportListQuery>,
) -> ApiResult<PaginatedResponse<DamageReportView>> {
    let (page, limit) = PaginationParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(&state.config);
    let (reports, total) = state
        .services
        .damage_reports
        .list(query.filter()?, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        reports, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/damage-reports/{id}",
    params(("id" = Uuid, Path, description = "Damage report ID")),
    responses(
        (status = 200, description = "Damage report fetched", body = ApiResponse<DamageReportView>),
        (status = 404, description = "Damage report not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "damage-reports"
)]
pub async fn get_damage_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DamageReportView> {
    Ok(Json(ApiResponse::success(
        state.services.damage_reports.get(id).await?,
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/damage-reports/{id}/status",
    params(("id" = Uuid, Path, description = "Damage report ID")),
    request_body = UpdateDamageStatus,
    responses(
        (status = 200, description = "Review applied", body = ApiResponse<DamageReportView>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "damage-reports"
)]
pub async fn update_damage_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDamageStatus>,
) -> ApiResult<DamageReportView> {
    Ok(Json(ApiResponse::success(
        state
            .services
            .damage_reports
            .update_status(&user, id, payload)
            .await?,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn status_filter_is_case_insensitive() {
        let query = DamageReportListQuery {
            status: Some("approved".into()),
            ..Default::default()
        };
        assert_eq!(query.filter().unwrap().status, Some(DamageStatus::Approved));
    }

    #[test]
    fn unknown_status_filter_is_rejected() {
        let query = DamageReportListQuery {
            status: Some("lost".into()),
            ..Default::default()
        };
        assert_matches!(query.filter(), Err(ServiceError::InvalidInput(_)));
    }
}
