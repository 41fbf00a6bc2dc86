use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use super::common::created;
use crate::{
    auth::{AuthUser, LoginResult, PasswordResetTicket, TokenPair},
    errors::ServiceError,
    middleware_helpers::audit::client_ip,
    services::users::UserView,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[schema(example = json!({"username": "jdoe", "password": "correct-horse-battery"}))]
pub struct CredentialsRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 256))]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct PasswordResetRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct PasswordResetConfirm {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 1, max = 256))]
    pub new_password: String,
}

/// The ticket is present only when the account exists.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PasswordResetResponse {
    pub message: String,
    pub ticket: Option<PasswordResetTicket>,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<UserView>),
        (status = 400, description = "Invalid username or weak password", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username already taken", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserView>>), ServiceError> {
    payload.validate()?;
    let user = state
        .auth
        .register(&payload.username, &payload.password)
        .await?;
    info!(user_id = %user.id, "account registered");
    Ok(created(user))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse<LoginResult>),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CredentialsRequest>,
) -> ApiResult<LoginResult> {
    payload.validate()?;
    let result = state
        .auth
        .login(&payload.username, &payload.password, client_ip(&headers))
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair", body = ApiResponse<TokenPair>),
        (status = 401, description = "Invalid or expired refresh token", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> ApiResult<TokenPair> {
    payload.validate()?;
    let tokens = state.auth.refresh(&payload.refresh_token).await?;
    Ok(Json(ApiResponse::success(tokens)))
}

#[utoipa::path(
    post,
    path = "/auth/password-reset/request",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset requested", body = ApiResponse<PasswordResetResponse>)
    ),
    tag = "auth"
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> ApiResult<PasswordResetResponse> {
    payload.validate()?;
    let ticket = state.auth.request_password_reset(&payload.username).await?;
    Ok(Json(ApiResponse::success(PasswordResetResponse {
        message: "If the account exists, a reset token has been issued".to_string(),
        ticket,
    })))
}

#[utoipa::path(
    post,
    path = "/auth/password-reset/confirm",
    request_body = PasswordResetConfirm,
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<String>),
        (status = 400, description = "Invalid or expired token", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetConfirm>,
) -> ApiResult<String> {
    payload.validate()?;
    state
        .auth
        .reset_password(&payload.token, &payload.new_password)
        .await?;
    Ok(Json(ApiResponse::success("Password has been reset".to_string())))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The authenticated account", body = ApiResponse<UserView>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn current_user(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<UserView> {
    Ok(Json(ApiResponse::success(
        state.services.users.get_user(user.user_id).await?,
    )))
}
