/*!
 * # Authentication and Authorization
 *
 * Bearer JWTs signed with a key that is built once from configuration and
 * handed to [`AuthService`]; nothing here reads process-wide state.
 *
 * Authorization is a capability check: every protected router is wrapped with
 * [`AuthRouterExt::with_capability`], which consults [`Role::can`].
 */

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{config::AppConfig, entities::user, errors::ServiceError};

pub mod password;
mod roles;
mod service;

pub use roles::{Capability, Role};
pub use service::{AuthService, LoginResult, PasswordResetTicket};

/// Distinguishes short-lived access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub kind: TokenKind,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated principal, placed in request extensions by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn require(&self, capability: Capability) -> Result<(), ServiceError> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "Role '{}' lacks capability {}",
                self.role, capability
            )))
        }
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Access/refresh pair handed out on login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Refresh token lifetime in seconds
    pub refresh_expires_in: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Wrong token type")]
    WrongTokenKind,

    #[error("Insufficient permissions: {0} required")]
    InsufficientCapability(Capability),

    #[error("Token creation failed: {0}")]
    TokenCreation(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuth => ServiceError::Unauthorized("Authentication required".into()),
            AuthError::InvalidCredentials => {
                ServiceError::AuthError("Invalid username or password".into())
            }
            AuthError::InvalidToken | AuthError::WrongTokenKind => {
                ServiceError::JwtError("Invalid authentication token".into())
            }
            AuthError::TokenExpired => ServiceError::JwtError("Token has expired".into()),
            AuthError::InsufficientCapability(cap) => {
                ServiceError::Forbidden(format!("Missing capability {}", cap))
            }
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Explicitly constructed HS256 signing key plus the claims policy.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(
        secret: &[u8],
        issuer: impl Into<String>,
        audience: impl Into<String>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            audience: audience.into(),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            config.auth_issuer.clone(),
            config.auth_audience.clone(),
            Duration::seconds(config.jwt_expiration as i64),
            Duration::seconds(config.refresh_token_expiration as i64),
        )
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        username: &str,
        role: Role,
        kind: TokenKind,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            role,
            kind,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl(kind)).timestamp(),
            nbf: now.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    pub fn issue_pair(&self, user: &user::Model) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue(user.id, &user.username, user.role, TokenKind::Access)?,
            refresh_token: self.issue(user.id, &user.username, user.role, TokenKind::Refresh)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
            refresh_expires_in: self.refresh_ttl.num_seconds(),
        })
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.validate_nbf = true;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;

        if data.claims.kind != expected {
            return Err(AuthError::WrongTokenKind);
        }
        Ok(data.claims)
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Validates the bearer token and inserts the resulting [`AuthUser`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return ServiceError::InternalError("Authentication service not available".into())
                .into_response()
        }
    };

    match auth_service.user_from_headers(request.headers()) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Rejects with 403 when the principal's role lacks `required`.
pub async fn capability_middleware(
    State(required): State<Capability>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.can(required) {
        debug!(user_id = %user.user_id, role = %user.role, capability = %required, "capability denied");
        return Err(AuthError::InsufficientCapability(required));
    }

    Ok(next.run(request).await)
}

pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_capability(self, capability: Capability) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_capability(self, capability: Capability) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            capability,
            capability_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SECRET: &[u8] = b"Zq8v1Lm3Np5Rt7Xw9Yb2Cd4Fg6Hj8Kl0Qs2Uv4Wx6Za8Bc0De2Fg4Hi6Jk8Lm0No2Pq";

    fn signer() -> TokenSigner {
        TokenSigner::new(
            SECRET,
            "equipment-lending",
            "equipment-lending-api",
            Duration::minutes(15),
            Duration::days(7),
        )
    }

    #[test]
    fn access_token_round_trip() {
        let id = Uuid::new_v4();
        let token = signer().issue(id, "alice", Role::User, TokenKind::Access).unwrap();
        let claims = signer().verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, Role::User);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let token = signer()
            .issue(Uuid::new_v4(), "bob", Role::Admin, TokenKind::Refresh)
            .unwrap();
        assert_matches!(
            signer().verify(&token, TokenKind::Access),
            Err(AuthError::WrongTokenKind)
        );
    }

    #[test]
    fn foreign_key_and_audience_are_rejected() {
        let other = TokenSigner::new(
            b"another-secret-another-secret-another-secret-another-secret-xyz",
            "equipment-lending",
            "equipment-lending-api",
            Duration::minutes(15),
            Duration::days(7),
        );
        let token = other
            .issue(Uuid::new_v4(), "eve", Role::Admin, TokenKind::Access)
            .unwrap();
        assert_matches!(
            signer().verify(&token, TokenKind::Access),
            Err(AuthError::InvalidToken)
        );

        let wrong_aud = TokenSigner::new(
            SECRET,
            "equipment-lending",
            "someone-else",
            Duration::minutes(15),
            Duration::days(7),
        );
        let token = wrong_aud
            .issue(Uuid::new_v4(), "eve", Role::Admin, TokenKind::Access)
            .unwrap();
        assert_matches!(
            signer().verify(&token, TokenKind::Access),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn expired_tokens_map_to_token_expired() {
        let expired = TokenSigner::new(
            SECRET,
            "equipment-lending",
            "equipment-lending-api",
            Duration::seconds(-3600),
            Duration::days(7),
        );
        let token = expired
            .issue(Uuid::new_v4(), "carol", Role::User, TokenKind::Access)
            .unwrap();
        assert_matches!(
            signer().verify(&token, TokenKind::Access),
            Err(AuthError::TokenExpired)
        );
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(bearer_token(&headers).is_none());
        headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn auth_errors_map_to_http_statuses() {
        use axum::http::StatusCode;
        assert_eq!(
            ServiceError::from(AuthError::MissingAuth).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::from(AuthError::InsufficientCapability(Capability::ManageUsers))
                .status_code(),
            StatusCode::FORBIDDEN
        );
    }
}
