use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use super::{bearer_token, password, AuthError, AuthUser, Role, TokenKind, TokenPair, TokenSigner};
use crate::{
    entities::user,
    errors::ServiceError,
    services::{
        audit::{AuditEntry, AuditService},
        users::{UserService, UserView},
    },
};

const RESET_TOKEN_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResult {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: UserView,
}

/// Single-use reset token. There is no mail transport, so the token is handed
/// back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PasswordResetTicket {
    pub reset_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Account lifecycle: registration, login, refresh and password reset.
#[derive(Clone)]
pub struct AuthService {
    db: Arc<DatabaseConnection>,
    signer: TokenSigner,
    users: Arc<UserService>,
    audit: Arc<AuditService>,
    reset_ttl: Duration,
}

impl AuthService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        signer: TokenSigner,
        users: Arc<UserService>,
        audit: Arc<AuditService>,
        reset_ttl: Duration,
    ) -> Self {
        Self {
            db,
            signer,
            users,
            audit,
            reset_ttl,
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Resolves the principal from an `Authorization: Bearer` access token.
    pub fn user_from_headers(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingAuth)?;
        self.signer
            .verify(token, TokenKind::Access)
            .map(AuthUser::from)
    }

    /// Self-service sign-up. New accounts always get the `user` role.
    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<UserView, ServiceError> {
        let created = self.users.create_user(username, password, Role::User).await?;

        self.audit
            .record(
                AuditEntry::new("register")
                    .by(created.id)
                    .on("users", created.id)
                    .change(None, Some(json!({ "username": created.username }))),
            )
            .await;

        Ok(created.into())
    }

    #[instrument(skip(self, password, ip_address))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        ip_address: Option<String>,
    ) -> Result<LoginResult, ServiceError> {
        let found = self.users.find_by_username(username.trim()).await?;

        let verified = match &found {
            Some(u) => password::verify_password(password, &u.password_hash)?,
            None => false,
        };

        let account = match found {
            Some(u) if verified => u,
            other => {
                warn!(username = %username, "login failed");
                let mut entry = AuditEntry::new("login_failed")
                    .change(None, Some(json!({ "username": username })));
                if let Some(u) = other {
                    entry = entry.by(u.id).on("users", u.id);
                }
                entry.ip_address = ip_address;
                self.audit.record(entry).await;
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let tokens = self.signer.issue_pair(&account)?;

        let mut entry = AuditEntry::new("login").by(account.id).on("users", account.id);
        entry.ip_address = ip_address;
        self.audit.record(entry).await;

        info!(user_id = %account.id, "login succeeded");
        Ok(LoginResult {
            tokens,
            user: account.into(),
        })
    }

    /// Exchanges a refresh token for a new pair carrying the user's current role.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ServiceError> {
        let claims = self.signer.verify(refresh_token, TokenKind::Refresh)?;
        let account = user::Entity::find_by_id(claims.sub)
            .one(&*self.db)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        Ok(self.signer.issue_pair(&account)?)
    }

    /// Always succeeds for the caller; returns a ticket only when the account exists.
    #[instrument(skip(self))]
    pub async fn request_password_reset(
        &self,
        username: &str,
    ) -> Result<Option<PasswordResetTicket>, ServiceError> {
        let Some(account) = self.users.find_by_username(username.trim()).await? else {
            info!("password reset requested for unknown account");
            return Ok(None);
        };

        let token: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RESET_TOKEN_LEN)
            .map(char::from)
            .collect();
        let expires_at = Utc::now() + self.reset_ttl;

        let account_id = account.id;
        let mut active: user::ActiveModel = account.into();
        active.reset_token = Set(Some(token.clone()));
        active.reset_token_expires_at = Set(Some(expires_at));
        active.update(&*self.db).await?;

        self.audit
            .record(
                AuditEntry::new("password_reset_requested")
                    .by(account_id)
                    .on("users", account_id),
            )
            .await;

        Ok(Some(PasswordResetTicket {
            reset_token: token,
            expires_at,
        }))
    }

    #[instrument(skip(self, token, new_password))]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ServiceError> {
        password::validate_password_strength(new_password)?;

        let token = token.trim();
        if token.is_empty() {
            return Err(ServiceError::InvalidInput("Reset token is required".into()));
        }

        let account = user::Entity::find()
            .filter(user::Column::ResetToken.eq(token))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::InvalidInput("Invalid or expired reset token".into()))?;

        let expired = account
            .reset_token_expires_at
            .map_or(true, |expires_at| expires_at < Utc::now());
        if expired {
            return Err(ServiceError::InvalidInput(
                "Invalid or expired reset token".into(),
            ));
        }

        let account_id = account.id;
        let mut active: user::ActiveModel = account.into();
        active.password_hash = Set(password::hash_password(new_password)?);
        active.reset_token = Set(None);
        active.reset_token_expires_at = Set(None);
        active.update(&*self.db).await?;

        self.audit
            .record(
                AuditEntry::new("password_reset")
                    .by(account_id)
                    .on("users", account_id),
            )
            .await;
        Ok(())
    }
}
