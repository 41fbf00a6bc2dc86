//! Audit trail for mutating API calls.
//!
//! Every `POST`/`PUT`/`PATCH`/`DELETE` under `/api` made by an authenticated
//! principal is persisted as an [`crate::entities::audit_log`] row once the
//! response is known. Persistence is best-effort: a failed insert is logged and
//! never changes the response.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{services::audit::AuditEntry, AppState};

/// Categories of auditable actions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Lending,
    DataWrite,
    DataDelete,
    Admin,
}

impl ActionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lending => "lending",
            Self::DataWrite => "data_write",
            Self::DataDelete => "data_delete",
            Self::Admin => "admin",
        }
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn is_audited_path(path: &str) -> bool {
    path.starts_with("/api/")
}

/// Extract resource type and ID from an `/api/v1/<resource>/<id>` path
fn extract_resource_info(path: &str) -> (Option<String>, Option<Uuid>) {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if parts.len() < 3 || parts[0] != "api" {
        return (None, None);
    }
    let resource = match parts[2] {
        "admin" | "transactions" if parts.len() >= 4 => parts[3],
        other => other,
    };
    let record_id = parts.iter().skip(3).find_map(|p| Uuid::parse_str(p).ok());
    (Some(resource.replace('-', "_")), record_id)
}

/// Categorize the action based on HTTP method and path
fn categorize_action(method: &Method, path: &str) -> ActionCategory {
    if path.contains("/transactions/") {
        return ActionCategory::Lending;
    }
    if path.contains("/users") {
        return ActionCategory::Admin;
    }
    match *method {
        Method::DELETE => ActionCategory::DataDelete,
        _ => ActionCategory::DataWrite,
    }
}

/// First hop of `x-forwarded-for`, falling back to `x-real-ip`.
pub(crate) fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
}

pub async fn audit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !state.config.audit_enabled || !is_mutating(req.method()) || !is_audited_path(req.uri().path())
    {
        return next.run(req).await;
    }

    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let ip_address = client_ip(req.headers());
    let user_id = state
        .auth
        .user_from_headers(req.headers())
        .ok()
        .map(|user| user.user_id);
    let request_id = crate::tracing::current_request_id().map(|rid| rid.0);
    let category = categorize_action(&method, &path);

    let response = next.run(req).await;

    let status_code = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis() as u64;

    info!(
        method = %method,
        path = %path,
        user_id = ?user_id,
        client_ip = ?ip_address,
        status_code,
        duration_ms,
        category = category.as_str(),
        "audit_log"
    );
    if status_code == 401 || status_code == 403 {
        warn!(method = %method, path = %path, client_ip = ?ip_address, status_code, "access_denied");
    }

    // Anonymous calls are rejected before reaching a handler; nothing to attribute.
    if let Some(user_id) = user_id {
        let (table_name, record_id) = extract_resource_info(&path);
        state
            .services
            .audit
            .record(AuditEntry {
                user_id: Some(user_id),
                action: format!("{} {}", method, path),
                table_name,
                record_id,
                old_value: None,
                new_value: Some(json!({
                    "status": status_code,
                    "category": category.as_str(),
                    "request_id": request_id,
                })),
                ip_address,
            })
            .await;
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorizes_by_path_then_method() {
        assert_eq!(
            categorize_action(&Method::POST, "/api/v1/transactions/borrow"),
            ActionCategory::Lending
        );
        assert_eq!(
            categorize_action(&Method::PUT, "/api/v1/users/abc"),
            ActionCategory::Admin
        );
        assert_eq!(
            categorize_action(&Method::DELETE, "/api/v1/items/abc"),
            ActionCategory::DataDelete
        );
        assert_eq!(
            categorize_action(&Method::PUT, "/api/v1/items/abc"),
            ActionCategory::DataWrite
        );
    }

    #[test]
    fn only_mutations_on_api_paths_are_audited() {
        assert!(is_mutating(&Method::POST));
        assert!(!is_mutating(&Method::GET));
        assert!(is_audited_path("/api/v1/items"));
        assert!(!is_audited_path("/health"));
    }

    #[test]
    fn resource_info_skips_grouping_segments() {
        let id = Uuid::new_v4();
        assert_eq!(
            extract_resource_info(&format!("/api/v1/items/{id}")),
            (Some("items".to_string()), Some(id))
        );
        assert_eq!(
            extract_resource_info("/api/v1/transactions/borrow"),
            (Some("borrow".to_string()), None)
        );
        assert_eq!(
            extract_resource_info(&format!("/api/v1/damage-reports/{id}/status")),
            (Some("damage_reports".to_string()), Some(id))
        );
        assert_eq!(extract_resource_info("/health"), (None, None));
    }

    #[test]
    fn client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, 192.168.1.1".parse().unwrap());
        headers.insert("x-real-ip", "172.16.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.1"));

        headers.remove("x-forwarded-for");
        assert_eq!(client_ip(&headers).as_deref(), Some("172.16.0.1"));
    }
}
