use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use crate::{config::AppConfig, ApiResponse, PaginatedResponse};

/// Pagination parameters shared by list endpoints
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// One-based page number
    pub page: Option<u64>,
    /// Page size, clamped to the configured maximum
    pub limit: Option<u64>,
}

impl PaginationParams {
    /// Resolves `(page, limit)` against the configured defaults.
    pub fn resolve(&self, config: &AppConfig) -> (u64, u64) {
        (self.page.unwrap_or(1).max(1), config.page_size(self.limit))
    }
}

pub fn total_pages(total: u64, limit: u64) -> u64 {
    if total == 0 || limit == 0 {
        0
    } else {
        (total + limit - 1) / limit
    }
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        Self {
            items,
            total,
            page,
            limit,
            total_pages: total_pages(total, limit),
        }
    }
}

/// `201 Created` with the standard envelope
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 30), 0);
        assert_eq!(total_pages(30, 30), 1);
        assert_eq!(total_pages(31, 30), 2);
    }

    #[test]
    fn pagination_defaults_come_from_config() {
        let config = AppConfig::new(
            "sqlite::memory:".into(),
            "k".repeat(64),
            900,
            604800,
            "127.0.0.1".into(),
            8080,
            "development".into(),
        );
        let params = PaginationParams::default();
        assert_eq!(params.resolve(&config), (1, config.api_default_page_size));

        let params = PaginationParams {
            page: Some(0),
            limit: Some(10_000),
        };
        assert_eq!(params.resolve(&config), (1, config.api_max_page_size));
    }
}
