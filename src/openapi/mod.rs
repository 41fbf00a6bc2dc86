use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Equipment Lending API",
        version = "1.0.0",
        description = r#"
# Equipment Lending API

Tracks warehouse equipment as it is borrowed for projects and handed back.

## Features

- **Lending**: Borrow and return items against projects with stock kept consistent under concurrent requests
- **Catalog**: Categories, items and projects
- **Damage Reports**: File damage against an item and review it
- **Warranties**: Serial-numbered warranty records with computed expiry
- **Reports**: Inventory position, per-project lending activity and the audit trail

## Authentication

Obtain a token pair from `POST /auth/login` and send the access token on every `/api/v1` call:

```
Authorization: Bearer <access-token>
```

## Partial returns

A borrow can be settled over several returns. Each return is checked against the
units still outstanding on the borrow (`remaining_quantity`), not against the
originally borrowed quantity.

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 30, max 100).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "auth", description = "Registration, login and password reset"),
        (name = "lending", description = "Borrow and return transactions"),
        (name = "catalog", description = "Categories, items and projects"),
        (name = "damage-reports", description = "Damage reporting and review"),
        (name = "warranties", description = "Warranty records"),
        (name = "users", description = "Account administration"),
        (name = "admin", description = "Reports and audit trail")
    ),
    paths(
        // Auth
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh_token,
        crate::handlers::auth::request_password_reset,
        crate::handlers::auth::confirm_password_reset,
        crate::handlers::auth::current_user,

        // Lending
        crate::handlers::lending::borrow_item,
        crate::handlers::lending::return_item,
        crate::handlers::lending::list_my_borrows,
        crate::handlers::lending::list_my_returns,
        crate::handlers::lending::get_borrow,
        crate::handlers::lending::admin_list_borrows,
        crate::handlers::lending::admin_list_project_borrows,
        crate::handlers::lending::admin_list_returns,

        // Catalog
        crate::handlers::items::list_items,
        crate::handlers::items::get_item,
        crate::handlers::items::create_item,
        crate::handlers::items::update_item,
        crate::handlers::items::delete_item,
        crate::handlers::categories::list_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::create_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,
        crate::handlers::projects::list_projects,
        crate::handlers::projects::list_projects_by_month,
        crate::handlers::projects::get_project,
        crate::handlers::projects::create_project,
        crate::handlers::projects::update_project,
        crate::handlers::projects::delete_project,

        // Damage reports
        crate::handlers::damage_reports::create_damage_report,
        crate::handlers::damage_reports::list_damage_reports,
        crate::handlers::damage_reports::get_damage_report,
        crate::handlers::damage_reports::update_damage_status,

        // Warranties
        crate::handlers::warranties::list_warranties,
        crate::handlers::warranties::get_warranty,
        crate::handlers::warranties::create_warranty,
        crate::handlers::warranties::update_warranty,
        crate::handlers::warranties::delete_warranty,

        // Users
        crate::handlers::users::list_users,
        crate::handlers::users::get_user,
        crate::handlers::users::create_user,
        crate::handlers::users::update_user_role,
        crate::handlers::users::delete_user,

        // Admin
        crate::handlers::reports::inventory_summary,
        crate::handlers::reports::summary_table,
        crate::handlers::reports::list_audit_logs,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::auth::Role,
            crate::entities::damage_report::DamageStatus,
            crate::services::reports::ReportKind,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_lending_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Equipment Lending API"));
        assert!(json.contains("/api/v1/transactions/borrow"));
        assert!(json.contains("/api/v1/projects/filter-month/{year}/{month}"));
        assert!(json.contains("bearer_auth"));
    }
}
