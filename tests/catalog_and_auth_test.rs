mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, USER_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn health_and_status_are_public() {
    let app = TestApp::new().await;

    let (status, body) = app.json(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");

    let (status, body) = app.json(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["service"], "equipment-lending");
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = TestApp::new().await;

    let (status, _) = app.json(Method::GET, "/api/v1/items", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(Method::GET, "/api/v1/items", None, Some("not-a-jwt"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(Method::GET, "/api/v1/items", None, Some(app.user_token()))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn regular_users_cannot_manage_the_catalog() {
    let app = TestApp::new().await;
    let category = app.seed_category("Cameras").await;

    let payload = json!({
        "name": "Zoom lens",
        "quantity": 3,
        "category_id": category.id
    });

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/items",
            Some(payload.clone()),
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json(Method::GET, "/api/v1/users", None, Some(app.user_token()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/items",
            Some(payload),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    assert_eq!(body["data"]["status"], "available");
    assert_eq!(body["data"]["category_name"], "Cameras");
}

#[tokio::test]
async fn item_listing_filters_and_paginates() {
    let app = TestApp::new().await;
    let category = app.seed_category("Batteries").await;
    for name in ["LiPo 4S", "LiPo 6S", "Charger hub"] {
        let (status, _) = app
            .json(
                Method::POST,
                "/api/v1/items",
                Some(json!({ "name": name, "quantity": 2, "category_id": category.id })),
                Some(app.admin_token()),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app
        .json(
            Method::GET,
            "/api/v1/items?search=LiPo&limit=1",
            None,
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn categories_with_items_cannot_be_deleted() {
    let app = TestApp::new().await;
    let item = app.seed_item("Drone frame", 1).await;

    let (status, _) = app
        .json(
            Method::DELETE,
            &format!("/api/v1/categories/{}", item.category_id),
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": item.category_name })),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn items_with_lending_history_cannot_be_deleted() {
    let app = TestApp::new().await;
    let item = app.seed_item("Rangefinder", 2).await;
    let project = app.seed_project("Forest canopy").await;
    app.state
        .services
        .lending
        .borrow_item(
            &app.user.principal(),
            TestApp::borrow_command(item.id, project.id, 1),
        )
        .await
        .expect("borrow");

    let (status, _) = app
        .json(
            Method::DELETE,
            &format!("/api/v1/items/{}", item.id),
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(
            Method::DELETE,
            &format!("/api/v1/projects/{}", project.id),
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn projects_filter_by_start_month() {
    let app = TestApp::new().await;
    app.seed_project("Spring campaign").await;

    let (status, body) = app
        .json(
            Method::GET,
            "/api/v1/projects/filter-month/2024/4",
            None,
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (status, body) = app
        .json(
            Method::GET,
            "/api/v1/projects/filter-month/2024/5",
            None,
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));

    let (status, _) = app
        .json(
            Method::GET,
            "/api/v1/projects/filter-month/2024/13",
            None,
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_login_and_refresh() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(
            Method::POST,
            "/auth/register",
            Some(json!({ "username": "carol", "password": USER_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    assert_eq!(body["data"]["role"], "user");

    let (status, _) = app
        .json(
            Method::POST,
            "/auth/register",
            Some(json!({ "username": "carol", "password": USER_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(
            Method::POST,
            "/auth/login",
            Some(json!({ "username": "carol", "password": "wrong-password" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .json(
            Method::POST,
            "/auth/login",
            Some(json!({ "username": "carol", "password": USER_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["data"]["access_token"].as_str().expect("access token").to_string();
    let refresh = body["data"]["refresh_token"].as_str().expect("refresh token").to_string();

    let (status, body) = app.json(Method::GET, "/auth/me", None, Some(&access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "carol");

    // A refresh token is not accepted as a bearer credential
    let (status, _) = app
        .json(Method::GET, "/api/v1/items", None, Some(&refresh))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .json(
            Method::POST,
            "/auth/refresh",
            Some(json!({ "refresh_token": refresh })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["access_token"].is_string());
}

#[tokio::test]
async fn password_reset_is_single_use() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(
            Method::POST,
            "/auth/password-reset/request",
            Some(json!({ "username": "alice" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["ticket"]["reset_token"]
        .as_str()
        .expect("reset token")
        .to_string();

    let confirm = json!({ "token": token, "new_password": "a-brand-new-secret" });
    let (status, _) = app
        .json(
            Method::POST,
            "/auth/password-reset/confirm",
            Some(confirm.clone()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(Method::POST, "/auth/password-reset/confirm", Some(confirm), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(
            Method::POST,
            "/auth/login",
            Some(json!({ "username": "alice", "password": "a-brand-new-secret" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Unknown accounts get the same answer without a ticket
    let (status, body) = app
        .json(
            Method::POST,
            "/auth/password-reset/request",
            Some(json!({ "username": "nobody" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["ticket"].is_null());
}

#[tokio::test]
async fn mutating_calls_are_audited() {
    let app = TestApp::new().await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "Sensors" })),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .json(
            Method::GET,
            "/api/v1/admin/audit-logs",
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"]["items"].as_array().expect("audit entries");
    assert!(entries.iter().any(|entry| {
        entry["table_name"] == "categories" && entry["user_id"] == json!(app.admin.user.id)
    }));
}
