mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use equipment_lending::{errors::ServiceError, services::lending::ReturnItemCommand};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn borrow_then_return_restores_stock() {
    let app = TestApp::new().await;
    let item = app.seed_item("Tripod", 10).await;
    let project = app.seed_project("Survey North").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/transactions/borrow",
            Some(json!({
                "item_id": item.id,
                "project_id": project.id,
                "quantity": 4,
                "borrow_date": "2024-05-01",
                "due_date": "2024-05-10"
            })),
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "borrow failed: {body}");
    assert_eq!(body["data"]["quantity"], 4);
    assert_eq!(body["data"]["remaining_quantity"], 4);
    assert_eq!(body["data"]["item_name"], "Tripod");
    assert_eq!(body["data"]["project_name"], "Survey North");
    assert_eq!(app.stock_of(item.id).await, 6);

    let borrow_id = body["data"]["id"].as_str().expect("borrow id").to_string();

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/transactions/return",
            Some(json!({
                "borrow_id": borrow_id,
                "quantity": 4,
                "return_date": "2024-05-08"
            })),
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "return failed: {body}");
    assert_eq!(body["data"]["quantity"], 4);
    assert_eq!(app.stock_of(item.id).await, 10);

    let (status, body) = app
        .json(
            Method::GET,
            &format!("/api/v1/transactions/borrows/{}", borrow_id),
            None,
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["remaining_quantity"], 0);
    assert_eq!(body["data"]["returned_quantity"], 4);
}

#[tokio::test]
async fn insufficient_stock_is_rejected_without_side_effects() {
    let app = TestApp::new().await;
    let item = app.seed_item("Battery pack", 2).await;
    let project = app.seed_project("Coastal mapping").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/transactions/borrow",
            Some(json!({
                "item_id": item.id,
                "project_id": project.id,
                "quantity": 3,
                "borrow_date": "2024-05-01",
                "due_date": "2024-05-02"
            })),
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["message"],
        "Not enough Battery pack in stock. Available: 2"
    );
    assert_eq!(body["details"]["available"], 2);
    assert_eq!(body["details"]["requested"], 3);
    assert_eq!(app.stock_of(item.id).await, 2);

    let (status, body) = app
        .json(
            Method::GET,
            "/api/v1/transactions/borrows",
            None,
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn partial_returns_accumulate_and_excess_is_rejected() {
    let app = TestApp::new().await;
    let item = app.seed_item("Propeller set", 8).await;
    let project = app.seed_project("Orchard survey").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/transactions/borrow",
            Some(json!({
                "item_id": item.id,
                "project_id": project.id,
                "quantity": 5,
                "borrow_date": "2024-05-01",
                "due_date": "2024-05-20"
            })),
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let borrow_id = body["data"]["id"].as_str().expect("borrow id").to_string();
    assert_eq!(app.stock_of(item.id).await, 3);

    for (quantity, day) in [(2, "2024-05-03"), (1, "2024-05-04")] {
        let (status, _) = app
            .json(
                Method::POST,
                "/api/v1/transactions/return",
                Some(json!({
                    "borrow_id": borrow_id,
                    "quantity": quantity,
                    "return_date": day
                })),
                Some(app.user_token()),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    assert_eq!(app.stock_of(item.id).await, 6);

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/transactions/return",
            Some(json!({
                "borrow_id": borrow_id,
                "quantity": 3,
                "return_date": "2024-05-05"
            })),
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"]["remaining"], 2);
    assert_eq!(body["details"]["requested"], 3);
    assert_eq!(app.stock_of(item.id).await, 6);

    let (status, body) = app
        .json(
            Method::GET,
            &format!("/api/v1/transactions/returns?borrow_id={}", borrow_id),
            None,
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
}

#[tokio::test]
async fn returning_an_unknown_borrow_is_not_found() {
    let app = TestApp::new().await;
    let item = app.seed_item("Gimbal", 3).await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/transactions/return",
            Some(json!({
                "borrow_id": Uuid::new_v4(),
                "quantity": 1,
                "return_date": "2024-05-05"
            })),
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.stock_of(item.id).await, 3);

    let (status, body) = app
        .json(
            Method::GET,
            "/api/v1/transactions/returns",
            None,
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn borrowing_against_a_missing_project_or_item_is_not_found() {
    let app = TestApp::new().await;
    let item = app.seed_item("Controller", 4).await;
    let project = app.seed_project("Bridge inspection").await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/transactions/borrow",
            Some(json!({
                "item_id": item.id,
                "project_id": Uuid::new_v4(),
                "quantity": 1,
                "borrow_date": "2024-05-01",
                "due_date": "2024-05-02"
            })),
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/transactions/borrow",
            Some(json!({
                "item_id": Uuid::new_v4(),
                "project_id": project.id,
                "quantity": 1,
                "borrow_date": "2024-05-01",
                "due_date": "2024-05-02"
            })),
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.stock_of(item.id).await, 4);
}

#[tokio::test]
async fn invalid_quantities_and_dates_are_bad_requests() {
    let app = TestApp::new().await;
    let item = app.seed_item("Landing pad", 4).await;
    let project = app.seed_project("Wind farm").await;

    let cases = [
        json!({
            "item_id": item.id, "project_id": project.id, "quantity": 0,
            "borrow_date": "2024-05-01", "due_date": "2024-05-02"
        }),
        json!({
            "item_id": item.id, "project_id": project.id, "quantity": 1,
            "borrow_date": "05/01/2024", "due_date": "2024-05-02"
        }),
        json!({
            "item_id": item.id, "project_id": project.id, "quantity": 1,
            "borrow_date": "2024-05-03", "due_date": "2024-05-02"
        }),
    ];
    for payload in cases {
        let (status, body) = app
            .json(
                Method::POST,
                "/api/v1/transactions/borrow",
                Some(payload),
                Some(app.user_token()),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "unexpected body {body}");
    }
    assert_eq!(app.stock_of(item.id).await, 4);
}

#[tokio::test]
async fn users_only_see_their_own_borrows() {
    let app = TestApp::new().await;
    let item = app.seed_item("Spare camera", 6).await;
    let project = app.seed_project("Harbour survey").await;
    let bob = app.create_user_account("bob").await;

    let (_, body) = app
        .json(
            Method::POST,
            "/api/v1/transactions/borrow",
            Some(json!({
                "item_id": item.id,
                "project_id": project.id,
                "quantity": 1,
                "borrow_date": "2024-05-01",
                "due_date": "2024-05-02"
            })),
            Some(app.user_token()),
        )
        .await;
    let borrow_id = body["data"]["id"].as_str().expect("borrow id").to_string();

    let (status, body) = app
        .json(
            Method::GET,
            "/api/v1/transactions/borrows",
            None,
            Some(&bob.token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);

    let (status, _) = app
        .json(
            Method::GET,
            &format!("/api/v1/transactions/borrows/{}", borrow_id),
            None,
            Some(&bob.token),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .json(
            Method::GET,
            &format!("/api/v1/admin/transactions/borrows/project/{}", project.id),
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["username"], "alice");
}

#[tokio::test]
async fn concurrent_borrows_never_oversell() {
    let app = TestApp::new().await;
    let item = app.seed_item("Thermal camera", 5).await;
    let project = app.seed_project("Night survey").await;
    let principal = app.user.principal();

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let lending = app.state.services.lending.clone();
        let principal = principal.clone();
        let cmd = TestApp::borrow_command(item.id, project.id, 3);
        tasks.push(tokio::spawn(async move {
            lending.borrow_item(&principal, cmd).await.is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap_or(false) {
            successes += 1;
        }
    }
    assert_eq!(successes, 1, "exactly one borrow of 3 out of 5 may succeed");
    assert_eq!(app.stock_of(item.id).await, 2);
}

#[tokio::test]
async fn lending_report_and_inventory_summary_reflect_activity() {
    let app = TestApp::new().await;
    let item = app.seed_item("Survey GPS", 10).await;
    let project = app.seed_project("Quarry mapping").await;
    let lending = &app.state.services.lending;
    let principal = app.user.principal();

    let borrow = lending
        .borrow_item(&principal, TestApp::borrow_command(item.id, project.id, 4))
        .await
        .expect("borrow");
    lending
        .return_item(
            &principal,
            ReturnItemCommand {
                borrow_id: borrow.id,
                quantity: 1,
                return_date: common::date(2024, 5, 3),
            },
        )
        .await
        .expect("return");

    let (status, body) = app
        .json(
            Method::GET,
            "/api/v1/admin/inventory-summary",
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let row = &body["data"]["items"][0];
    assert_eq!(row["on_hand"], 7);
    assert_eq!(row["on_loan"], 3);
    assert_eq!(row["total_tracked"], 10);

    let (status, body) = app
        .json(
            Method::GET,
            "/api/v1/admin/summary-table?type=borrow",
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "summary failed: {body}");

    let (status, _) = app
        .json(
            Method::GET,
            "/api/v1/admin/inventory-summary",
            None,
            Some(app.user_token()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn concurrent_returns_against_one_borrow_serialize() {
    let app = TestApp::new().await;
    let item = app.seed_item("Rotor guard", 7).await;
    let project = app.seed_project("Ridge survey").await;
    let principal = app.user.principal();

    let borrow = app
        .state
        .services
        .lending
        .borrow_item(&principal, TestApp::borrow_command(item.id, project.id, 4))
        .await
        .expect("borrow");
    assert_eq!(app.stock_of(item.id).await, 3);

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let lending = app.state.services.lending.clone();
        let principal = principal.clone();
        let cmd = ReturnItemCommand {
            borrow_id: borrow.id,
            quantity: 3,
            return_date: common::date(2024, 5, 6),
        };
        tasks.push(tokio::spawn(async move {
            lending.return_item(&principal, cmd).await
        }));
    }

    let mut successes = 0;
    for task in tasks {
        match task.await.expect("return task") {
            Ok(_) => successes += 1,
            Err(err) => assert!(
                matches!(err, ServiceError::ExcessReturn { remaining: 1, requested: 3, .. }),
                "unexpected error {err:?}"
            ),
        }
    }
    assert_eq!(successes, 1, "only one return of 3 fits in 4 outstanding");

    let after = app
        .state
        .services
        .lending
        .get_borrow(&principal, borrow.id)
        .await
        .expect("borrow view");
    assert_eq!(after.remaining_quantity, 1);
    assert_eq!(app.stock_of(item.id).await, 6);
}

#[tokio::test]
async fn catalog_edits_cannot_mint_stock() {
    let app = TestApp::new().await;
    let item = app.seed_item("Tripod", 10).await;
    let project = app.seed_project("Dune survey").await;
    app.state
        .services
        .lending
        .borrow_item(
            &app.user.principal(),
            TestApp::borrow_command(item.id, project.id, 4),
        )
        .await
        .expect("borrow");
    assert_eq!(app.stock_of(item.id).await, 6);

    // An edit built from a view fetched before the borrow still carries quantity 10
    let (status, body) = app
        .json(
            Method::PUT,
            &format!("/api/v1/items/{}", item.id),
            Some(json!({
                "name": "Tripod v2",
                "quantity": item.quantity,
                "category_id": item.category_id
            })),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "rename failed: {body}");
    assert_eq!(body["data"]["name"], "Tripod v2");
    assert_eq!(body["data"]["quantity"], 6);
    assert_eq!(app.stock_of(item.id).await, 6);

    let (status, body) = app
        .json(
            Method::GET,
            "/api/v1/admin/inventory-summary",
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"][0]["on_hand"], 6);
    assert_eq!(body["data"]["items"][0]["on_loan"], 4);
    assert_eq!(body["data"]["items"][0]["total_tracked"], 10);

    let (status, body) = app
        .json(
            Method::PUT,
            &format!("/api/v1/items/{}", item.id),
            Some(json!({
                "name": "Tripod v2",
                "category_id": item.category_id,
                "quantity_adjustment": -7
            })),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"]["available"], 6);
    assert_eq!(app.stock_of(item.id).await, 6);

    let (status, body) = app
        .json(
            Method::PUT,
            &format!("/api/v1/items/{}", item.id),
            Some(json!({
                "name": "Tripod v2",
                "category_id": item.category_id,
                "quantity_adjustment": -2
            })),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "write-off failed: {body}");
    assert_eq!(body["data"]["quantity"], 4);

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
    let adjustment = entries
        .iter()
        .find(|entry| entry["action"] == "adjust_stock")
        .expect("stock adjustment audited");
    assert_eq!(adjustment["old_value"]["quantity"], 6);
    assert_eq!(adjustment["new_value"]["quantity"], 4);
}
