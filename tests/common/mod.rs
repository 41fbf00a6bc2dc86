#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use equipment_lending::{
    auth::{AuthUser, Role},
    build_app,
    config::AppConfig,
    db,
    entities::{category, project, user},
    events::{self, EventSender},
    services::{
        categories::CategoryInput,
        items::{ItemInput, ItemView},
        lending::BorrowItemCommand,
        projects::ProjectInput,
    },
    AppState,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str =
    "Zq8v1Lm3Np5Rt7Xw9Yb2Cd4Fg6Hj8Kl0Qs2Uv4Wx6Za8Bc0De2Fg4Hi6Jk8Lm0No2PqRs4Tu";
pub const ADMIN_PASSWORD: &str = "admin-password-1";
pub const USER_PASSWORD: &str = "user-password-1";

/// A principal seeded into the test database along with a bearer token.
pub struct TestAccount {
    pub user: user::Model,
    pub token: String,
}

impl TestAccount {
    pub fn principal(&self) -> AuthUser {
        AuthUser {
            user_id: self.user.id,
            username: self.user.username.clone(),
            role: self.user.role,
        }
    }
}

/// Application state backed by a throwaway SQLite file, fully migrated.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub admin: TestAccount,
    pub user: TestAccount,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = db_dir.path().join("lending_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_SECRET.to_string(),
            3600,
            86_400,
            "127.0.0.1".to_string(),
            18_080,
            "development".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.audit_enabled = true;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_sender, event_rx) = EventSender::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(db_arc, cfg, event_sender);
        let router = build_app(state.clone()).expect("build test router");

        let admin = Self::seed_account(&state, "admin", ADMIN_PASSWORD, Role::Admin).await;
        let user = Self::seed_account(&state, "alice", USER_PASSWORD, Role::User).await;

        Self {
            router,
            state,
            admin,
            user,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    async fn seed_account(
        state: &AppState,
        username: &str,
        password: &str,
        role: Role,
    ) -> TestAccount {
        let user = state
            .services
            .users
            .create_user(username, password, role)
            .await
            .expect("seed account");
        let token = state
            .auth
            .signer()
            .issue_pair(&user)
            .expect("issue test tokens")
            .access_token;
        TestAccount { user, token }
    }

    /// Creates an additional account with the `user` role.
    pub async fn create_user_account(&self, username: &str) -> TestAccount {
        Self::seed_account(&self.state, username, USER_PASSWORD, Role::User).await
    }

    pub fn admin_token(&self) -> &str {
        &self.admin.token
    }

    pub fn user_token(&self) -> &str {
        &self.user.token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request and returns the status with the decoded JSON body.
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, token).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is json")
        };
        (status, value)
    }

    pub async fn seed_category(&self, name: &str) -> category::Model {
        self.state
            .services
            .categories
            .create(CategoryInput {
                name: name.to_string(),
                description: None,
            })
            .await
            .expect("seed category")
    }

    pub async fn seed_item(&self, name: &str, quantity: i32) -> ItemView {
        let category = self.seed_category(&format!("{} category", name)).await;
        self.state
            .services
            .items
            .create(
                &self.admin.principal(),
                ItemInput {
                    name: name.to_string(),
                    description: None,
                    quantity,
                    status: None,
                    category_id: category.id,
                    remark: None,
                },
            )
            .await
            .expect("seed item")
    }

    pub async fn seed_project(&self, name: &str) -> project::Model {
        self.state
            .services
            .projects
            .create(ProjectInput {
                name: name.to_string(),
                description: None,
                start_date: Some("2024-04-01".to_string()),
                end_date: Some("2024-06-30".to_string()),
                drone_count: 2,
                location: Some("Hangar 3".to_string()),
            })
            .await
            .expect("seed project")
    }

    /// Current on-hand quantity of an item.
    pub async fn stock_of(&self, item_id: Uuid) -> i32 {
        self.state
            .services
            .items
            .get(item_id)
            .await
            .expect("item exists")
            .quantity
    }

    pub fn borrow_command(item_id: Uuid, project_id: Uuid, quantity: i32) -> BorrowItemCommand {
        BorrowItemCommand {
            item_id,
            project_id,
            quantity,
            borrow_date: date(2024, 5, 1),
            due_date: date(2024, 5, 15),
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}
