//! HTTP-level tests: the real router over an in-memory database.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use stockbook_core::Role;
use stockbook_db::{Database, DbConfig};
use stockbook_server::auth::hash_password;
use stockbook_server::config::ServerConfig;
use stockbook_server::{bootstrap_admin, build_app, AppState};
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "admin-password";

struct TestApp {
    app: Router,
    state: AppState,
}

impl TestApp {
    async fn new() -> Self {
        let mut config = ServerConfig::default();
        config.auth.jwt_secret = "integration-test-secret-0123456789".to_string();
        config.auth.bootstrap_admin_password = Some(ADMIN_PASSWORD.to_string());
        config.validate().unwrap();

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let state = AppState::new(db, config);
        bootstrap_admin(&state).await.unwrap();

        TestApp {
            app: build_app(state.clone()),
            state,
        }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin(&self) -> String {
        self.login("admin", ADMIN_PASSWORD).await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    async fn create_partner(&self, token: &str, name: &str, kind: &str) -> i64 {
        let (status, body) = self.post("/api/partners", token, json!({ "name": name, "kind": kind })).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    async fn create_item(&self, token: &str, code: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/items",
                token,
                json!({
                    "code": code,
                    "name": format!("Item {code}"),
                    "unitPriceCents": 250,
                    "costPriceCents": 120,
                    "minStockLevel": 2
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    async fn trade(&self, token: &str, kind: &str, partner_id: i64, item_id: i64, quantity: i64) -> (StatusCode, Value) {
        self.post(
            "/api/transactions",
            token,
            json!({
                "kind": kind,
                "partnerId": partner_id,
                "lines": [{ "itemId": item_id, "quantity": quantity }]
            }),
        )
        .await
    }
}

#[tokio::test]
async fn test_health_is_public_and_api_is_not() {
    let t = TestApp::new().await;

    let (status, body) = t.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);

    let (status, body) = t.send(Method::GET, "/api/items", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, _) = t.send(Method::GET, "/api/items", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_and_me() {
    let t = TestApp::new().await;

    let (status, body) = t
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "admin", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid username or password");

    let token = t.admin().await;
    let (status, body) = t.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "admin");
    assert_eq!(body["user"]["role"], "admin");
    assert!(body["permissions"]
        .as_array()
        .unwrap()
        .contains(&json!("settings")));
}

#[tokio::test]
async fn test_purchase_then_sale_moves_stock() {
    let t = TestApp::new().await;
    let token = t.admin().await;

    let supplier = t.create_partner(&token, "Acme Supply", "supplier").await;
    let customer = t.create_partner(&token, "Jane Doe", "customer").await;
    let item = t.create_item(&token, "WIDGET").await;

    let (status, body) = t.trade(&token, "purchase", supplier, item, 10).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["transaction"]["status"], "completed");
    assert!(body["transaction"]["reference"].as_str().unwrap().starts_with("PO-"));

    let (status, body) = t.trade(&token, "sale", customer, item, 4).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["transaction"]["totalCents"], 1000);
    assert_eq!(body["transaction"]["items"][0]["amountCents"], 1000);

    let (_, level) = t.get(&format!("/api/items/{item}/inventory"), &token).await;
    assert_eq!(level["quantity"], 6);

    let (_, history) = t.get(&format!("/api/items/{item}/inventory/history"), &token).await;
    let changes: Vec<i64> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["change"].as_i64().unwrap())
        .collect();
    assert_eq!(changes, vec![10, -4]);

    let (_, replay) = t.get(&format!("/api/items/{item}/inventory/replay"), &token).await;
    assert_eq!(replay["historySum"], 6);
    assert_eq!(replay["chainIntact"], true);
}

#[tokio::test]
async fn test_oversell_is_rejected_without_side_effects() {
    let t = TestApp::new().await;
    let token = t.admin().await;

    let customer = t.create_partner(&token, "Jane Doe", "customer").await;
    let item = t.create_item(&token, "SCARCE").await;

    let (status, body) = t.trade(&token, "sale", customer, item, 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");

    let (_, list) = t.get("/api/transactions", &token).await;
    assert!(list.as_array().unwrap().is_empty());
    let (_, history) = t.get(&format!("/api/items/{item}/inventory/history"), &token).await;
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_adjustment_can_go_negative_with_warning() {
    let t = TestApp::new().await;
    let token = t.admin().await;
    let item = t.create_item(&token, "COUNTED").await;

    let (status, body) = t
        .post(&format!("/api/items/{item}/inventory/adjust"), &token, json!({ "delta": -3 }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["record"]["quantityAfter"], -3);
    assert_eq!(body["warnings"][0]["kind"], "negative_stock");
}

#[tokio::test]
async fn test_duplicate_barcode_conflicts() {
    let t = TestApp::new().await;
    let token = t.admin().await;
    let first = t.create_item(&token, "FIRST").await;
    let second = t.create_item(&token, "SECOND").await;

    let (status, _) = t
        .post(&format!("/api/items/{first}/barcodes"), &token, json!({ "code": "4006381333931" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = t
        .post(&format!("/api/items/{second}/barcodes"), &token, json!({ "code": "4006381333931" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = t.get("/api/barcodes/4006381333931", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], "FIRST");
}

#[tokio::test]
async fn test_cancel_twice_is_invalid_status() {
    let t = TestApp::new().await;
    let token = t.admin().await;
    let supplier = t.create_partner(&token, "Acme Supply", "supplier").await;
    let item = t.create_item(&token, "RETURNED").await;

    let (_, body) = t.trade(&token, "purchase", supplier, item, 5).await;
    let id = body["transaction"]["id"].as_i64().unwrap();

    let (status, body) = t.post(&format!("/api/transactions/{id}/cancel"), &token, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["transaction"]["status"], "canceled");

    let (_, level) = t.get(&format!("/api/items/{item}/inventory"), &token).await;
    assert_eq!(level["quantity"], 0);

    let (status, body) = t.post(&format!("/api/transactions/{id}/cancel"), &token, json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_STATUS");
}

#[tokio::test]
async fn test_category_cycle_is_rejected() {
    let t = TestApp::new().await;
    let token = t.admin().await;

    let (_, parent) = t.post("/api/categories", &token, json!({ "name": "Drinks" })).await;
    let parent_id = parent["id"].as_i64().unwrap();
    let (_, child) = t
        .post("/api/categories", &token, json!({ "name": "Soda", "parentId": parent_id }))
        .await;
    let child_id = child["id"].as_i64().unwrap();

    let (status, body) = t
        .send(
            Method::PUT,
            &format!("/api/categories/{parent_id}"),
            Some(&token),
            Some(json!({ "name": "Drinks", "parentId": child_id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_clerk_permissions() {
    let t = TestApp::new().await;
    let hash = hash_password("clerk-password").unwrap();
    t.state.db.users().create("carol", &hash, Role::Clerk).await.unwrap();
    let token = t.login("carol", "clerk-password").await;

    let (status, _) = t.get("/api/items", &token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t.get("/api/settings", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = t
        .post("/api/items", &token, json!({ "code": "NOPE", "name": "Nope" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_payment_settles_sale() {
    let t = TestApp::new().await;
    let token = t.admin().await;
    let supplier = t.create_partner(&token, "Acme Supply", "supplier").await;
    let customer = t.create_partner(&token, "Jane Doe", "customer").await;
    let item = t.create_item(&token, "PAID").await;
    t.trade(&token, "purchase", supplier, item, 10).await;

    let (_, sale) = t.trade(&token, "sale", customer, item, 2).await;
    let id = sale["transaction"]["id"].as_i64().unwrap();

    let (status, body) = t
        .post(
            "/api/payments",
            &token,
            json!({ "transactionId": id, "method": "cash", "amountCents": 200, "status": "completed" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (_, detail) = t.get(&format!("/api/transactions/{id}"), &token).await;
    assert_eq!(detail["status"], "partial");

    let (_, payments) = t.get(&format!("/api/transactions/{id}/payments"), &token).await;
    assert_eq!(payments.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_settings_and_scheduled_tasks() {
    let t = TestApp::new().await;
    let token = t.admin().await;

    let (status, body) = t
        .send(Method::PUT, "/api/settings/tax_rate", Some(&token), Some(json!(1000)))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["value"], 1000);

    let (status, _) = t
        .send(Method::PUT, "/api/settings/tax_rate", Some(&token), Some(json!("ten")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, task) = t
        .post(
            "/api/scheduled-tasks",
            &token,
            json!({ "name": "hourly-scan", "kind": "notification_scan", "intervalMinutes": 60 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{task}");
    let id = task["id"].as_i64().unwrap();

    let (status, ran) = t.post(&format!("/api/scheduled-tasks/{id}/run"), &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(ran["lastRunAt"].is_string());
    assert!(ran["lastError"].is_null());
}

#[tokio::test]
async fn test_malformed_body_is_validation_error() {
    let t = TestApp::new().await;
    let token = t.admin().await;

    let (status, body) = t.post("/api/partners", &token, json!({ "name": "No kind" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_far_future_transaction_date_is_rejected() {
    let t = TestApp::new().await;
    let token = t.admin().await;
    let supplier = t.create_partner(&token, "Acme", "supplier").await;
    let item = t.create_item(&token, "FAR").await;

    let (status, body) = t
        .post(
            "/api/transactions",
            &token,
            json!({
                "kind": "purchase",
                "partnerId": supplier,
                "transactionDate": "+262142-12-31",
                "lines": [{ "itemId": item, "quantity": 1 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (_, levels) = t.get(&format!("/api/items/{item}/inventory"), &token).await;
    assert_eq!(levels["quantity"], 0);
}
