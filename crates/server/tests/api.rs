use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::ServiceExt;

use migration::MigratorTrait;

async fn app() -> Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let state = server::ServerState {
        ledger: engine::Ledger::new(db),
        upload_dir: std::env::temp_dir(),
    };
    server::router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_user(app: &Router, name: &str) -> i32 {
    let (status, body) = send(
        app,
        "POST",
        "/users",
        Some(json!({
            "name": name,
            "email": format!("{}@example.com", name.to_lowercase()),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap() as i32
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["database"], "ok");
}

#[tokio::test]
async fn deposit_flow_updates_balances() {
    let app = app().await;
    let alice = create_user(&app, "Alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/transactions/deposit",
        Some(json!({
            "user_id": alice,
            "amount": "50,00",
            "description": "Payday",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ids"].as_array().unwrap().len(), 1);

    let (status, body) = send(&app, "GET", "/api/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Alice");
    assert_eq!(body[0]["balance_cents"], 5000);
}

#[tokio::test]
async fn expense_splits_and_lists_in_month_view() {
    let app = app().await;
    let bob = create_user(&app, "Bob").await;
    let carol = create_user(&app, "Carol").await;

    let (status, body) = send(
        &app,
        "POST",
        "/transactions/expense",
        Some(json!({
            "buyer_id": bob,
            "description": "Pizza night",
            "items": [
                {"name": "Pizza", "price": "10.00", "debtor_id": carol},
                {"name": "Drink", "price": "5.00", "debtor_id": carol},
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["ids"][0].as_i64().unwrap();

    let (status, body) = send(&app, "GET", "/transactions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transaction_count"], 1);
    assert_eq!(body["total_cents"], 1500);
    let tx = &body["days"][0]["transactions"][0];
    assert_eq!(tx["id"].as_i64().unwrap(), id);
    assert_eq!(tx["amount_cents"], 1500);
    assert_eq!(tx["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn delete_restores_balances() {
    let app = app().await;
    let alice = create_user(&app, "Alice").await;

    let (_, body) = send(
        &app,
        "POST",
        "/transactions/withdrawal",
        Some(json!({"user_id": alice, "amount": "30.00"})),
    )
    .await;
    let id = body["ids"][0].as_i64().unwrap();

    let (status, _) = send(&app, "DELETE", &format!("/transactions/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/users", None).await;
    assert_eq!(body[0]["balance_cents"], 0);
}

#[tokio::test]
async fn invalid_amount_is_rejected() {
    let app = app().await;
    let alice = create_user(&app, "Alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/transactions/deposit",
        Some(json!({"user_id": alice, "amount": "not-a-number"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("Invalid amount"));
}

#[tokio::test]
async fn unknown_user_yields_404() {
    let app = app().await;
    let (status, _) = send(
        &app,
        "POST",
        "/transactions/deposit",
        Some(json!({"user_id": 999, "amount": "5.00"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_user_yields_409() {
    let app = app().await;
    create_user(&app, "Alice").await;
    let (status, _) = send(
        &app,
        "POST",
        "/users",
        Some(json!({"name": "Alice", "email": "alice2@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn analytics_data_has_all_sections() {
    let app = app().await;
    let alice = create_user(&app, "Alice").await;
    send(
        &app,
        "POST",
        "/transactions/deposit",
        Some(json!({"user_id": alice, "amount": "50.00"})),
    )
    .await;

    let (status, body) = send(&app, "GET", "/analytics/data", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["transaction_count"], 1);
    assert_eq!(body["meta"]["user_count"], 1);
    assert_eq!(body["balances"][0]["balance_cents"], 5000);
    assert!(body["balance_history"]["datasets"]["Alice"].is_array());
    assert!(body["transaction_volume"]["counts"].is_array());
    assert_eq!(body["type_breakdown"]["kinds"][0], "deposit");
    assert_eq!(body["type_breakdown"]["counts"][0], 1);
    assert!(body["top_items"]["names"].is_array());
}

#[tokio::test]
async fn analytics_bad_dates_fall_back_to_default_range() {
    let app = app().await;
    let (status, body) = send(
        &app,
        "GET",
        "/analytics/data?date_from=garbage&date_to=also-garbage",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // Falls back to the last 90 days rather than erroring.
    assert_eq!(body["meta"]["transaction_count"], 0);
    assert!(body["meta"]["date_from"].as_str().unwrap().len() == 10);
}

#[tokio::test]
async fn search_filters_by_text() {
    let app = app().await;
    let alice = create_user(&app, "Alice").await;
    send(
        &app,
        "POST",
        "/transactions/deposit",
        Some(json!({"user_id": alice, "amount": "5.00", "description": "Rent share"})),
    )
    .await;
    send(
        &app,
        "POST",
        "/transactions/deposit",
        Some(json!({"user_id": alice, "amount": "5.00", "description": "Coffee"})),
    )
    .await;

    let (status, body) = send(&app, "GET", "/transactions/search?q=rent", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["transactions"][0]["description"], "Rent share");
}

#[tokio::test]
async fn settings_roundtrip_masks_secrets() {
    let app = app().await;

    let (status, _) = send(
        &app,
        "PUT",
        "/settings",
        Some(json!({"settings": {
            "timezone": "Europe/Rome",
            "smtp_password": "hunter2",
        }})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["timezone"], "Europe/Rome");
    assert_eq!(body["settings"]["smtp_password"], "********");
}

#[tokio::test]
async fn user_detail_paginates_transactions() {
    let app = app().await;
    let alice = create_user(&app, "Alice").await;
    for _ in 0..3 {
        send(
            &app,
            "POST",
            "/transactions/deposit",
            Some(json!({"user_id": alice, "amount": "1.00"})),
        )
        .await;
    }

    let (status, body) = send(&app, "GET", &format!("/users/{alice}?page=1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Alice");
    assert_eq!(body["total"], 3);
    assert_eq!(body["transactions"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn edit_moves_deposit_between_users() {
    let app = app().await;
    let alice = create_user(&app, "Alice").await;
    let bob = create_user(&app, "Bob").await;

    let (_, body) = send(
        &app,
        "POST",
        "/transactions/deposit",
        Some(json!({"user_id": alice, "amount": "50.00"})),
    )
    .await;
    let id = body["ids"][0].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/transactions/{id}"),
        Some(json!({
            "description": "Deposit",
            "to_user_id": bob,
            "amount": "50.00",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/users", None).await;
    let balances: Vec<(String, i64)> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| {
            (
                u["name"].as_str().unwrap().to_string(),
                u["balance_cents"].as_i64().unwrap(),
            )
        })
        .collect();
    assert!(balances.contains(&("Alice".to_string(), 0)));
    assert!(balances.contains(&("Bob".to_string(), 5000)));
}
