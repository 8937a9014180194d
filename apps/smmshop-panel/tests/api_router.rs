use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use smmshop_db::init_memory_db;
use smmshop_panel::config::Config;
use smmshop_panel::services::notification_service::NoopNotifier;
use smmshop_panel::{AppState, app};
use std::sync::Arc;
use tower::ServiceExt;

const BOT_TOKEN: &str = "bot-secret";
const ADMIN_KEY: &str = "admin-secret";

async fn test_app() -> Router {
    app_with(Config {
        bot_api_token: BOT_TOKEN.to_string(),
        admin_api_key: ADMIN_KEY.to_string(),
        ..Default::default()
    })
    .await
}

async fn app_with(config: Config) -> Router {
    let pool = init_memory_db().await.unwrap();
    let state = AppState::new(pool, config, Arc::new(NoopNotifier)).await.unwrap();
    app(state)
}

async fn call(app: &Router, method: Method, uri: &str, header: Option<(&str, &str)>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((name, value)) = header {
        builder = builder.header(name, value);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn bot() -> Option<(&'static str, &'static str)> {
    Some(("X-Bot-Token", BOT_TOKEN))
}

fn admin() -> Option<(&'static str, &'static str)> {
    Some(("X-API-Key", ADMIN_KEY))
}

#[tokio::test]
async fn health_is_public() {
    let app = test_app().await;
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn secrets_are_required() {
    let app = test_app().await;

    let (status, body) = call(&app, Method::GET, "/api/admin/stats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = call(&app, Method::GET, "/api/admin/stats", Some(("X-API-Key", "wrong")), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/api/v2/bot/categories", Some(("X-API-Key", ADMIN_KEY)), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn webapp_rejects_bad_init_data_as_unauthorized() {
    let unconfigured = test_app().await;
    let (status, body) = call(&unconfigured, Method::POST, "/api/webapp/data", None, Some(json!({ "initData": "" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let app = app_with(Config {
        bot_api_token: BOT_TOKEN.to_string(),
        admin_api_key: ADMIN_KEY.to_string(),
        bot_token: Some("123456:telegram-token".to_string()),
        ..Default::default()
    })
    .await;
    let forged = "auth_date=1700000000&user=%7B%22id%22%3A1%7D&hash=00ff";
    let (status, body) = call(&app, Method::POST, "/api/webapp/data", None, Some(json!({ "initData": forged }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].as_str().unwrap().contains("Invalid init data"));
}

#[tokio::test]
async fn unknown_user_is_json_404() {
    let app = test_app().await;
    let (status, body) = call(&app, Method::GET, "/api/v2/bot/users/424242", bot(), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn order_flow_through_both_apis() {
    let app = test_app().await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v2/bot/users/register",
        bot(),
        Some(json!({ "telegram_id": 1001, "username": "buyer", "full_name": "Buyer One", "start_payload": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_new"], true);
    assert_eq!(body["user"]["balance"], 0);

    let (status, category) = call(&app, Method::POST, "/api/admin/categories", admin(), Some(json!({ "name": "Instagram" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, service) = call(
        &app,
        Method::POST,
        "/api/admin/services",
        admin(),
        Some(json!({
            "name": "Followers",
            "base_price": 300,
            "base_quantity": 1000,
            "min_quantity": 100,
            "max_quantity": 5000,
            "is_available": true,
            "category_id": category["id"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let service_id = service["id"].as_i64().unwrap();

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/admin/users/1001/adjust",
        admin(),
        Some(json!({ "amount": 1000, "op": "add" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, roots) = call(&app, Method::GET, "/api/v2/bot/categories", bot(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roots.as_array().unwrap().len(), 1);

    let order = json!({
        "telegram_id": 1001,
        "service_id": service_id,
        "quantity": 1000,
        "link": "https://instagram.com/someone",
        "request_key": "1001:77",
    });
    let (status, placed) = call(&app, Method::POST, "/api/v2/bot/orders", bot(), Some(order.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(placed["created"], true);
    assert_eq!(placed["balance"], 700);
    assert_eq!(placed["order"]["status"], "Pending");

    let (status, replay) = call(&app, Method::POST, "/api/v2/bot/orders", bot(), Some(order)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["created"], false);
    assert_eq!(replay["order"]["id"], placed["order"]["id"]);
    assert_eq!(replay["balance"], 700);

    let too_big = json!({
        "telegram_id": 1001,
        "service_id": service_id,
        "quantity": 5000,
        "link": "https://instagram.com/someone",
        "request_key": "1001:78",
    });
    let (status, body) = call(&app, Method::POST, "/api/v2/bot/orders", bot(), Some(too_big)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let order_id = placed["order"]["id"].as_i64().unwrap();
    let (status, canceled) = call(
        &app,
        Method::PUT,
        &format!("/api/admin/orders/{}/status", order_id),
        admin(),
        Some(json!({ "status": "canceled" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(canceled["status"], "Canceled");

    let (_, user) = call(&app, Method::GET, "/api/v2/bot/users/1001", bot(), None).await;
    assert_eq!(user["balance"], 1000);
}
