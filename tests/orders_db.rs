//! End-to-end order workflow tests against a real Postgres instance.
//!
//! Ignored by default; point DATABASE_URL at a scratch database and run
//! `cargo test -- --ignored` to execute them.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Once;
use tower::ServiceExt;
use uuid::Uuid;

async fn test_app() -> Router {
    dotenvy::dotenv().ok();
    if std::env::var("JWT_SECRET").is_err() {
        std::env::set_var("JWT_SECRET", "orders-db-test-secret");
    }

    let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for these tests");

    static MIGRATIONS: Once = Once::new();
    tokio::task::spawn_blocking(move || {
        MIGRATIONS.call_once(|| {
            farm_shop::run_migrations(&db_url).expect("failed to run migrations");
        });
    })
    .await
    .expect("migration task failed");

    let pool = farm_shop::pool::get_pool().await.expect("db pool");

    farm_shop::app(pool)
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<&Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, value)
}

async fn signup(app: &Router, role: &str) -> String {
    let email = format!("{}@farm.test", Uuid::new_v4());
    let password = "orchard-gate-9";

    let (status, _) = send(
        app,
        request(
            "POST",
            "/api/users",
            None,
            Some(&json!({
                "email": email,
                "password": password,
                "name": "Test Account",
                "role": role,
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(&json!({ "email": email, "password": password })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    body["access_token"].as_str().unwrap().to_owned()
}

/// Fresh farmer, fresh store, one listed product. Returns the farmer's
/// access token and the product id.
async fn farmer_with_product(app: &Router, price: &str, quantity: i32) -> (String, i64) {
    let farmer = signup(app, "FARMER").await;

    let (status, _) = send(
        app,
        request(
            "POST",
            "/api/stores",
            Some(&farmer),
            Some(&json!({
                "name": "Hilltop Orchard",
                "description": "apples and lentils",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, product) = send(
        app,
        request(
            "POST",
            "/api/products",
            Some(&farmer),
            Some(&json!({
                "title": "Gala apples",
                "description": "crisp",
                "price": price,
                "quantity": quantity,
                "category": "FRUIT",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    (farmer, product["id"].as_i64().unwrap())
}

async fn place_order(app: &Router, customer: &str, product_id: i64, quantity: i64) -> Value {
    let (status, order) = send(
        app,
        request(
            "POST",
            "/api/orders",
            Some(customer),
            Some(&json!({ "items": [{ "product_id": product_id, "quantity": quantity }] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    order
}

async fn product_quantity(app: &Router, product_id: i64) -> i64 {
    let (status, product) = send(
        app,
        request("GET", &format!("/api/products/{}", product_id), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    product["quantity"].as_i64().unwrap()
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch postgres"]
async fn checkout_snapshots_price_and_decrements_stock() {
    let app = test_app().await;
    let (farmer, product_id) = farmer_with_product(&app, "2.00", 10).await;
    let customer = signup(&app, "CUSTOMER").await;

    let order = place_order(&app, &customer, product_id, 3).await;
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["total_amount"], "6.00");
    assert_eq!(order["items"][0]["price"], "2.00");
    assert_eq!(product_quantity(&app, product_id).await, 7);

    // a later price change must not rewrite what was already sold
    let (status, _) = send(
        &app,
        request(
            "PATCH",
            &format!("/api/products/{}", product_id),
            Some(&farmer),
            Some(&json!({ "price": "9.99" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let order_id = order["id"].as_i64().unwrap();
    let (status, fetched) = send(
        &app,
        request("GET", &format!("/api/orders/{}", order_id), Some(&customer), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["items"][0]["price"], "2.00");
    assert_eq!(fetched["total_amount"], "6.00");
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch postgres"]
async fn failed_checkout_leaves_no_trace() {
    let app = test_app().await;
    let (_, apples) = farmer_with_product(&app, "2.50", 8).await;
    let (_, lentils) = farmer_with_product(&app, "4.00", 1).await;
    let customer = signup(&app, "CUSTOMER").await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/orders",
            Some(&customer),
            Some(&json!({
                "items": [
                    { "product_id": apples, "quantity": 2 },
                    { "product_id": lentils, "quantity": 5 },
                ],
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("stock insufficient")
    );

    // one bad line sinks the whole order: no stock movement, no order row
    assert_eq!(product_quantity(&app, apples).await, 8);
    assert_eq!(product_quantity(&app, lentils).await, 1);

    let (status, orders) = send(&app, request("GET", "/api/orders", Some(&customer), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders["orders"].as_array().unwrap().len(), 0);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch postgres"]
async fn oversubscribed_stock_rejects_the_late_order() {
    let app = test_app().await;
    let (_, product_id) = farmer_with_product(&app, "3.00", 5).await;
    let first = signup(&app, "CUSTOMER").await;
    let second = signup(&app, "CUSTOMER").await;

    place_order(&app, &first, product_id, 3).await;
    assert_eq!(product_quantity(&app, product_id).await, 2);

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/orders",
            Some(&second),
            Some(&json!({ "items": [{ "product_id": product_id, "quantity": 3 }] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("stock insufficient")
    );

    // stock stops at what is actually left, never below zero
    assert_eq!(product_quantity(&app, product_id).await, 2);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch postgres"]
async fn cancel_restores_stock_exactly_once() {
    let app = test_app().await;
    let (_, product_id) = farmer_with_product(&app, "1.25", 10).await;
    let customer = signup(&app, "CUSTOMER").await;

    let order = place_order(&app, &customer, product_id, 4).await;
    let order_id = order["id"].as_i64().unwrap();
    assert_eq!(product_quantity(&app, product_id).await, 6);

    let cancel_uri = format!("/api/orders/{}/cancel", order_id);

    let (status, cancelled) = send(&app, request("POST", &cancel_uri, Some(&customer), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(product_quantity(&app, product_id).await, 10);

    // a second cancel is a no-op, not a second restoration
    let (status, cancelled) = send(&app, request("POST", &cancel_uri, Some(&customer), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(product_quantity(&app, product_id).await, 10);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch postgres"]
async fn concurrent_cancels_restore_stock_once() {
    let app = test_app().await;
    let (_, product_id) = farmer_with_product(&app, "1.50", 6).await;
    let customer = signup(&app, "CUSTOMER").await;

    let order = place_order(&app, &customer, product_id, 4).await;
    let order_id = order["id"].as_i64().unwrap();
    assert_eq!(product_quantity(&app, product_id).await, 2);

    let cancel_uri = format!("/api/orders/{}/cancel", order_id);

    // both requests race; whichever loses must see the flip and move nothing
    let (first, second) = tokio::join!(
        send(&app, request("POST", &cancel_uri, Some(&customer), None)),
        send(&app, request("POST", &cancel_uri, Some(&customer), None)),
    );
    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);
    assert_eq!(first.1["status"], "CANCELLED");
    assert_eq!(second.1["status"], "CANCELLED");

    assert_eq!(product_quantity(&app, product_id).await, 6);
}
