use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use farm_shop::auth::models::{Role, TokenKind, issue_token};
use farm_shop::utils::types::Pool;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "integration-test-secret";

// None of these requests may reach the data layer: they are rejected by the
// claims extractor, the payload validator, or handler preconditions, so the
// pool is built without ever opening a connection.
fn test_app() -> Router {
    std::env::set_var("JWT_SECRET", SECRET);

    let manager = AsyncDieselConnectionManager::<diesel_async::AsyncPgConnection>::new(
        "postgres://127.0.0.1:1/unreachable",
    );
    let pool: Pool = bb8::Pool::builder().build_unchecked(manager);

    farm_shop::app(pool)
}

fn bearer(role: Role, kind: TokenKind) -> String {
    let token = issue_token(Uuid::new_v4(), role, kind, 300, SECRET.as_bytes()).unwrap();
    format!("Bearer {}", token)
}

async fn error_message(response: axum::response::Response) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    value["error"].as_str().unwrap_or_default().to_owned()
}

#[tokio::test]
async fn unknown_route_falls_back_to_404() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/definitely-not-a-route")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn orders_require_a_bearer_token() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/orders")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"items":[{"product_id":1,"quantity":1}]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_tokens_are_not_access_tokens() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/users/me")
                .header(
                    header::AUTHORIZATION,
                    bearer(Role::Customer, TokenKind::Refresh),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_login_body_is_rejected() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email": "not-an-email", "password": ""}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_order_is_rejected() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/orders")
                .header(header::CONTENT_TYPE, "application/json")
                .header(
                    header::AUTHORIZATION,
                    bearer(Role::Customer, TokenKind::Access),
                )
                .body(Body::from(r#"{"items":[]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn farmers_cannot_place_orders() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/orders")
                .header(header::CONTENT_TYPE, "application/json")
                .header(
                    header::AUTHORIZATION,
                    bearer(Role::Farmer, TokenKind::Access),
                )
                .body(Body::from(r#"{"items":[{"product_id":1,"quantity":1}]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        error_message(response).await,
        "only customers can place orders"
    );
}

#[tokio::test]
async fn unknown_order_status_is_rejected() {
    // PREPARED was never part of the canonical status set
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/orders/1")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, bearer(Role::Admin, TokenKind::Access))
                .body(Body::from(r#"{"status":"PREPARED"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(response).await, "unknown status: PREPARED");
}

#[tokio::test]
async fn zero_quantity_cart_lines_are_rejected() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/cart")
                .header(header::CONTENT_TYPE, "application/json")
                .header(
                    header::AUTHORIZATION,
                    bearer(Role::Customer, TokenKind::Access),
                )
                .body(Body::from(r#"{"items":[{"product_id":1,"quantity":0}]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cart_is_customer_only() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/cart")
                .header(
                    header::AUTHORIZATION,
                    bearer(Role::Farmer, TokenKind::Access),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn only_farmers_can_open_stores() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/stores")
                .header(header::CONTENT_TYPE, "application/json")
                .header(
                    header::AUTHORIZATION,
                    bearer(Role::Customer, TokenKind::Access),
                )
                .body(Body::from(r#"{"name":"Orchard","description":"apples"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_registration_is_rejected() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/users")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"email":"root@farm.shop","password":"secret-password","name":"Root","role":"ADMIN"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(response).await,
        "role must be CUSTOMER or FARMER"
    );
}
