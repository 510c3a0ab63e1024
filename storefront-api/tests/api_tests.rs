/// Router-level tests that never reach the database
///
/// Every request here is rejected (or answered) before a query runs, so
/// the app is built over a lazily-connected pool.
///
/// Run with: cargo test -p storefront-api --test api_tests

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{empty_request, json_request, lazy_app, send, token_for};
use serde_json::json;
use storefront_shared::auth::jwt::TokenType;
use uuid::Uuid;

#[tokio::test]
async fn test_products_require_authentication() {
    let app = lazy_app(100);

    let (status, _, body) = send(&app, empty_request("GET", "/v1/products", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _, _) = send(&app, empty_request("GET", "/v1/stats", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_authorization_header() {
    let app = lazy_app(100);

    let request = Request::builder()
        .uri("/v1/products")
        .header("authorization", "Token abc")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Expected Bearer token");
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let app = lazy_app(100);
    let refresh = token_for(Uuid::new_v4(), TokenType::Refresh);

    let (status, _, _) = send(&app, empty_request("GET", "/v1/products", Some(&refresh))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_access_token_cannot_refresh() {
    let app = lazy_app(100);
    let access = token_for(Uuid::new_v4(), TokenType::Access);

    let (status, _, _) = send(
        &app,
        json_request("POST", "/v1/auth/token/refresh", None, json!({ "refresh": access })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verify_token_reports_garbage_as_invalid() {
    let app = lazy_app(100);

    let (status, _, body) = send(
        &app,
        json_request("POST", "/v1/auth/token/verify", None, json!({ "token": "not-a-jwt" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
}

#[tokio::test]
async fn test_verify_email_rejects_malformed_token() {
    let app = lazy_app(100);

    let (status, _, _) = send(&app, empty_request("GET", "/v1/auth/verify-email/short", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_validation_errors() {
    let app = lazy_app(100);

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/v1/auth/register",
            None,
            json!({
                "username": "a b",
                "email": "not-an-email",
                "password": "short",
                "password_confirm": "different"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"username"));
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
}

#[tokio::test]
async fn test_create_product_requires_name_and_price() {
    let app = lazy_app(100);
    let access = token_for(Uuid::new_v4(), TokenType::Access);

    let (status, _, body) = send(
        &app,
        json_request("POST", "/v1/products", Some(&access), json!({ "description": "x" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "name");
    assert_eq!(body["details"][1]["field"], "price");
}

#[tokio::test]
async fn test_create_product_cross_field_rules() {
    let app = lazy_app(100);
    let access = token_for(Uuid::new_v4(), TokenType::Access);

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/v1/products",
            Some(&access),
            json!({ "name": "Lamp", "price": "10.00", "compare_at_price": "5.00" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "compare_at_price");
}

#[tokio::test]
async fn test_negative_stock_rejected() {
    let app = lazy_app(100);
    let access = token_for(Uuid::new_v4(), TokenType::Access);

    let (status, _, body) = send(
        &app,
        json_request(
            "PATCH",
            "/v1/products/lamp/stock",
            Some(&access),
            json!({ "stock_quantity": -1 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "stock_quantity");
}

#[tokio::test]
async fn test_register_rejects_names_longer_than_30() {
    let app = lazy_app(100);

    let (status, _, body) = send(
        &app,
        json_request(
            "POST",
            "/v1/auth/register",
            None,
            json!({
                "username": "ada",
                "email": "ada@example.com",
                "password": "SecureP@ss123",
                "first_name": "n".repeat(31),
                "last_name": "n".repeat(30)
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"].as_array().unwrap().len(), 1);
    assert_eq!(body["details"][0]["field"], "first_name");
}

#[tokio::test]
async fn test_profile_update_rejects_long_last_name() {
    let app = lazy_app(100);
    let access = token_for(Uuid::new_v4(), TokenType::Access);

    let (status, _, body) = send(
        &app,
        json_request(
            "PATCH",
            "/v1/auth/profile",
            Some(&access),
            json!({ "last_name": "n".repeat(31) }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "last_name");
}

#[tokio::test]
async fn test_stock_changes_require_positive_quantity() {
    let app = lazy_app(100);
    let access = token_for(Uuid::new_v4(), TokenType::Access);

    for action in ["increase", "reduce"] {
        let (status, _, body) = send(
            &app,
            json_request(
                "POST",
                &format!("/v1/products/lamp/stock/{}", action),
                Some(&access),
                json!({ "quantity": 0 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", action);
        assert_eq!(body["details"][0]["field"], "quantity");
    }
}

#[tokio::test]
async fn test_stock_increase_past_column_range_is_rejected() {
    let app = lazy_app(100);
    let access = token_for(Uuid::new_v4(), TokenType::Access);

    let (status, _, _) = send(
        &app,
        json_request(
            "POST",
            "/v1/products/lamp/stock/increase",
            Some(&access),
            json!({ "quantity": i64::from(i32::MAX) + 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_owner_list_rejects_page_zero() {
    let app = lazy_app(100);
    let access = token_for(Uuid::new_v4(), TokenType::Access);

    let (status, _, _) = send(&app, empty_request("GET", "/v1/products?page=0", Some(&access))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_search_requires_query() {
    let app = lazy_app(100);

    let (status, _, body) = send(&app, empty_request("GET", "/v1/public/search", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _, _) = send(&app, empty_request("GET", "/v1/public/search?q=%20%20", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_public_list_rejects_bad_filter() {
    let app = lazy_app(100);

    let (status, _, _) = send(&app, empty_request("GET", "/v1/public/products?min_price=cheap", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_category_writes_require_authentication() {
    let app = lazy_app(100);

    let (status, _, _) = send(
        &app,
        json_request("POST", "/v1/categories", None, json!({ "name": "Audio" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_category_reads_reject_invalid_token() {
    let app = lazy_app(100);

    let (status, _, _) = send(&app, empty_request("GET", "/v1/categories", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_routes_are_rate_limited() {
    let app = lazy_app(2);

    // No content type: rejected by the extractor, after the limiter
    let login = || {
        Request::builder()
            .method("POST")
            .uri("/v1/auth/login")
            .header("x-forwarded-for", "203.0.113.50")
            .body(Body::from("{}"))
            .unwrap()
    };

    for _ in 0..2 {
        let (status, headers, _) = send(&app, login()).await;
        assert_ne!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(headers.contains_key("x-ratelimit-limit"));
    }

    let (status, headers, body) = send(&app, login()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limit_exceeded");
    assert!(headers.contains_key("retry-after"));

    // A different client is unaffected
    let other = Request::builder()
        .method("POST")
        .uri("/v1/auth/login")
        .header("x-forwarded-for", "203.0.113.51")
        .body(Body::from("{}"))
        .unwrap();
    let (status, _, _) = send(&app, other).await;
    assert_ne!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = lazy_app(100);

    let (_, headers, _) = send(&app, empty_request("GET", "/v1/public/search", None)).await;

    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.get("strict-transport-security").is_none());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = lazy_app(100);

    let (status, _, _) = send(&app, empty_request("GET", "/v1/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
