//! HTTP-level tests covering the catalog, cart, wishlist, review and auth
//! surfaces plus the health endpoint.

mod common;

use axum::http::{Method, StatusCode};
use common::{dec_field, response_json, TestApp};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use serde_json::json;
use storefront_api::entities::Product;

#[tokio::test]
async fn health_reports_row_counts() {
    let app = TestApp::new().await;
    let category = app.seed_category("Audio", "audio").await;
    app.seed_product("Widget", "widget", dec!(10.00), None, 3, category.id)
        .await;
    app.seed_user("health@example.com", false).await;

    let response = app.request(Method::GET, "/api/v1/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["models"]["products"], 1);
    assert_eq!(body["models"]["categories"], 1);
    assert_eq!(body["models"]["users"], 1);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn product_listing_paginates_and_filters() {
    let app = TestApp::new().await;
    let audio = app.seed_category("Audio", "audio").await;
    let video = app.seed_category("Video", "video").await;
    app.seed_product("Headphones", "headphones", dec!(30.00), None, 5, audio.id)
        .await;
    app.seed_product("Speaker", "speaker", dec!(80.00), None, 5, audio.id)
        .await;
    app.seed_product("Projector", "projector", dec!(400.00), None, 5, video.id)
        .await;

    let response = app.request(Method::GET, "/api/v1/products/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 20);

    let response = app
        .request(Method::GET, "/api/v1/products/?category=audio", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 2);

    let response = app
        .request(Method::GET, "/api/v1/products/?search=proj", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["slug"], "projector");
}

#[tokio::test]
async fn product_detail_exposes_display_price_and_bumps_view_count() {
    let app = TestApp::new().await;
    let category = app.seed_category("Audio", "audio").await;
    let product = app
        .seed_product("Headphones", "headphones", dec!(30.00), Some(dec!(25.00)), 5, category.id)
        .await;

    let response = app
        .request(Method::GET, "/api/v1/products/headphones", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(dec_field(&body["display_price"]), dec!(25.00));
    assert_eq!(body["on_sale"], true);
    assert_eq!(body["category"]["slug"], "audio");

    let stored = Product::find_by_id(product.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.view_count, 1);

    let response = app
        .request(Method::GET, "/api/v1/products/nope", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_cart_flow_via_session_header() {
    let app = TestApp::new().await;
    let category = app.seed_category("Audio", "audio").await;
    let product = app
        .seed_product("Headphones", "headphones", dec!(20.00), None, 5, category.id)
        .await;

    let session = [("x-cart-session", "api-session-key")];
    let uri = format!("/api/v1/cart/items/{}", product.id);
    let response = app
        .request_with_headers(Method::POST, &uri, Some(json!({"quantity": 2})), &session)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["total_items"], 2);
    assert_eq!(body["cart"]["session_key"], "api-session-key");
    assert_eq!(dec_field(&body["quote"]["subtotal"]), dec!(40.00));
    assert_eq!(dec_field(&body["quote"]["shipping_amount"]), dec!(9.99));

    let response = app
        .request_with_headers(Method::GET, "/api/v1/cart/count", None, &session)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["cart_count"], 2);

    // A different session sees an empty cart.
    let other = [("x-cart-session", "other-session")];
    let response = app
        .request_with_headers(Method::GET, "/api/v1/cart/count", None, &other)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["cart_count"], 0);
}

#[tokio::test]
async fn wishlist_add_is_idempotent() {
    let app = TestApp::new().await;
    let (_user, token) = app.seed_user("wisher@example.com", false).await;
    let category = app.seed_category("Audio", "audio").await;
    let product = app
        .seed_product("Headphones", "headphones", dec!(20.00), None, 5, category.id)
        .await;

    let uri = format!("/api/v1/wishlist/{}", product.id);
    let response = app
        .request_authenticated(Method::POST, &uri, None, &token)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["outcome"], "added");

    // Second add reports already-present, creating no second row.
    let response = app
        .request_authenticated(Method::POST, &uri, None, &token)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["outcome"], "already_present");

    let response = app
        .request_authenticated(Method::GET, "/api/v1/wishlist/", None, &token)
        .await;
    let body = response_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    // Wishlist requires authentication.
    let response = app.request(Method::GET, "/api/v1/wishlist/", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_login_and_cart_merge() {
    let app = TestApp::new().await;
    let category = app.seed_category("Audio", "audio").await;
    let product = app
        .seed_product("Headphones", "headphones", dec!(20.00), None, 5, category.id)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/signup",
            Some(json!({
                "email": "newuser@example.com",
                "password": "a-strong-password"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert!(body["token"].is_string());

    // Duplicate signup conflicts.
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/signup",
            Some(json!({
                "email": "newuser@example.com",
                "password": "a-strong-password"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Build an anonymous cart, then log in with its session key.
    let session = [("x-cart-session", "pre-login-session")];
    let uri = format!("/api/v1/cart/items/{}", product.id);
    app.request_with_headers(Method::POST, &uri, Some(json!({"quantity": 3})), &session)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({
                "email": "newuser@example.com",
                "password": "a-strong-password",
                "cart_session_key": "pre-login-session"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let token = body["token"].as_str().unwrap().to_string();

    let response = app
        .request_authenticated(Method::GET, "/api/v1/cart/count", None, &token)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["cart_count"], 3);

    // Wrong password is rejected.
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({
                "email": "newuser@example.com",
                "password": "wrong"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reviews_follow_verified_purchase_approval() {
    let app = TestApp::new().await;
    let (_user, token) = app.seed_user("reviewer@example.com", false).await;
    let (_staff, staff_token) = app.seed_user("moderator@example.com", true).await;
    let category = app.seed_category("Audio", "audio").await;
    app.seed_product("Headphones", "headphones", dec!(20.00), None, 5, category.id)
        .await;

    // No purchase: submitted but not approved, so not listed.
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/products/headphones/reviews",
            Some(json!({
                "rating": 4,
                "title": "Pretty good",
                "comment": "Solid sound for the price."
            })),
            &token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["is_verified_purchase"], false);
    assert_eq!(body["is_approved"], false);
    let review_id = body["id"].as_str().unwrap().to_string();

    let response = app
        .request(Method::GET, "/api/v1/products/headphones/reviews", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["reviews"].as_array().unwrap().len(), 0);

    // A second review by the same user conflicts.
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/products/headphones/reviews",
            Some(json!({
                "rating": 5,
                "title": "Again",
                "comment": "Trying twice."
            })),
            &token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Staff approval makes it visible.
    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/reviews/{}/approve", review_id),
            None,
            &staff_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::GET, "/api/v1/products/headphones/reviews", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["reviews"].as_array().unwrap().len(), 1);
    assert_eq!(body["stats"]["total_reviews"], 1);
    assert_eq!(dec_field(&body["stats"]["average_rating"]), dec!(4.0));
}

#[tokio::test]
async fn rating_outside_range_is_rejected() {
    let app = TestApp::new().await;
    let (_user, token) = app.seed_user("harsh@example.com", false).await;
    let category = app.seed_category("Audio", "audio").await;
    app.seed_product("Headphones", "headphones", dec!(20.00), None, 5, category.id)
        .await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/products/headphones/reviews",
            Some(json!({
                "rating": 6,
                "title": "Too good",
                "comment": "Off the scale."
            })),
            &token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cached_product_listing_serves_stale_data_until_expiry() {
    let app = TestApp::new().await;
    let category = app.seed_category("Audio", "audio").await;
    app.seed_product("Headphones", "headphones", dec!(20.00), None, 5, category.id)
        .await;

    let response = app.request(Method::GET, "/api/v1/products/", None).await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);

    // A new product does not appear while the cached page is fresh.
    app.seed_product("Speaker", "speaker", dec!(50.00), None, 5, category.id)
        .await;
    let response = app.request(Method::GET, "/api/v1/products/", None).await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);

    // A different query string misses the cache and sees both.
    let response = app
        .request(Method::GET, "/api/v1/products/?sort=name", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn address_default_flipping() {
    let app = TestApp::new().await;
    let (_user, token) = app.seed_user("mover@example.com", false).await;

    let payload = |line: &str, default: bool| {
        json!({
            "address_type": "shipping",
            "first_name": "Test",
            "last_name": "Shopper",
            "address_line_1": line,
            "city": "Testville",
            "state": "CA",
            "postal_code": "90210",
            "country": "United States",
            "is_default": default
        })
    };

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/addresses/",
            Some(payload("1 First St", true)),
            &token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/addresses/",
            Some(payload("2 Second St", true)),
            &token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/addresses/", None, &token)
        .await;
    let body = response_json(response).await;
    let addresses = body.as_array().unwrap();
    assert_eq!(addresses.len(), 2);
    let defaults: Vec<bool> = addresses
        .iter()
        .map(|a| a["is_default"].as_bool().unwrap())
        .collect();
    assert_eq!(defaults.iter().filter(|d| **d).count(), 1);
    // The newest default wins.
    let default_address = addresses
        .iter()
        .find(|a| a["is_default"].as_bool().unwrap())
        .unwrap();
    assert_eq!(default_address["address_line_1"], "2 Second St");
}
