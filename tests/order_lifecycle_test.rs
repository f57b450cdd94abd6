//! Order status transitions and staff-only endpoints.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use storefront_api::auth::Shopper;
use storefront_api::entities::{OrderStatus, PaymentStatus};
use storefront_api::errors::ServiceError;
use storefront_api::services::cart::AddToCartInput;
use storefront_api::services::checkout::CheckoutInput;

async fn place_order(app: &TestApp) -> (uuid::Uuid, uuid::Uuid) {
    let (user, _token) = app.seed_user("orderer@example.com", false).await;
    let address = app.seed_address(user.id).await;
    let category = app.seed_category("Audio", "audio").await;
    let product = app
        .seed_product("Widget", "widget", dec!(40.00), None, 10, category.id)
        .await;

    app.state
        .services
        .cart
        .add_item(
            &Shopper::Customer(user.id),
            AddToCartInput {
                product_id: product.id,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    let placed = app
        .state
        .services
        .checkout
        .checkout(
            user.id,
            CheckoutInput {
                shipping_address_id: address.id,
                billing_address_id: address.id,
                payment_method_id: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    (user.id, placed.order.id)
}

#[tokio::test]
async fn staff_can_progress_an_order_through_the_happy_path() {
    let app = TestApp::new().await;
    let (_user_id, order_id) = place_order(&app).await;

    let orders = &app.state.services.orders;
    let order = orders
        .update_status(order_id, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Processing);

    let order = orders
        .update_status(order_id, OrderStatus::Shipped)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Shipped);

    let order = orders
        .update_status(order_id, OrderStatus::Delivered)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn invalid_transitions_are_rejected() {
    let app = TestApp::new().await;
    let (_user_id, order_id) = place_order(&app).await;

    // pending -> delivered skips the graph.
    let err = app
        .state
        .services
        .orders
        .update_status(order_id, OrderStatus::Delivered)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    // Refund requires settled payment.
    let err = app
        .state
        .services
        .orders
        .update_status(order_id, OrderStatus::Refunded)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn refund_allowed_once_payment_is_settled() {
    let app = TestApp::new().await;
    let (_user_id, order_id) = place_order(&app).await;

    app.state
        .services
        .orders
        .update_payment_status(order_id, PaymentStatus::Paid)
        .await
        .unwrap();

    let order = app
        .state
        .services
        .orders
        .update_status(order_id, OrderStatus::Refunded)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Refunded);
    assert_eq!(order.payment_status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn tracking_number_forces_shipped() {
    let app = TestApp::new().await;
    let (_user_id, order_id) = place_order(&app).await;

    let order = app
        .state
        .services
        .orders
        .add_tracking_number(order_id, "1Z999AA10123456784")
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Shipped);
    assert_eq!(order.tracking_number.as_deref(), Some("1Z999AA10123456784"));
}

#[tokio::test]
async fn order_history_is_owner_scoped() {
    let app = TestApp::new().await;
    let (user_id, order_id) = place_order(&app).await;
    let (stranger, _token) = app.seed_user("stranger@example.com", false).await;

    let (order, items) = app
        .state
        .services
        .orders
        .get_for_user(user_id, order_id)
        .await
        .unwrap();
    assert_eq!(order.id, order_id);
    assert_eq!(items.len(), 1);

    let err = app
        .state
        .services
        .orders
        .get_for_user(stranger.id, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn status_endpoint_requires_staff() {
    let app = TestApp::new().await;
    let (_user_id, order_id) = place_order(&app).await;
    let (_shopper, shopper_token) = app.seed_user("plain@example.com", false).await;
    let (_staff, staff_token) = app.seed_user("staff@example.com", true).await;

    let uri = format!("/api/v1/orders/{}/status", order_id);
    let payload = json!({ "status": "processing" });

    let response = app
        .request(Method::PUT, &uri, Some(payload.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request_authenticated(Method::PUT, &uri, Some(payload.clone()), &shopper_token)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request_authenticated(Method::PUT, &uri, Some(payload), &staff_token)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "processing");
}
