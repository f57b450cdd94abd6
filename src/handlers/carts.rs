use crate::auth::Shopper;
use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::services::cart::{AddToCartInput, CartView};
use crate::services::checkout::CheckoutQuote;
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Creates the router for cart endpoints
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/count", get(cart_count))
        .route(
            "/items/{id}",
            post(add_to_cart).put(update_cart_item).delete(remove_cart_item),
        )
        .route("/clear", post(clear_cart))
        .route("/coupon", post(apply_coupon).delete(remove_coupon))
}

/// Cart payload: the cart, its lines, derived totals and the checkout quote.
/// Anonymous clients read `session_key` from here and replay it in the
/// `X-Cart-Session` header.
#[derive(Debug, Serialize)]
struct CartEnvelope {
    #[serde(flatten)]
    view: CartView,
    quote: CheckoutQuote,
}

async fn envelope(state: &AppState, view: CartView) -> Result<CartEnvelope, ApiError> {
    let quote = state
        .services
        .checkout
        .quote_for_cart(&view.cart)
        .await
        .map_err(map_service_error)?;
    Ok(CartEnvelope { view, quote })
}

/// The shopper's cart with items and totals
async fn get_cart(State(state): State<AppState>, shopper: Shopper) -> Result<Response, ApiError> {
    let view = state
        .services
        .cart
        .get_cart(&shopper)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(envelope(&state, view).await?))
}

/// Number of units in the cart
async fn cart_count(State(state): State<AppState>, shopper: Shopper) -> Result<Response, ApiError> {
    let count = state
        .services
        .cart
        .count(&shopper)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(serde_json::json!({ "cart_count": count })))
}

#[derive(Debug, Deserialize, Validate)]
struct AddToCartRequest {
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1))]
    quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

async fn add_to_cart(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<AddToCartRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;

    let view = state
        .services
        .cart
        .add_item(
            &shopper,
            AddToCartInput {
                product_id,
                quantity: payload.quantity,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(envelope(&state, view).await?))
}

#[derive(Debug, Deserialize, Validate)]
struct UpdateQuantityRequest {
    #[validate(range(min = 0))]
    quantity: i32,
}

async fn update_cart_item(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;

    let view = state
        .services
        .cart
        .update_item_quantity(&shopper, item_id, payload.quantity)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(envelope(&state, view).await?))
}

async fn remove_cart_item(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(item_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let view = state
        .services
        .cart
        .remove_item(&shopper, item_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(envelope(&state, view).await?))
}

async fn clear_cart(State(state): State<AppState>, shopper: Shopper) -> Result<Response, ApiError> {
    let view = state
        .services
        .cart
        .clear(&shopper)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(envelope(&state, view).await?))
}

#[derive(Debug, Deserialize)]
struct CouponRequest {
    coupon_code: String,
}

async fn apply_coupon(
    State(state): State<AppState>,
    shopper: Shopper,
    Json(payload): Json<CouponRequest>,
) -> Result<Response, ApiError> {
    let view = state
        .services
        .cart
        .apply_coupon(&shopper, &payload.coupon_code)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(envelope(&state, view).await?))
}

async fn remove_coupon(
    State(state): State<AppState>,
    shopper: Shopper,
) -> Result<Response, ApiError> {
    let view = state
        .services
        .cart
        .remove_coupon(&shopper)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(envelope(&state, view).await?))
}
