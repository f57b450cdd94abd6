use crate::auth::AuthUser;
use crate::errors::ApiError;
use crate::handlers::common::{created_response, map_service_error};
use crate::services::checkout::CheckoutInput;
use crate::AppState;
use axum::{
    extract::{Json, State},
    response::Response,
    routing::post,
    Router,
};

/// Creates the router for checkout
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/", post(checkout))
}

/// Converts the caller's cart into an order. All-or-nothing: any failure
/// leaves the cart and stock untouched.
async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutInput>,
) -> Result<Response, ApiError> {
    let placed = state
        .services
        .checkout
        .checkout(user.user_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(placed))
}
