use crate::auth::AuthUser;
use crate::errors::ApiError;
use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response,
};
use crate::services::customers::{AddressInput, PaymentMethodInput};
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    response::Response,
    routing::{get, put},
    Router,
};
use uuid::Uuid;

/// Creates the router for address endpoints
pub fn addresses_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_addresses).post(create_address))
        .route("/{id}", put(update_address).delete(delete_address))
}

/// Creates the router for payment method endpoints
pub fn payment_methods_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payment_methods).post(create_payment_method))
        .route("/{id}", axum::routing::delete(delete_payment_method))
}

async fn list_addresses(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ApiError> {
    let addresses = state
        .services
        .customers
        .list_addresses(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(addresses))
}

async fn create_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddressInput>,
) -> Result<Response, ApiError> {
    let address = state
        .services
        .customers
        .create_address(user.user_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(address))
}

async fn update_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddressInput>,
) -> Result<Response, ApiError> {
    let address = state
        .services
        .customers
        .update_address(user.user_id, id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(address))
}

async fn delete_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state
        .services
        .customers
        .delete_address(user.user_id, id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

async fn list_payment_methods(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ApiError> {
    let methods = state
        .services
        .customers
        .list_payment_methods(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(methods))
}

async fn create_payment_method(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PaymentMethodInput>,
) -> Result<Response, ApiError> {
    let method = state
        .services
        .customers
        .create_payment_method(user.user_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(method))
}

async fn delete_payment_method(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state
        .services
        .customers
        .delete_payment_method(user.user_id, id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}
