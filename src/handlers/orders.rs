use crate::auth::{AuthUser, StaffUser};
use crate::entities::{OrderStatus, PaymentStatus};
use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, success_response};
use crate::{AppState, ListQuery, PaginatedResponse};
use axum::{
    extract::{Json, Path, Query, State},
    response::Response,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

/// Creates the router for order endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/{id}", get(get_order))
        .route("/{id}/status", put(update_order_status))
        .route("/{id}/payment-status", put(update_payment_status))
        .route("/{id}/tracking", post(add_tracking_number))
}

/// The caller's order history, newest first
async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let limit = query.limit.clamp(1, state.config.api_max_page_size);
    let page = query.page.max(1);

    let (orders, total) = state
        .services
        .orders
        .list_for_user(user.user_id, page, limit)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse {
        items: orders,
        total,
        page,
        limit,
        total_pages: total.div_ceil(limit),
    }))
}

/// One of the caller's orders with its frozen lines
async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (order, items) = state
        .services
        .orders
        .get_for_user(user.user_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "order": order,
        "items": items,
    })))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: OrderStatus,
}

/// Staff-only status transition
async fn update_order_status(
    State(state): State<AppState>,
    StaffUser(_user): StaffUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Response, ApiError> {
    let order = state
        .services
        .orders
        .update_status(id, payload.status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

#[derive(Debug, Deserialize)]
struct UpdatePaymentStatusRequest {
    payment_status: PaymentStatus,
}

/// Staff-only payment status update
async fn update_payment_status(
    State(state): State<AppState>,
    StaffUser(_user): StaffUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePaymentStatusRequest>,
) -> Result<Response, ApiError> {
    let order = state
        .services
        .orders
        .update_payment_status(id, payload.payment_status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

#[derive(Debug, Deserialize)]
struct TrackingRequest {
    tracking_number: String,
}

/// Staff-only: record a tracking number; the order is forced to shipped
async fn add_tracking_number(
    State(state): State<AppState>,
    StaffUser(_user): StaffUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TrackingRequest>,
) -> Result<Response, ApiError> {
    let order = state
        .services
        .orders
        .add_tracking_number(id, &payload.tracking_number)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}
