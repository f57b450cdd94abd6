use crate::auth::StaffUser;
use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, success_response};
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::Response,
    routing::post,
    Router,
};
use uuid::Uuid;

/// Creates the router for review moderation
pub fn reviews_routes() -> Router<AppState> {
    Router::new().route("/{id}/approve", post(approve_review))
}

/// Staff-only approval of a pending review
async fn approve_review(
    State(state): State<AppState>,
    StaffUser(_user): StaffUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let review = state
        .services
        .reviews
        .approve(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(review))
}
