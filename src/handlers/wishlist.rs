use crate::auth::AuthUser;
use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, no_content_response, success_response};
use crate::handlers::products::ProductSummary;
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use uuid::Uuid;

/// Creates the router for wishlist endpoints
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_wishlist))
        .route("/{product_id}", post(add_to_wishlist).delete(remove_from_wishlist))
}

#[derive(Debug, Serialize)]
struct WishlistEntry {
    #[serde(flatten)]
    item: crate::entities::WishlistModel,
    product: ProductSummary,
}

async fn list_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ApiError> {
    let items = state
        .services
        .wishlist
        .list(user.user_id)
        .await
        .map_err(map_service_error)?;

    let out: Vec<WishlistEntry> = items
        .into_iter()
        .map(|(item, product)| WishlistEntry {
            item,
            product: product.into(),
        })
        .collect();
    Ok(success_response(out))
}

/// Idempotent add: a repeated pair reports "already present" instead of
/// failing.
async fn add_to_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let outcome = state
        .services
        .wishlist
        .add(user.user_id, product_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(outcome))
}

async fn remove_from_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state
        .services
        .wishlist
        .remove(user.user_id, product_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
