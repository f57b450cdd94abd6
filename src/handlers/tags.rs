use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, success_response};
use crate::handlers::products::ProductSummary;
use crate::services::catalog::ProductListQuery;
use crate::{AppState, PaginatedResponse};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Router,
};

/// Creates the router for tag endpoints
pub fn tags_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags))
        .route("/{slug}/products", get(tag_products))
}

async fn list_tags(State(state): State<AppState>) -> Result<Response, ApiError> {
    let tags = state
        .services
        .catalog
        .list_tags()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(tags))
}

/// Active products carrying a tag, paginated
async fn tag_products(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ProductListQuery>,
) -> Result<Response, ApiError> {
    state
        .services
        .catalog
        .get_tag_by_slug(&slug)
        .await
        .map_err(map_service_error)?;

    let query = ProductListQuery {
        tag: Some(slug),
        ..query
    };
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .per_page
        .unwrap_or(state.config.api_default_page_size)
        .clamp(1, state.config.api_max_page_size);

    let (products, total) = state
        .services
        .catalog
        .list_products(
            query,
            state.config.api_default_page_size,
            state.config.api_max_page_size,
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse {
        items: products
            .into_iter()
            .map(ProductSummary::from)
            .collect::<Vec<_>>(),
        total,
        page,
        limit,
        total_pages: total.div_ceil(limit),
    }))
}
