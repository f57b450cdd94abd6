use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, success_response};
use crate::handlers::products::ProductSummary;
use crate::services::catalog::ProductListQuery;
use crate::{AppState, PaginatedResponse};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;

/// Creates the router for category endpoints
pub fn categories_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories))
        .route("/{slug}", get(get_category))
        .route("/{slug}/products", get(category_products))
}

#[derive(Debug, Serialize)]
struct CategoryWithCount {
    #[serde(flatten)]
    category: crate::entities::CategoryModel,
    product_count: u64,
}

async fn list_categories(State(state): State<AppState>) -> Result<Response, ApiError> {
    let categories = state
        .services
        .catalog
        .list_categories()
        .await
        .map_err(map_service_error)?;

    let out: Vec<CategoryWithCount> = categories
        .into_iter()
        .map(|(category, product_count)| CategoryWithCount {
            category,
            product_count,
        })
        .collect();
    Ok(success_response(out))
}

/// Category detail. Served from a fixed-TTL page cache; writes do not
/// invalidate it.
async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let cache_key = format!("categories:detail:{}", slug);
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok((
            [(header::CONTENT_TYPE, "application/json")],
            cached,
        )
            .into_response());
    }

    let category = state
        .services
        .catalog
        .get_category_by_slug(&slug)
        .await
        .map_err(map_service_error)?;

    let body = serde_json::to_string(&category).map_err(|_| ApiError::InternalServerError)?;
    state
        .cache
        .set(&cache_key, body.clone(), Some(state.config.category_cache_ttl()));
    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

/// Active products in a category, paginated
async fn category_products(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ProductListQuery>,
) -> Result<Response, ApiError> {
    // 404 for unknown slugs rather than the listing's silent filter skip
    state
        .services
        .catalog
        .get_category_by_slug(&slug)
        .await
        .map_err(map_service_error)?;

    let query = ProductListQuery {
        category: Some(slug),
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
