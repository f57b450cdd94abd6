use crate::auth::AuthUser;
use crate::entities::{ProductModel, ReviewModel};
use crate::errors::ApiError;
use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::services::catalog::{ProductDetail, ProductListQuery};
use crate::services::reviews::CreateReviewInput;
use crate::{AppState, PaginatedResponse};
use axum::{
    extract::{Json, Path, Query, RawQuery, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use rust_decimal::Decimal;
use serde::Serialize;

/// Creates the router for product endpoints
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/suggestions", get(search_suggestions))
        .route("/{slug}", get(get_product))
        .route("/{slug}/related", get(related_products))
        .route("/{slug}/reviews", get(list_reviews).post(create_review))
}

/// Product representation with derived pricing
#[derive(Debug, Serialize)]
pub struct ProductSummary {
    #[serde(flatten)]
    pub product: ProductModel,
    pub display_price: Decimal,
    pub on_sale: bool,
    pub discount_percentage: Decimal,
    pub low_stock: bool,
}

impl From<ProductModel> for ProductSummary {
    fn from(product: ProductModel) -> Self {
        Self {
            display_price: product.display_price(),
            on_sale: product.is_on_sale(),
            discount_percentage: product.discount_percentage(),
            low_stock: product.is_low_stock(),
            product,
        }
    }
}

#[derive(Debug, Serialize)]
struct ProductDetailResponse {
    #[serde(flatten)]
    summary: ProductSummary,
    category: crate::entities::CategoryModel,
    tags: Vec<crate::entities::ProductTagModel>,
    images: Vec<crate::entities::ProductImageModel>,
    review_stats: Option<crate::services::catalog::ReviewStats>,
}

impl From<ProductDetail> for ProductDetailResponse {
    fn from(detail: ProductDetail) -> Self {
        Self {
            summary: detail.product.into(),
            category: detail.category,
            tags: detail.tags,
            images: detail.images,
            review_stats: detail.review_stats,
        }
    }
}

fn json_cached(body: String) -> Response {
    (
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

/// Paginated product listing with search, filters and sorting. Responses are
/// served from a fixed-TTL page cache keyed by the raw query string; edits
/// only become visible when the TTL expires.
async fn list_products(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<ProductListQuery>,
) -> Result<Response, ApiError> {
    let cache_key = format!("products:list:{}", raw_query.unwrap_or_default());
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(json_cached(cached));
    }

    let page = query.page.unwrap_or(1).max(1);
    let (products, total) = state
        .services
        .catalog
        .list_products(
            query.clone(),
            state.config.api_default_page_size,
            state.config.api_max_page_size,
        )
        .await
        .map_err(map_service_error)?;

    let limit = query
        .per_page
        .unwrap_or(state.config.api_default_page_size)
        .clamp(1, state.config.api_max_page_size);
    let response = PaginatedResponse {
        items: products
            .into_iter()
            .map(ProductSummary::from)
            .collect::<Vec<_>>(),
        total,
        page,
        limit,
        total_pages: total.div_ceil(limit),
    };

    let body = serde_json::to_string(&response)
        .map_err(|_| ApiError::InternalServerError)?;
    state
        .cache
        .set(&cache_key, body.clone(), Some(state.config.product_list_cache_ttl()));
    Ok(json_cached(body))
}

/// Product detail by slug; bumps the view counter.
async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let detail = state
        .services
        .catalog
        .get_product_by_slug(&slug)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductDetailResponse::from(detail)))
}

/// Products from the same category
async fn related_products(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let detail = state
        .services
        .catalog
        .get_product_by_slug(&slug)
        .await
        .map_err(map_service_error)?;

    let related = state
        .services
        .catalog
        .related_products(&detail.product, 4)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(
        related.into_iter().map(ProductSummary::from).collect::<Vec<_>>(),
    ))
}

#[derive(Debug, serde::Deserialize)]
struct SuggestionsQuery {
    #[serde(default)]
    q: String,
}

async fn search_suggestions(
    State(state): State<AppState>,
    Query(query): Query<SuggestionsQuery>,
) -> Result<Response, ApiError> {
    let suggestions = state
        .services
        .catalog
        .search_suggestions(&query.q)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "suggestions": suggestions
    })))
}

#[derive(Debug, Serialize)]
struct ReviewsResponse {
    reviews: Vec<ReviewModel>,
    stats: Option<crate::services::catalog::ReviewStats>,
}

/// Approved reviews for a product
async fn list_reviews(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let product = state
        .services
        .catalog
        .find_by_slug(&slug)
        .await
        .map_err(map_service_error)?;

    let reviews = state
        .services
        .reviews
        .list_for_product(product.id)
        .await
        .map_err(map_service_error)?;
    let stats = state
        .services
        .catalog
        .review_stats(product.id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ReviewsResponse { reviews, stats }))
}

/// Submit a review for a product
async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(slug): Path<String>,
    Json(payload): Json<CreateReviewInput>,
) -> Result<Response, ApiError> {
    let product = state
        .services
        .catalog
        .find_by_slug(&slug)
        .await
        .map_err(map_service_error)?;

    let review = state
        .services
        .reviews
        .add_review(user.user_id, product.id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(review))
}
