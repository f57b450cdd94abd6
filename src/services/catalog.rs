use crate::{
    entities::{
        category, product, product_image, product_tag, product_tag_link, review, Category,
        CategoryModel, Product, ProductImage, ProductImageModel, ProductModel, ProductTag,
        ProductTagLink, ProductTagModel, Review,
    },
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Read-mostly catalog service: product browsing, search, categories, tags,
/// view counting and review aggregation.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

/// Query parameters accepted by the product listing
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProductListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    pub sort: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Aggregated review figures for a product
#[derive(Debug, Serialize)]
pub struct ReviewStats {
    pub total_reviews: u64,
    /// Average rating rounded to one decimal
    pub average_rating: Decimal,
    /// Count of approved reviews per rating, index 0 holding rating 1
    pub rating_distribution: [u64; 5],
}

/// Product detail with everything the product page needs
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: ProductModel,
    pub category: CategoryModel,
    pub tags: Vec<ProductTagModel>,
    pub images: Vec<ProductImageModel>,
    pub review_stats: Option<ReviewStats>,
}

/// Autocomplete suggestion
#[derive(Debug, Serialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
    pub slug: String,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists active products with substring search, category/tag/price/stock
    /// filters, sorting and pagination.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        query: ProductListQuery,
        default_page_size: u64,
        max_page_size: u64,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        let mut select = Product::find().filter(product::Column::IsActive.eq(true));

        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(product::Column::Name.contains(search))
                    .add(product::Column::Description.contains(search))
                    .add(product::Column::ShortDescription.contains(search)),
            );
        }

        if let Some(category_slug) = query.category.as_deref().filter(|s| !s.is_empty()) {
            match Category::find()
                .filter(category::Column::Slug.eq(category_slug))
                .filter(category::Column::IsActive.eq(true))
                .one(&*self.db)
                .await?
            {
                Some(cat) => select = select.filter(product::Column::CategoryId.eq(cat.id)),
                None => {
                    warn!("Unknown category filter '{}'", category_slug);
                }
            }
        }

        if let Some(tag_slug) = query.tag.as_deref().filter(|s| !s.is_empty()) {
            match ProductTag::find()
                .filter(product_tag::Column::Slug.eq(tag_slug))
                .filter(product_tag::Column::IsActive.eq(true))
                .one(&*self.db)
                .await?
            {
                Some(tag) => {
                    let product_ids: Vec<Uuid> = ProductTagLink::find()
                        .filter(product_tag_link::Column::TagId.eq(tag.id))
                        .all(&*self.db)
                        .await?
                        .into_iter()
                        .map(|link| link.product_id)
                        .collect();
                    select = select.filter(product::Column::Id.is_in(product_ids));
                }
                None => {
                    warn!("Unknown tag filter '{}'", tag_slug);
                }
            }
        }

        if let Some(min_price) = query.min_price {
            select = select.filter(product::Column::Price.gte(min_price));
        }
        if let Some(max_price) = query.max_price {
            select = select.filter(product::Column::Price.lte(max_price));
        }
        if let Some(in_stock) = query.in_stock {
            select = select.filter(product::Column::IsInStock.eq(in_stock));
        }

        select = match query.sort.as_deref() {
            Some("name") => select.order_by_asc(product::Column::Name),
            Some("price_low") => select.order_by_asc(product::Column::Price),
            Some("price_high") => select.order_by_desc(product::Column::Price),
            Some("popularity") => select.order_by_desc(product::Column::ViewCount),
            _ => select.order_by_desc(product::Column::CreatedAt),
        };

        let per_page = query
            .per_page
            .unwrap_or(default_page_size)
            .clamp(1, max_page_size);
        let page = query.page.unwrap_or(1).max(1);

        let paginator = select.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;
        Ok((products, total))
    }

    /// Active product by slug, without touching the view counter.
    pub async fn find_by_slug(&self, slug: &str) -> Result<ProductModel, ServiceError> {
        Product::find()
            .filter(product::Column::Slug.eq(slug))
            .filter(product::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product '{}' not found", slug)))
    }

    /// Fetches an active product by slug, bumping its view counter. The
    /// counter write is a plain read-modify-write; lost updates under
    /// concurrency are tolerated.
    #[instrument(skip(self))]
    pub async fn get_product_by_slug(&self, slug: &str) -> Result<ProductDetail, ServiceError> {
        let product = Product::find()
            .filter(product::Column::Slug.eq(slug))
            .filter(product::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product '{}' not found", slug)))?;

        let view_count = product.view_count;
        let mut counter: product::ActiveModel = product.clone().into();
        counter.view_count = Set(view_count + 1);
        let product = counter.update(&*self.db).await?;

        let category = Category::find_by_id(product.category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Product {} references missing category",
                    product.id
                ))
            })?;

        let tags = product
            .find_related(ProductTag)
            .filter(product_tag::Column::IsActive.eq(true))
            .all(&*self.db)
            .await?;

        let images = ProductImage::find()
            .filter(product_image::Column::ProductId.eq(product.id))
            .filter(product_image::Column::IsActive.eq(true))
            .order_by_asc(product_image::Column::SortOrder)
            .all(&*self.db)
            .await?;

        let review_stats = self.review_stats(product.id).await?;

        Ok(ProductDetail {
            product,
            category,
            tags,
            images,
            review_stats,
        })
    }

    /// Active products sharing the category, excluding the product itself.
    pub async fn related_products(
        &self,
        product: &ProductModel,
        limit: u64,
    ) -> Result<Vec<ProductModel>, ServiceError> {
        Ok(Product::find()
            .filter(product::Column::CategoryId.eq(product.category_id))
            .filter(product::Column::IsActive.eq(true))
            .filter(product::Column::Id.ne(product.id))
            .limit(limit)
            .all(&*self.db)
            .await?)
    }

    /// Count, average and histogram over approved reviews; None when the
    /// product has no approved reviews yet.
    pub async fn review_stats(&self, product_id: Uuid) -> Result<Option<ReviewStats>, ServiceError> {
        let reviews = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::IsApproved.eq(true))
            .all(&*self.db)
            .await?;

        if reviews.is_empty() {
            return Ok(None);
        }

        let mut rating_distribution = [0u64; 5];
        let mut sum: i64 = 0;
        for review in &reviews {
            let rating = review.rating.clamp(1, 5);
            rating_distribution[(rating - 1) as usize] += 1;
            sum += i64::from(rating);
        }

        let total_reviews = reviews.len() as u64;
        let average_rating =
            (Decimal::from(sum) / Decimal::from(total_reviews)).round_dp(1);

        Ok(Some(ReviewStats {
            total_reviews,
            average_rating,
            rating_distribution,
        }))
    }

    /// Active categories with their active-product counts.
    pub async fn list_categories(
        &self,
    ) -> Result<Vec<(CategoryModel, u64)>, ServiceError> {
        let categories = Category::find()
            .filter(category::Column::IsActive.eq(true))
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?;

        let mut out = Vec::with_capacity(categories.len());
        for cat in categories {
            let count = Product::find()
                .filter(product::Column::CategoryId.eq(cat.id))
                .filter(product::Column::IsActive.eq(true))
                .count(&*self.db)
                .await?;
            out.push((cat, count));
        }
        Ok(out)
    }

    pub async fn get_category_by_slug(&self, slug: &str) -> Result<CategoryModel, ServiceError> {
        Category::find()
            .filter(category::Column::Slug.eq(slug))
            .filter(category::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category '{}' not found", slug)))
    }

    pub async fn list_tags(&self) -> Result<Vec<ProductTagModel>, ServiceError> {
        Ok(ProductTag::find()
            .filter(product_tag::Column::IsActive.eq(true))
            .order_by_asc(product_tag::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_tag_by_slug(&self, slug: &str) -> Result<ProductTagModel, ServiceError> {
        ProductTag::find()
            .filter(product_tag::Column::Slug.eq(slug))
            .filter(product_tag::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Tag '{}' not found", slug)))
    }

    /// Autocomplete over product and category names. Queries shorter than
    /// two characters return nothing.
    #[instrument(skip(self))]
    pub async fn search_suggestions(&self, query: &str) -> Result<Vec<Suggestion>, ServiceError> {
        let query = query.trim();
        if query.len() < 2 {
            return Ok(Vec::new());
        }

        let mut suggestions = Vec::new();

        let products = Product::find()
            .filter(product::Column::IsActive.eq(true))
            .filter(product::Column::Name.contains(query))
            .limit(5)
            .all(&*self.db)
            .await?;
        for product in products {
            suggestions.push(Suggestion {
                kind: "product",
                name: product.name,
                slug: product.slug,
            });
        }

        let categories = Category::find()
            .filter(category::Column::IsActive.eq(true))
            .filter(category::Column::Name.contains(query))
            .limit(3)
            .all(&*self.db)
            .await?;
        for category in categories {
            suggestions.push(Suggestion {
                kind: "category",
                name: category.name,
                slug: category.slug,
            });
        }

        Ok(suggestions)
    }
}

/// URL-friendly identifier derived from a display name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Wireless Headphones"), "wireless-headphones");
        assert_eq!(slugify("  Déjà  Vu!  "), "d-j-vu");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn product_list_query_defaults_are_empty() {
        let query = ProductListQuery::default();
        assert!(query.search.is_none());
        assert!(query.page.is_none());
    }
}
