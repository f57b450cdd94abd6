use crate::{
    entities::{product, wishlist, Product, ProductModel, Wishlist, WishlistModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Wishlists: unique (user, product) pairs with no quantity.
#[derive(Clone)]
pub struct WishlistService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Result of an add: a second add of the same pair is reported, not an error.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WishlistOutcome {
    Added { item: WishlistModel },
    AlreadyPresent { item: WishlistModel },
}

impl WishlistService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<WishlistOutcome, ServiceError> {
        Product::find_by_id(product_id)
            .filter(product::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = Wishlist::find()
            .filter(wishlist::Column::UserId.eq(user_id))
            .filter(wishlist::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;

        if let Some(item) = existing {
            return Ok(WishlistOutcome::AlreadyPresent { item });
        }

        let model = wishlist::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            added_at: Set(Utc::now()),
        };
        let item = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::WishlistItemAdded {
                user_id,
                product_id,
            })
            .await;

        info!("Product {} wishlisted by user {}", product_id, user_id);
        Ok(WishlistOutcome::Added { item })
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        let item = Wishlist::find()
            .filter(wishlist::Column::UserId.eq(user_id))
            .filter(wishlist::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} is not in your wishlist", product_id))
            })?;

        item.delete(&*self.db).await?;
        Ok(())
    }

    /// The user's wishlist with product details, newest first.
    pub async fn list(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(WishlistModel, ProductModel)>, ServiceError> {
        let rows = Wishlist::find()
            .filter(wishlist::Column::UserId.eq(user_id))
            .order_by_desc(wishlist::Column::AddedAt)
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(item, product)| product.map(|p| (item, p)))
            .collect())
    }

    /// Whether the product is in the user's wishlist.
    pub async fn contains(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, ServiceError> {
        use sea_orm::PaginatorTrait;

        let count = Wishlist::find()
            .filter(wishlist::Column::UserId.eq(user_id))
            .filter(wishlist::Column::ProductId.eq(product_id))
            .count(&*self.db)
            .await?;
        Ok(count > 0)
    }
}
