use crate::{
    entities::{product, review, Product, Review, ReviewModel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::orders::OrderService,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Product reviews: one per (user, product), auto-approved only for
/// verified purchases.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    orders: Arc<OrderService>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewInput {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub comment: String,
}

impl ReviewService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        orders: Arc<OrderService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            orders,
        }
    }

    /// Submits a review. A purchase of the product by this user marks the
    /// review verified and approves it immediately; anything else waits for
    /// staff approval.
    #[instrument(skip(self, input))]
    pub async fn add_review(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        input: CreateReviewInput,
    ) -> Result<ReviewModel, ServiceError> {
        input.validate()?;

        Product::find_by_id(product_id)
            .filter(product::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "You have already reviewed this product".to_string(),
            ));
        }

        let verified = self
            .orders
            .user_purchased_product(user_id, product_id)
            .await?;

        let now = Utc::now();
        let review_id = Uuid::new_v4();
        let model = review::ActiveModel {
            id: Set(review_id),
            product_id: Set(product_id),
            user_id: Set(user_id),
            rating: Set(input.rating),
            title: Set(input.title),
            comment: Set(input.comment),
            is_verified_purchase: Set(verified),
            is_approved: Set(verified),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ReviewSubmitted {
                product_id,
                review_id,
            })
            .await;

        info!(
            "Review {} submitted for product {} (verified: {})",
            review_id, product_id, verified
        );
        Ok(created)
    }

    /// Approved reviews for a product, newest first.
    pub async fn list_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<ReviewModel>, ServiceError> {
        Ok(Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::IsApproved.eq(true))
            .order_by_desc(review::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Staff approval of a pending review.
    #[instrument(skip(self))]
    pub async fn approve(&self, review_id: Uuid) -> Result<ReviewModel, ServiceError> {
        let review = Review::find_by_id(review_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Review {} not found", review_id)))?;

        let mut active: review::ActiveModel = review.into();
        active.is_approved = Set(true);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ReviewApproved(review_id))
            .await;
        Ok(updated)
    }
}
