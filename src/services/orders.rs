use crate::{
    entities::{
        order, order_item, Order, OrderItem, OrderItemModel, OrderModel, OrderStatus,
        PaymentStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Read model over persisted orders, plus the staff-only status transitions.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Lists a user's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Fetches one of the user's orders with its frozen lines. Orders owned
    /// by other users are indistinguishable from missing ones.
    #[instrument(skip(self))]
    pub async fn get_for_user(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(OrderModel, Vec<OrderItemModel>), ServiceError> {
        let order = Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = order.find_related(OrderItem).all(&*self.db).await?;
        Ok((order, items))
    }

    async fn get(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Staff status update, validated against the transition graph. There is
    /// no automatic progression anywhere else.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.get(order_id).await?;
        let old_status = order.status;

        if !old_status.can_transition_to(new_status, order.payment_status.is_settled()) {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot change order status from {} to {}",
                old_status, new_status
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        if new_status == OrderStatus::Refunded {
            active.payment_status = Set(PaymentStatus::Refunded);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;

        info!(
            "Order {} status {} -> {}",
            updated.order_number, old_status, new_status
        );
        Ok(updated)
    }

    /// Staff payment-status update, tracked independently of fulfillment.
    #[instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        order_id: Uuid,
        new_status: PaymentStatus,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.get(order_id).await?;
        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(new_status);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    /// Records a tracking number; as a side effect the order is forced to
    /// shipped.
    #[instrument(skip(self))]
    pub async fn add_tracking_number(
        &self,
        order_id: Uuid,
        tracking_number: &str,
    ) -> Result<OrderModel, ServiceError> {
        let tracking_number = tracking_number.trim();
        if tracking_number.is_empty() {
            return Err(ServiceError::ValidationError(
                "Tracking number is required".to_string(),
            ));
        }

        let order = self.get(order_id).await?;
        let mut active: order::ActiveModel = order.into();
        active.tracking_number = Set(Some(tracking_number.to_string()));
        active.status = Set(OrderStatus::Shipped);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::TrackingNumberAdded {
                order_id,
                tracking_number: tracking_number.to_string(),
            })
            .await;

        info!(
            "Tracking number {} added to order {}",
            tracking_number, updated.order_number
        );
        Ok(updated)
    }

    /// Whether the user has a persisted order containing the product; used
    /// to mark reviews as verified purchases.
    pub async fn user_purchased_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<bool, ServiceError> {
        use sea_orm::{JoinType, QuerySelect, RelationTrait};

        let count = OrderItem::find()
            .join(JoinType::InnerJoin, order_item::Relation::Order.def())
            .filter(order::Column::UserId.eq(user_id))
            .filter(order_item::Column::ProductId.eq(product_id))
            .count(&*self.db)
            .await?;
        Ok(count > 0)
    }
}
