use crate::{
    config::AppConfig,
    entities::{
        address, cart, cart_item, order, order_item, payment_method, product, Address, Cart,
        CartItem, CouponKind, Order, OrderItemModel, OrderModel, OrderStatus, PaymentStatus,
        Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Converts a cart into an immutable order inside a single transaction.
///
/// All pricing is recomputed from the live cart at checkout time; the
/// resulting order stores its amounts independently and is never recomputed.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

/// Input for completing checkout
#[derive(Debug, Deserialize)]
pub struct CheckoutInput {
    pub shipping_address_id: Uuid,
    pub billing_address_id: Uuid,
    pub payment_method_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Derived pricing for a cart: shared by the cart summary view and the
/// checkout transaction so both always agree.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckoutQuote {
    pub subtotal: Decimal,
    pub shipping_amount: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub free_shipping: bool,
}

/// A completed checkout: the order snapshot with its frozen lines.
#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    // Config rates arrive as f64; round away the binary representation
    // error so money stays exact.
    fn tax_rate(&self) -> Decimal {
        Decimal::from_f64_retain(self.config.tax_rate)
            .unwrap_or_else(|| dec!(0.085))
            .round_dp(4)
    }

    fn free_shipping_threshold(&self) -> Decimal {
        Decimal::from_f64_retain(self.config.free_shipping_threshold)
            .unwrap_or_else(|| dec!(50.00))
            .round_dp(2)
    }

    fn flat_shipping_rate(&self) -> Decimal {
        Decimal::from_f64_retain(self.config.flat_shipping_rate)
            .unwrap_or_else(|| dec!(9.99))
            .round_dp(2)
    }

    /// Computes shipping, tax, discount and total for a subtotal and an
    /// optionally applied coupon. Shipping is free at or above the threshold
    /// (and for an empty cart); the discount clamps the total at zero.
    pub fn quote(
        &self,
        subtotal: Decimal,
        coupon: Option<(CouponKind, Decimal)>,
    ) -> CheckoutQuote {
        let free_shipping = subtotal >= self.free_shipping_threshold();
        let shipping_amount = if free_shipping || subtotal <= Decimal::ZERO {
            Decimal::ZERO
        } else {
            self.flat_shipping_rate()
        };

        let tax_amount = (subtotal * self.tax_rate()).round_dp(2);

        let discount_amount = match coupon {
            Some((CouponKind::Percentage, fraction)) => (subtotal * fraction).round_dp(2),
            Some((CouponKind::Fixed, amount)) => amount,
            None => Decimal::ZERO,
        };

        let total_amount =
            (subtotal + tax_amount + shipping_amount - discount_amount).max(Decimal::ZERO);

        CheckoutQuote {
            subtotal,
            shipping_amount,
            tax_amount,
            discount_amount,
            total_amount,
            free_shipping,
        }
    }

    /// Quote for the user's current cart, as shown on the cart summary.
    pub async fn quote_for_cart(&self, cart: &cart::Model) -> Result<CheckoutQuote, ServiceError> {
        let lines = self.load_cart_lines(&*self.db, cart.id).await?;
        let subtotal: Decimal = lines
            .iter()
            .map(|(item, product)| product.display_price() * Decimal::from(item.quantity))
            .sum();
        Ok(self.quote(subtotal, applied_coupon(cart)))
    }

    /// Completes checkout for the user's cart: recomputes totals, writes the
    /// order snapshot, decrements stock and empties the cart — all inside
    /// one transaction. Any failure rolls the whole attempt back, leaving
    /// the cart intact.
    #[instrument(skip(self, input))]
    pub async fn checkout(
        &self,
        user_id: Uuid,
        input: CheckoutInput,
    ) -> Result<PlacedOrder, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::InvalidOperation("Your cart is empty.".to_string()))?;

        let lines = self.load_cart_lines(&txn, cart.id).await?;
        if lines.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Your cart is empty.".to_string(),
            ));
        }

        let shipping_address = self
            .load_owned_address(&txn, user_id, input.shipping_address_id)
            .await?;
        let billing_address = self
            .load_owned_address(&txn, user_id, input.billing_address_id)
            .await?;

        if let Some(payment_method_id) = input.payment_method_id {
            crate::entities::PaymentMethod::find_by_id(payment_method_id)
                .filter(payment_method::Column::UserId.eq(user_id))
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Payment method {} not found",
                        payment_method_id
                    ))
                })?;
        }

        // Authoritative subtotal at this instant, from current display prices.
        let subtotal: Decimal = lines
            .iter()
            .map(|(item, product)| product.display_price() * Decimal::from(item.quantity))
            .sum();
        let quote = self.quote(subtotal, applied_coupon(&cart));

        let order_number = self.allocate_order_number(&txn).await?;
        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let order_row = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            order_number: Set(order_number.clone()),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            subtotal: Set(quote.subtotal),
            tax_amount: Set(quote.tax_amount),
            shipping_amount: Set(quote.shipping_amount),
            discount_amount: Set(quote.discount_amount),
            total_amount: Set(quote.total_amount),
            shipping_address_id: Set(shipping_address.id),
            billing_address_id: Set(billing_address.id),
            payment_method_id: Set(input.payment_method_id),
            tracking_number: Set(None),
            notes: Set(input.notes),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order_row = order_row.insert(&txn).await?;

        let mut placed_items = Vec::with_capacity(lines.len());
        let mut depleted = Vec::new();
        for (item, product_row) in &lines {
            let unit_price = product_row.display_price();
            let total_price = unit_price * Decimal::from(item.quantity);

            let order_item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product_row.id),
                quantity: Set(item.quantity),
                unit_price: Set(unit_price),
                total_price: Set(total_price),
            };
            placed_items.push(order_item.insert(&txn).await?);

            // Atomic conditional decrement: the guard makes two concurrent
            // checkouts for the same stock serialize instead of overselling.
            let result = Product::update_many()
                .col_expr(
                    product::Column::StockQuantity,
                    Expr::col(product::Column::StockQuantity).sub(item.quantity),
                )
                .col_expr(
                    product::Column::IsInStock,
                    Expr::col(product::Column::StockQuantity).gt(item.quantity),
                )
                .filter(product::Column::Id.eq(product_row.id))
                .filter(product::Column::StockQuantity.gte(item.quantity))
                .exec(&txn)
                .await?;

            if result.rows_affected == 0 {
                return Err(ServiceError::InsufficientStock(format!(
                    "Not enough stock for {} (requested {})",
                    product_row.name, item.quantity
                )));
            }

            if product_row.stock_quantity == item.quantity {
                depleted.push(product_row.id);
            }
        }

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        // Clear the applied coupon so it cannot be reused on the next cart.
        let mut cart_update: cart::ActiveModel = cart.into();
        cart_update.coupon_code = Set(None);
        cart_update.coupon_kind = Set(None);
        cart_update.coupon_value = Set(None);
        cart_update.updated_at = Set(Utc::now());
        cart_update.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;
        for product_id in depleted {
            self.event_sender
                .send_or_log(Event::StockDepleted(product_id))
                .await;
        }

        info!("Order {} created for user {}", order_number, user_id);
        Ok(PlacedOrder {
            order: order_row,
            items: placed_items,
        })
    }

    async fn load_cart_lines<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart_id: Uuid,
    ) -> Result<Vec<(cart_item::Model, product::Model)>, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .find_also_related(Product)
            .all(conn)
            .await?;

        rows.into_iter()
            .map(|(item, product)| {
                let item_id = item.id;
                product.map(|p| (item, p)).ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "Cart item {} references missing product",
                        item_id
                    ))
                })
            })
            .collect()
    }

    async fn load_owned_address<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<address::Model, ServiceError> {
        Address::find_by_id(address_id)
            .filter(address::Column::UserId.eq(user_id))
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))
    }

    /// Picks an unused human-readable order number, retrying on collision.
    /// The unique index on order_number backstops the residual race.
    async fn allocate_order_number<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<String, ServiceError> {
        for attempt in 0..ORDER_NUMBER_ATTEMPTS {
            let candidate = generate_order_number();
            let taken = Order::find()
                .filter(order::Column::OrderNumber.eq(&candidate))
                .count(conn)
                .await?
                > 0;
            if !taken {
                return Ok(candidate);
            }
            warn!(
                "Order number collision on {} (attempt {})",
                candidate,
                attempt + 1
            );
        }
        Err(ServiceError::Conflict(
            "Could not allocate a unique order number".to_string(),
        ))
    }
}

fn applied_coupon(cart: &cart::Model) -> Option<(CouponKind, Decimal)> {
    match (cart.coupon_kind, cart.coupon_value) {
        (Some(kind), Some(value)) => Some((kind, value)),
        _ => None,
    }
}

pub fn generate_order_number() -> String {
    let suffix: String = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("ORD-{}", suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> CheckoutService {
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        CheckoutService::new(
            Arc::new(sea_orm::DatabaseConnection::Disconnected),
            Arc::new(EventSender::new(tx)),
            Arc::new(AppConfig::default()),
        )
    }

    #[test]
    fn quote_without_coupon_matches_worked_example() {
        // Product A 25.00 x2 + Product B 10.00 x1
        let quote = service().quote(dec!(60.00), None);
        assert_eq!(quote.shipping_amount, dec!(0.00));
        assert!(quote.free_shipping);
        assert_eq!(quote.tax_amount, dec!(5.10));
        assert_eq!(quote.discount_amount, dec!(0.00));
        assert_eq!(quote.total_amount, dec!(65.10));
    }

    #[test]
    fn quote_with_ten_percent_coupon_matches_worked_example() {
        let quote = service().quote(dec!(60.00), Some((CouponKind::Percentage, dec!(0.10))));
        assert_eq!(quote.discount_amount, dec!(6.00));
        assert_eq!(quote.total_amount, dec!(59.10));
    }

    #[test]
    fn free_shipping_boundary_is_inclusive() {
        let at_threshold = service().quote(dec!(50.00), None);
        assert_eq!(at_threshold.shipping_amount, dec!(0.00));

        let below_threshold = service().quote(dec!(49.99), None);
        assert_eq!(below_threshold.shipping_amount, dec!(9.99));
    }

    #[test]
    fn empty_subtotal_has_no_shipping() {
        let quote = service().quote(Decimal::ZERO, None);
        assert_eq!(quote.shipping_amount, Decimal::ZERO);
        assert_eq!(quote.total_amount, Decimal::ZERO);
    }

    #[test]
    fn fixed_coupon_subtracts_flat_amount() {
        let quote = service().quote(dec!(30.00), Some((CouponKind::Fixed, dec!(9.99))));
        // 30.00 + 2.55 tax + 9.99 shipping - 9.99 = 32.55
        assert_eq!(quote.tax_amount, dec!(2.55));
        assert_eq!(quote.total_amount, dec!(32.55));
    }

    #[test]
    fn oversized_discount_clamps_total_at_zero() {
        let quote = service().quote(dec!(5.00), Some((CouponKind::Fixed, dec!(100.00))));
        assert_eq!(quote.total_amount, Decimal::ZERO);
    }

    #[test]
    fn order_numbers_have_expected_shape() {
        let number = generate_order_number();
        assert!(number.starts_with("ORD-"));
        assert_eq!(number.len(), 12);
        assert!(number[4..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
