use crate::{
    auth::Shopper,
    entities::{cart, cart_item, Cart, CartItem, CartModel, CouponKind, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Coupon codes honored at checkout. Percentage values are fractions of the
/// subtotal; fixed values are dollar amounts.
const COUPONS: &[(&str, CouponKind, Decimal)] = &[
    ("WELCOME10", CouponKind::Percentage, dec!(0.10)),
    ("SAVE20", CouponKind::Percentage, dec!(0.20)),
    ("FREESHIP", CouponKind::Fixed, dec!(9.99)),
];

pub fn lookup_coupon(code: &str) -> Option<(CouponKind, Decimal)> {
    COUPONS
        .iter()
        .find(|(name, _, _)| *name == code)
        .map(|(_, kind, value)| (*kind, *value))
}

/// Shopping cart service: resolution, mutation, totals and coupons.
///
/// A cart belongs to an authenticated user or to an anonymous session key.
/// Totals are recomputed from the live product display prices on every read
/// and are never stored on the cart row.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Input for adding an item to the cart
#[derive(Debug, Deserialize)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// One cart line joined with its product
#[derive(Debug, Serialize)]
pub struct CartLine {
    pub item: cart_item::Model,
    pub product_name: String,
    pub product_slug: String,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub in_stock: bool,
}

/// A cart with its lines and derived totals
#[derive(Debug, Serialize)]
pub struct CartView {
    pub cart: CartModel,
    pub items: Vec<CartLine>,
    pub total_items: i64,
    pub total_price: Decimal,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Returns the single cart representing the current shopper, creating it
    /// lazily on first use.
    #[instrument(skip(self))]
    pub async fn resolve(&self, shopper: &Shopper) -> Result<CartModel, ServiceError> {
        self.resolve_on(&*self.db, shopper).await
    }

    async fn resolve_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        shopper: &Shopper,
    ) -> Result<CartModel, ServiceError> {
        let existing = match shopper {
            Shopper::Customer(user_id) => {
                Cart::find()
                    .filter(cart::Column::UserId.eq(*user_id))
                    .one(conn)
                    .await?
            }
            Shopper::Anonymous(session_key) => {
                Cart::find()
                    .filter(cart::Column::SessionKey.eq(session_key.clone()))
                    .one(conn)
                    .await?
            }
        };

        if let Some(cart) = existing {
            return Ok(cart);
        }

        let now = Utc::now();
        let model = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(match shopper {
                Shopper::Customer(user_id) => Some(*user_id),
                Shopper::Anonymous(_) => None,
            }),
            session_key: Set(match shopper {
                Shopper::Customer(_) => None,
                Shopper::Anonymous(session_key) => Some(session_key.clone()),
            }),
            coupon_code: Set(None),
            coupon_kind: Set(None),
            coupon_value: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(conn).await?;
        self.event_sender
            .send_or_log(Event::CartCreated(created.id))
            .await;
        Ok(created)
    }

    /// Loads the shopper's cart with lines and derived totals.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, shopper: &Shopper) -> Result<CartView, ServiceError> {
        let cart = self.resolve(shopper).await?;
        self.build_view(&*self.db, cart).await
    }

    async fn build_view<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart: CartModel,
    ) -> Result<CartView, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(Product)
            .all(conn)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        let mut total_items: i64 = 0;
        let mut total_price = Decimal::ZERO;

        for (item, product) in rows {
            let product = product.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Cart item {} references missing product",
                    item.id
                ))
            })?;
            let unit_price = product.display_price();
            let line_total = unit_price * Decimal::from(item.quantity);
            total_items += i64::from(item.quantity);
            total_price += line_total;
            items.push(CartLine {
                unit_price,
                line_total,
                product_name: product.name,
                product_slug: product.slug,
                in_stock: product.is_in_stock,
                item,
            });
        }

        Ok(CartView {
            cart,
            items,
            total_items,
            total_price,
        })
    }

    /// Total number of units in the shopper's cart.
    pub async fn count(&self, shopper: &Shopper) -> Result<i64, ServiceError> {
        Ok(self.get_cart(shopper).await?.total_items)
    }

    /// Adds a product to the cart.
    ///
    /// Fails when the product is inactive, unknown, or out of stock, or when
    /// the quantity is not positive. If the product is already in the cart
    /// the quantities are summed and silently clamped down to the available
    /// stock.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        shopper: &Shopper,
        input: AddToCartInput,
    ) -> Result<CartView, ServiceError> {
        if input.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than 0.".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let product = Product::find_by_id(input.product_id)
            .filter(crate::entities::product::Column::IsActive.eq(true))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        if !product.is_in_stock {
            return Err(ServiceError::InvalidOperation(
                "This product is currently out of stock.".to_string(),
            ));
        }

        let cart = self.resolve_on(&txn, shopper).await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product.id))
            .one(&txn)
            .await?;

        match existing {
            Some(item) => {
                let combined = item.quantity.saturating_add(input.quantity);
                let clamped = combined.min(product.stock_quantity);
                let mut item: cart_item::ActiveModel = item.into();
                item.quantity = Set(clamped);
                item.updated_at = Set(Utc::now());
                item.update(&txn).await?;
            }
            None => {
                let now = Utc::now();
                let item = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product.id),
                    quantity: Set(input.quantity),
                    added_at: Set(now),
                    updated_at: Set(now),
                };
                item.insert(&txn).await?;
            }
        }

        let cart = self.touch(&txn, cart).await?;
        let view = self.build_view(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: view.cart.id,
                product_id: product.id,
            })
            .await;

        info!(
            "Added product {} x{} to cart {}",
            product.id, input.quantity, view.cart.id
        );
        Ok(view)
    }

    /// Updates the quantity of a cart line. A quantity of zero or less
    /// removes the line; a quantity above the available stock is rejected.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        shopper: &Shopper,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = self.resolve_on(&txn, shopper).await?;

        let item = CartItem::find_by_id(item_id)
            .filter(cart_item::Column::CartId.eq(cart.id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        if quantity <= 0 {
            let product_id = item.product_id;
            CartItem::delete_by_id(item.id).exec(&txn).await?;
            self.event_sender
                .send_or_log(Event::CartItemRemoved {
                    cart_id: cart.id,
                    product_id,
                })
                .await;
        } else {
            let product = Product::find_by_id(item.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;

            if quantity > product.stock_quantity {
                return Err(ServiceError::InvalidOperation(format!(
                    "Only {} items available in stock.",
                    product.stock_quantity
                )));
            }

            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(quantity);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        }

        let cart = self.touch(&txn, cart).await?;
        let view = self.build_view(&txn, cart).await?;
        txn.commit().await?;
        Ok(view)
    }

    /// Removes a cart line unconditionally.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        shopper: &Shopper,
        item_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        self.update_item_quantity(shopper, item_id, 0).await
    }

    /// Deletes every line in the shopper's cart.
    #[instrument(skip(self))]
    pub async fn clear(&self, shopper: &Shopper) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = self.resolve_on(&txn, shopper).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        let cart = self.touch(&txn, cart).await?;
        let view = self.build_view(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartCleared(view.cart.id))
            .await;
        info!("Cleared cart {}", view.cart.id);
        Ok(view)
    }

    /// Applies a coupon code to the cart. The discount is stored on the cart
    /// row so it survives login and travels with the cart to checkout.
    #[instrument(skip(self))]
    pub async fn apply_coupon(
        &self,
        shopper: &Shopper,
        code: &str,
    ) -> Result<CartView, ServiceError> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(ServiceError::ValidationError(
                "Please enter a coupon code.".to_string(),
            ));
        }

        let (kind, value) = lookup_coupon(&code)
            .ok_or_else(|| ServiceError::ValidationError("Invalid coupon code.".to_string()))?;

        let cart = self.resolve(shopper).await?;
        let cart_id = cart.id;
        let mut active: cart::ActiveModel = cart.into();
        active.coupon_code = Set(Some(code.clone()));
        active.coupon_kind = Set(Some(kind));
        active.coupon_value = Set(Some(value));
        active.updated_at = Set(Utc::now());
        let cart = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CouponApplied { cart_id, code })
            .await;

        self.build_view(&*self.db, cart).await
    }

    /// Removes the applied coupon, failing when none is applied.
    #[instrument(skip(self))]
    pub async fn remove_coupon(&self, shopper: &Shopper) -> Result<CartView, ServiceError> {
        let cart = self.resolve(shopper).await?;
        if cart.coupon_code.is_none() {
            return Err(ServiceError::InvalidOperation(
                "No coupon applied.".to_string(),
            ));
        }

        let cart_id = cart.id;
        let mut active: cart::ActiveModel = cart.into();
        active.coupon_code = Set(None);
        active.coupon_kind = Set(None);
        active.coupon_value = Set(None);
        active.updated_at = Set(Utc::now());
        let cart = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CouponRemoved(cart_id))
            .await;

        self.build_view(&*self.db, cart).await
    }

    /// Merges the anonymous cart identified by `session_key` into the user's
    /// cart: duplicate products have their quantities summed (no stock check
    /// at merge time), then the anonymous cart is deleted.
    #[instrument(skip(self))]
    pub async fn merge_session_cart(
        &self,
        user_id: Uuid,
        session_key: &str,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let session_cart = Cart::find()
            .filter(cart::Column::SessionKey.eq(session_key))
            .one(&txn)
            .await?;

        let Some(session_cart) = session_cart else {
            txn.commit().await?;
            return Ok(());
        };

        let user_cart = self
            .resolve_on(&txn, &Shopper::Customer(user_id))
            .await?;

        let session_items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(session_cart.id))
            .all(&txn)
            .await?;

        for session_item in session_items {
            let existing = CartItem::find()
                .filter(cart_item::Column::CartId.eq(user_cart.id))
                .filter(cart_item::Column::ProductId.eq(session_item.product_id))
                .one(&txn)
                .await?;

            match existing {
                Some(item) => {
                    let combined = item.quantity.saturating_add(session_item.quantity);
                    let mut item: cart_item::ActiveModel = item.into();
                    item.quantity = Set(combined);
                    item.updated_at = Set(Utc::now());
                    item.update(&txn).await?;
                }
                None => {
                    let now = Utc::now();
                    let item = cart_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        cart_id: Set(user_cart.id),
                        product_id: Set(session_item.product_id),
                        quantity: Set(session_item.quantity),
                        added_at: Set(now),
                        updated_at: Set(now),
                    };
                    item.insert(&txn).await?;
                }
            }
        }

        let session_cart_id = session_cart.id;
        Cart::delete_by_id(session_cart_id).exec(&txn).await?;
        let user_cart_id = user_cart.id;
        self.touch(&txn, user_cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartMerged {
                user_cart_id,
                session_cart_id,
            })
            .await;
        info!(
            "Merged session cart {} into user cart {}",
            session_cart_id, user_cart_id
        );
        Ok(())
    }

    /// Bumps the cart's updated_at to approximate "last touched".
    async fn touch<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart: CartModel,
    ) -> Result<CartModel, ServiceError> {
        let mut active: cart::ActiveModel = cart.into();
        active.updated_at = Set(Utc::now());
        Ok(active.update(conn).await?)
    }
}
