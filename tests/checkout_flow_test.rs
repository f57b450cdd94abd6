//! Integration tests for the checkout transaction: totals, snapshot
//! freezing, stock decrement and all-or-nothing failure semantics.

mod common;

use chrono::Utc;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use storefront_api::auth::Shopper;
use storefront_api::entities::{
    cart_item, order_item, product, CartItem, Order, OrderItem, OrderStatus, PaymentStatus,
    Product,
};
use storefront_api::errors::ServiceError;
use storefront_api::services::cart::AddToCartInput;
use storefront_api::services::checkout::CheckoutInput;

struct CheckoutFixture {
    app: TestApp,
    user_id: uuid::Uuid,
    shipping_address_id: uuid::Uuid,
    billing_address_id: uuid::Uuid,
    payment_method_id: uuid::Uuid,
    product_a: product::Model,
    product_b: product::Model,
}

/// Cart per the worked example: A (30.00, sale 25.00) x2 + B (10.00) x1.
async fn fixture() -> CheckoutFixture {
    let app = TestApp::new().await;
    let (user, _token) = app.seed_user("buyer@example.com", false).await;
    let address = app.seed_address(user.id).await;
    let payment_method = app.seed_payment_method(user.id).await;
    let category = app.seed_category("Audio", "audio").await;

    let product_a = app
        .seed_product("Product A", "product-a", dec!(30.00), Some(dec!(25.00)), 10, category.id)
        .await;
    let product_b = app
        .seed_product("Product B", "product-b", dec!(10.00), None, 10, category.id)
        .await;

    let shopper = Shopper::Customer(user.id);
    for (product_id, quantity) in [(product_a.id, 2), (product_b.id, 1)] {
        app.state
            .services
            .cart
            .add_item(
                &shopper,
                AddToCartInput {
                    product_id,
                    quantity,
                },
            )
            .await
            .unwrap();
    }

    CheckoutFixture {
        user_id: user.id,
        shipping_address_id: address.id,
        billing_address_id: address.id,
        payment_method_id: payment_method.id,
        product_a,
        product_b,
        app,
    }
}

fn input(fixture: &CheckoutFixture) -> CheckoutInput {
    CheckoutInput {
        shipping_address_id: fixture.shipping_address_id,
        billing_address_id: fixture.billing_address_id,
        payment_method_id: Some(fixture.payment_method_id),
        notes: None,
    }
}

#[tokio::test]
async fn checkout_matches_worked_example() {
    let fx = fixture().await;
    let placed = fx
        .app
        .state
        .services
        .checkout
        .checkout(fx.user_id, input(&fx))
        .await
        .unwrap();

    let order = &placed.order;
    assert_eq!(order.subtotal, dec!(60.00));
    assert_eq!(order.shipping_amount, dec!(0.00));
    assert_eq!(order.tax_amount, dec!(5.10));
    assert_eq!(order.discount_amount, dec!(0.00));
    assert_eq!(order.total_amount, dec!(65.10));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert!(order.order_number.starts_with("ORD-"));

    // Order lines reproduce the cart with frozen display prices.
    assert_eq!(placed.items.len(), 2);
    let line_a = placed
        .items
        .iter()
        .find(|item| item.product_id == fx.product_a.id)
        .unwrap();
    assert_eq!(line_a.quantity, 2);
    assert_eq!(line_a.unit_price, dec!(25.00));
    assert_eq!(line_a.total_price, dec!(50.00));

    // Cart is now empty.
    let remaining = CartItem::find().count(&*fx.app.state.db).await.unwrap();
    assert_eq!(remaining, 0);

    // Stock was decremented.
    let product_a = Product::find_by_id(fx.product_a.id)
        .one(&*fx.app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product_a.stock_quantity, 8);
    assert!(product_a.is_in_stock);
}

#[tokio::test]
async fn checkout_with_ten_percent_coupon() {
    let fx = fixture().await;
    let shopper = Shopper::Customer(fx.user_id);
    fx.app
        .state
        .services
        .cart
        .apply_coupon(&shopper, "WELCOME10")
        .await
        .unwrap();

    let placed = fx
        .app
        .state
        .services
        .checkout
        .checkout(fx.user_id, input(&fx))
        .await
        .unwrap();

    assert_eq!(placed.order.discount_amount, dec!(6.00));
    assert_eq!(placed.order.total_amount, dec!(59.10));

    // The coupon does not survive checkout.
    let cart = fx
        .app
        .state
        .services
        .cart
        .resolve(&shopper)
        .await
        .unwrap();
    assert!(cart.coupon_code.is_none());
}

#[tokio::test]
async fn order_item_prices_are_frozen_against_later_price_changes() {
    let fx = fixture().await;
    let placed = fx
        .app
        .state
        .services
        .checkout
        .checkout(fx.user_id, input(&fx))
        .await
        .unwrap();

    // Raise the product price after the purchase.
    let product_a = Product::find_by_id(fx.product_a.id)
        .one(&*fx.app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut update: product::ActiveModel = product_a.into();
    update.price = Set(dec!(99.00));
    update.sale_price = Set(None);
    update.updated_at = Set(Utc::now());
    update.update(&*fx.app.state.db).await.unwrap();

    let frozen = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(placed.order.id))
        .filter(order_item::Column::ProductId.eq(fx.product_a.id))
        .one(&*fx.app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frozen.unit_price, dec!(25.00));
    assert_eq!(frozen.total_price, dec!(50.00));
}

#[tokio::test]
async fn checkout_is_all_or_nothing_on_insufficient_stock() {
    let fx = fixture().await;

    // Stock drops below the cart quantity between add and checkout.
    let product_a = Product::find_by_id(fx.product_a.id)
        .one(&*fx.app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut update: product::ActiveModel = product_a.into();
    update.stock_quantity = Set(1);
    update.updated_at = Set(Utc::now());
    update.update(&*fx.app.state.db).await.unwrap();

    let err = fx
        .app
        .state
        .services
        .checkout
        .checkout(fx.user_id, input(&fx))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // Nothing persisted: no order, no order items, cart intact, stock as set.
    assert_eq!(Order::find().count(&*fx.app.state.db).await.unwrap(), 0);
    assert_eq!(OrderItem::find().count(&*fx.app.state.db).await.unwrap(), 0);
    let cart_items = CartItem::find()
        .filter(cart_item::Column::Quantity.gt(0))
        .count(&*fx.app.state.db)
        .await
        .unwrap();
    assert_eq!(cart_items, 2);

    let product_a = Product::find_by_id(fx.product_a.id)
        .one(&*fx.app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product_a.stock_quantity, 1);
}

#[tokio::test]
async fn checkout_rejects_empty_cart() {
    let app = TestApp::new().await;
    let (user, _token) = app.seed_user("empty@example.com", false).await;
    let address = app.seed_address(user.id).await;

    let err = app
        .state
        .services
        .checkout
        .checkout(
            user.id,
            CheckoutInput {
                shipping_address_id: address.id,
                billing_address_id: address.id,
                payment_method_id: None,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn checkout_rejects_foreign_address() {
    let fx = fixture().await;
    let (other_user, _token) = fx.app.seed_user("other@example.com", false).await;
    let foreign_address = fx.app.seed_address(other_user.id).await;

    let err = fx
        .app
        .state
        .services
        .checkout
        .checkout(
            fx.user_id,
            CheckoutInput {
                shipping_address_id: foreign_address.id,
                billing_address_id: foreign_address.id,
                payment_method_id: None,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn stock_depletion_flips_availability() {
    let app = TestApp::new().await;
    let (user, _token) = app.seed_user("depleter@example.com", false).await;
    let address = app.seed_address(user.id).await;
    let category = app.seed_category("Audio", "audio").await;
    let product = app
        .seed_product("Last One", "last-one", dec!(55.00), None, 1, category.id)
        .await;

    let shopper = Shopper::Customer(user.id);
    app.state
        .services
        .cart
        .add_item(
            &shopper,
            AddToCartInput {
                product_id: product.id,
                quantity: 1,
            },
        )
        .await
        .unwrap();

    app.state
        .services
        .checkout
        .checkout(
            user.id,
            CheckoutInput {
                shipping_address_id: address.id,
                billing_address_id: address.id,
                payment_method_id: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let product = Product::find_by_id(product.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock_quantity, 0);
    assert!(!product.is_in_stock);
}
