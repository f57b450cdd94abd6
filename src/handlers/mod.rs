pub mod auth;
pub mod carts;
pub mod categories;
pub mod checkout;
pub mod common;
pub mod customers;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod tags;
pub mod wishlist;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use std::sync::Arc;

pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<crate::services::CatalogService>,
    pub cart: Arc<crate::services::CartService>,
    pub checkout: Arc<crate::services::CheckoutService>,
    pub orders: Arc<crate::services::OrderService>,
    pub reviews: Arc<crate::services::ReviewService>,
    pub wishlist: Arc<crate::services::WishlistService>,
    pub customers: Arc<crate::services::CustomerService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, config: Arc<AppConfig>) -> Self {
        let catalog = Arc::new(crate::services::CatalogService::new(db.clone()));
        let cart = Arc::new(crate::services::CartService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let checkout = Arc::new(crate::services::CheckoutService::new(
            db.clone(),
            event_sender.clone(),
            config,
        ));
        let orders = Arc::new(crate::services::OrderService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let reviews = Arc::new(crate::services::ReviewService::new(
            db.clone(),
            event_sender.clone(),
            orders.clone(),
        ));
        let wishlist = Arc::new(crate::services::WishlistService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let customers = Arc::new(crate::services::CustomerService::new(db));

        Self {
            catalog,
            cart,
            checkout,
            orders,
            reviews,
            wishlist,
            customers,
        }
    }
}
