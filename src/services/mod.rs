pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod customers;
pub mod orders;
pub mod reviews;
pub mod wishlist;

pub use cart::{AddToCartInput, CartService, CartView};
pub use catalog::{CatalogService, ProductListQuery};
pub use checkout::{CheckoutInput, CheckoutQuote, CheckoutService};
pub use customers::CustomerService;
pub use orders::OrderService;
pub use reviews::ReviewService;
pub use wishlist::{WishlistOutcome, WishlistService};
