pub mod address;
pub mod cart;
pub mod cart_item;
pub mod category;
pub mod order;
pub mod order_item;
pub mod payment_method;
pub mod product;
pub mod product_image;
pub mod product_tag;
pub mod product_tag_link;
pub mod review;
pub mod user;
pub mod wishlist;

pub use address::{AddressType, Entity as Address, Model as AddressModel};
pub use cart::{CouponKind, Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use category::{Entity as Category, Model as CategoryModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, PaymentStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use payment_method::{Entity as PaymentMethod, Model as PaymentMethodModel, PaymentType};
pub use product::{Entity as Product, Model as ProductModel};
pub use product_image::{Entity as ProductImage, Model as ProductImageModel};
pub use product_tag::{Entity as ProductTag, Model as ProductTagModel};
pub use product_tag_link::Entity as ProductTagLink;
pub use review::{Entity as Review, Model as ReviewModel};
pub use user::{Entity as User, Model as UserModel};
pub use wishlist::{Entity as Wishlist, Model as WishlistModel};
