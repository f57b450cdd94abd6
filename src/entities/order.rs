use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable order snapshot created at checkout. Monetary fields are stored
/// as computed at purchase time and never recomputed.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub tax_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub shipping_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub discount_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub total_amount: Decimal,
    pub shipping_address_id: Uuid,
    pub billing_address_id: Uuid,
    #[sea_orm(nullable)]
    pub payment_method_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub tracking_number: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::address::Entity",
        from = "Column::ShippingAddressId",
        to = "super::address::Column::Id"
    )]
    ShippingAddress,
    #[sea_orm(
        belongs_to = "super::address::Entity",
        from = "Column::BillingAddressId",
        to = "super::address::Column::Id"
    )]
    BillingAddress,
    #[sea_orm(
        belongs_to = "super::payment_method::Entity",
        from = "Column::PaymentMethodId",
        to = "super::payment_method::Column::Id"
    )]
    PaymentMethod,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Fulfillment state. Progresses only through explicit staff action; there
/// is no automatic progression.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl OrderStatus {
    /// Whether a staff status update from `self` to `next` is allowed.
    /// `payment_settled` gates the refund transition.
    pub fn can_transition_to(self, next: OrderStatus, payment_settled: bool) -> bool {
        use OrderStatus::*;
        if self == next {
            return true;
        }
        match (self, next) {
            (Pending, Processing) | (Pending, Cancelled) => true,
            (Processing, Shipped) => true,
            (Shipped, Delivered) => true,
            (_, Refunded) => payment_settled,
            _ => false,
        }
    }
}

/// Payment state, tracked independently of fulfillment status.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl PaymentStatus {
    pub fn is_settled(self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;
    use super::*;

    #[test]
    fn happy_path_transitions_are_allowed() {
        assert!(Pending.can_transition_to(Processing, false));
        assert!(Processing.can_transition_to(Shipped, false));
        assert!(Shipped.can_transition_to(Delivered, false));
    }

    #[test]
    fn cancellation_only_from_pending() {
        assert!(Pending.can_transition_to(Cancelled, false));
        assert!(!Processing.can_transition_to(Cancelled, false));
        assert!(!Shipped.can_transition_to(Cancelled, true));
    }

    #[test]
    fn refund_requires_settled_payment() {
        assert!(!Pending.can_transition_to(Refunded, false));
        assert!(Pending.can_transition_to(Refunded, true));
        assert!(Delivered.can_transition_to(Refunded, true));
        assert!(!Delivered.can_transition_to(Refunded, false));
    }

    #[test]
    fn no_backwards_progression() {
        assert!(!Shipped.can_transition_to(Processing, false));
        assert!(!Delivered.can_transition_to(Pending, false));
    }

    #[test]
    fn status_display_matches_wire_format() {
        assert_eq!(Pending.to_string(), "pending");
        assert_eq!(Processing.to_string(), "processing");
        assert_eq!(PaymentStatus::Paid.to_string(), "paid");
    }
}
