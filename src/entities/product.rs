use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Product entity for the storefront catalog
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(nullable)]
    pub short_description: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub sale_price: Option<Decimal>,
    pub stock_quantity: i32,
    /// Derived from stock_quantity on every save
    pub is_in_stock: bool,
    pub low_stock_threshold: i32,
    pub category_id: Uuid,
    /// Primary image path under the media root (products/main/)
    #[sea_orm(nullable)]
    pub main_image: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub is_bestseller: bool,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    #[sea_orm(has_many = "super::product_image::Entity")]
    Images,
    #[sea_orm(has_many = "super::product_tag_link::Entity")]
    TagLinks,
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::product_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Images.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Related<super::product_tag::Entity> for Entity {
    fn to() -> RelationDef {
        super::product_tag_link::Relation::Tag.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::product_tag_link::Relation::Product.def().rev())
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// Keeps is_in_stock consistent with stock_quantity on every save.
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if let ActiveValue::Set(quantity) = self.stock_quantity {
            self.is_in_stock = ActiveValue::Set(quantity > 0);
        }
        Ok(self)
    }
}

impl Model {
    /// The price shown to shoppers: the sale price when one is set below the
    /// list price, otherwise the list price.
    pub fn display_price(&self) -> Decimal {
        match self.sale_price {
            Some(sale) if sale < self.price => sale,
            _ => self.price,
        }
    }

    pub fn is_on_sale(&self) -> bool {
        matches!(self.sale_price, Some(sale) if sale < self.price)
    }

    pub fn discount_percentage(&self) -> Decimal {
        match self.sale_price {
            Some(sale) if sale < self.price => {
                ((self.price - sale) / self.price * Decimal::from(100)).round_dp(1)
            }
            _ => Decimal::ZERO,
        }
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(price: Decimal, sale_price: Option<Decimal>) -> Model {
        Model {
            id: Uuid::new_v4(),
            name: "Widget".into(),
            slug: "widget".into(),
            description: "A widget".into(),
            short_description: None,
            price,
            sale_price,
            stock_quantity: 10,
            is_in_stock: true,
            low_stock_threshold: 5,
            category_id: Uuid::new_v4(),
            main_image: None,
            is_active: true,
            is_featured: false,
            is_bestseller: false,
            view_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn display_price_prefers_lower_sale_price() {
        let p = product(dec!(30.00), Some(dec!(25.00)));
        assert_eq!(p.display_price(), dec!(25.00));
        assert!(p.is_on_sale());
    }

    #[test]
    fn display_price_ignores_sale_price_not_below_list() {
        let p = product(dec!(30.00), Some(dec!(30.00)));
        assert_eq!(p.display_price(), dec!(30.00));
        assert!(!p.is_on_sale());

        let p = product(dec!(30.00), Some(dec!(35.00)));
        assert_eq!(p.display_price(), dec!(30.00));
    }

    #[test]
    fn display_price_without_sale_price() {
        let p = product(dec!(10.00), None);
        assert_eq!(p.display_price(), dec!(10.00));
        assert_eq!(p.discount_percentage(), Decimal::ZERO);
    }

    #[test]
    fn discount_percentage_rounds_to_one_decimal() {
        let p = product(dec!(30.00), Some(dec!(25.00)));
        assert_eq!(p.discount_percentage(), dec!(16.7));
    }

    #[test]
    fn low_stock_threshold_is_inclusive() {
        let mut p = product(dec!(10.00), None);
        p.stock_quantity = 5;
        assert!(p.is_low_stock());
        p.stock_quantity = 6;
        assert!(!p.is_low_stock());
    }
}
