use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_tags")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_tag_link::Entity")]
    ProductLinks,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        super::product_tag_link::Relation::Product.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::product_tag_link::Relation::Tag.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
