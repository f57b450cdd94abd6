use crate::{
    entities::{
        address, payment_method, Address, AddressModel, AddressType, PaymentMethod,
        PaymentMethodModel, PaymentType,
    },
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Account-owned resources: addresses and stored payment methods.
///
/// Default flipping: marking a record default unsets the previous default of
/// the same (user, type) pair. Nothing else is enforced.
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddressInput {
    pub address_type: AddressType,
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
    pub company: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub city: String,
    #[validate(length(min = 1, max = 50))]
    pub state: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 50))]
    pub country: String,
    pub phone_number: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentMethodInput {
    pub payment_type: PaymentType,
    #[validate(length(min = 4, max = 4))]
    pub card_last_four: Option<String>,
    pub card_brand: Option<String>,
    pub expiry_month: Option<String>,
    pub expiry_year: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    // ========== Addresses ==========

    pub async fn list_addresses(&self, user_id: Uuid) -> Result<Vec<AddressModel>, ServiceError> {
        Ok(Address::find()
            .filter(address::Column::UserId.eq(user_id))
            .order_by_desc(address::Column::IsDefault)
            .order_by_desc(address::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, input))]
    pub async fn create_address(
        &self,
        user_id: Uuid,
        input: AddressInput,
    ) -> Result<AddressModel, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;
        if input.is_default {
            self.unset_default_addresses(&txn, user_id, input.address_type)
                .await?;
        }

        let now = Utc::now();
        let model = address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            address_type: Set(input.address_type),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            company: Set(input.company),
            address_line_1: Set(input.address_line_1),
            address_line_2: Set(input.address_line_2),
            city: Set(input.city),
            state: Set(input.state),
            postal_code: Set(input.postal_code),
            country: Set(input.country),
            phone_number: Set(input.phone_number),
            is_default: Set(input.is_default),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&txn).await?;
        txn.commit().await?;
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        input: AddressInput,
    ) -> Result<AddressModel, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;
        let existing = Address::find_by_id(address_id)
            .filter(address::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;

        if input.is_default {
            self.unset_default_addresses(&txn, user_id, input.address_type)
                .await?;
        }

        let mut active: address::ActiveModel = existing.into();
        active.address_type = Set(input.address_type);
        active.first_name = Set(input.first_name);
        active.last_name = Set(input.last_name);
        active.company = Set(input.company);
        active.address_line_1 = Set(input.address_line_1);
        active.address_line_2 = Set(input.address_line_2);
        active.city = Set(input.city);
        active.state = Set(input.state);
        active.postal_code = Set(input.postal_code);
        active.country = Set(input.country);
        active.phone_number = Set(input.phone_number);
        active.is_default = Set(input.is_default);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    pub async fn delete_address(&self, user_id: Uuid, address_id: Uuid) -> Result<(), ServiceError> {
        let address = Address::find_by_id(address_id)
            .filter(address::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;

        address.delete(&*self.db).await?;
        Ok(())
    }

    async fn unset_default_addresses<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
        address_type: AddressType,
    ) -> Result<(), ServiceError> {
        Address::update_many()
            .col_expr(address::Column::IsDefault, Expr::value(false))
            .filter(address::Column::UserId.eq(user_id))
            .filter(address::Column::AddressType.eq(address_type))
            .filter(address::Column::IsDefault.eq(true))
            .exec(conn)
            .await?;
        Ok(())
    }

    // ========== Payment methods ==========

    pub async fn list_payment_methods(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<PaymentMethodModel>, ServiceError> {
        Ok(PaymentMethod::find()
            .filter(payment_method::Column::UserId.eq(user_id))
            .filter(payment_method::Column::IsActive.eq(true))
            .order_by_desc(payment_method::Column::IsDefault)
            .order_by_desc(payment_method::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, input))]
    pub async fn create_payment_method(
        &self,
        user_id: Uuid,
        input: PaymentMethodInput,
    ) -> Result<PaymentMethodModel, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;
        if input.is_default {
            PaymentMethod::update_many()
                .col_expr(payment_method::Column::IsDefault, Expr::value(false))
                .filter(payment_method::Column::UserId.eq(user_id))
                .filter(payment_method::Column::PaymentType.eq(input.payment_type))
                .filter(payment_method::Column::IsDefault.eq(true))
                .exec(&txn)
                .await?;
        }

        let now = Utc::now();
        let model = payment_method::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            payment_type: Set(input.payment_type),
            card_last_four: Set(input.card_last_four),
            card_brand: Set(input.card_brand),
            expiry_month: Set(input.expiry_month),
            expiry_year: Set(input.expiry_year),
            is_default: Set(input.is_default),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&txn).await?;
        txn.commit().await?;
        Ok(created)
    }

    pub async fn delete_payment_method(
        &self,
        user_id: Uuid,
        payment_method_id: Uuid,
    ) -> Result<(), ServiceError> {
        let method = PaymentMethod::find_by_id(payment_method_id)
            .filter(payment_method::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payment method {} not found", payment_method_id))
            })?;

        method.delete(&*self.db).await?;
        Ok(())
    }
}
