use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::{audited, merge, merge_opt, Address, Audit, Entity, Writable};
use crate::error::ApiError;
use crate::filter::SortDirection;
use crate::listing::{ListSpec, ParamFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum SupplierStatus {
    Active,
    Inactive,
    Blocked,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub category: Option<String>,
    pub status: SupplierStatus,
    pub rating: Option<i32>,
    pub payment_terms: Option<String>,
    pub address: Option<Json<Address>>,
    pub total_purchases: Decimal,
    pub notes: Option<String>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub audit: Audit,
}

static LIST: ListSpec = ListSpec {
    search: &["name", "code", "contact_person", "email"],
    filters: &[
        ParamFilter::text("category", "category"),
        ParamFilter::text("status", "status"),
    ],
    date_range: None,
    order: &[("name", SortDirection::Asc)],
    default_limit: None,
};

impl Entity for Supplier {
    const TABLE: &'static str = "suppliers";
    const LABEL: &'static str = "Supplier";
    const DUPLICATE_MESSAGE: &'static str = "Supplier with this code already exists";

    audited!();

    fn list_spec() -> &'static ListSpec {
        &LIST
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateSupplier {
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 100))]
    pub contact_person: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub status: Option<SupplierStatus>,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i32>,
    #[validate(length(max = 100))]
    pub payment_terms: Option<String>,
    #[validate]
    pub address: Option<Address>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateSupplier {
    #[validate(length(min = 1, max = 20))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub contact_person: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub status: Option<SupplierStatus>,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i32>,
    #[validate(length(max = 100))]
    pub payment_terms: Option<String>,
    #[validate]
    pub address: Option<Address>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl Writable for Supplier {
    type Create = CreateSupplier;
    type Update = UpdateSupplier;

    fn create(input: CreateSupplier, actor: Uuid) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            code: input.code.trim().to_uppercase(),
            name: input.name,
            contact_person: input.contact_person,
            email: input.email.map(|e| e.trim().to_lowercase()),
            phone: input.phone,
            category: input.category,
            status: input.status.unwrap_or(SupplierStatus::Active),
            rating: input.rating,
            payment_terms: input.payment_terms,
            address: input.address.map(Json),
            total_purchases: Decimal::ZERO,
            notes: input.notes,
            audit: Audit::new(Some(actor)),
        })
    }

    fn update(&mut self, input: UpdateSupplier) -> Result<(), ApiError> {
        merge(&mut self.code, input.code.map(|c| c.trim().to_uppercase()));
        merge(&mut self.name, input.name);
        merge_opt(&mut self.contact_person, input.contact_person);
        merge_opt(&mut self.email, input.email.map(|e| e.trim().to_lowercase()));
        merge_opt(&mut self.phone, input.phone);
        merge_opt(&mut self.category, input.category);
        merge(&mut self.status, input.status);
        merge_opt(&mut self.rating, input.rating);
        merge_opt(&mut self.payment_terms, input.payment_terms);
        merge_opt(&mut self.address, input.address.map(Json));
        merge_opt(&mut self.notes, input.notes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rating_must_be_between_one_and_five() {
        let input: CreateSupplier =
            serde_json::from_value(json!({ "code": "s-01", "name": "Acme", "rating": 6 })).unwrap();
        assert!(input.validate().unwrap_err().field_errors().contains_key("rating"));

        let input: CreateSupplier =
            serde_json::from_value(json!({ "code": "s-01", "name": "Acme", "rating": 5 })).unwrap();
        assert!(input.validate().is_ok());
        let supplier = Supplier::create(input, Uuid::new_v4()).unwrap();
        assert_eq!(supplier.code, "S-01");
    }
}
