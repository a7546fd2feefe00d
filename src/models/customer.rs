use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::{audited, merge, merge_opt, Address, Audit, Entity, Reference, Writable};
use crate::error::ApiError;
use crate::filter::SortDirection;
use crate::listing::{DateColumn, DateRange, ListSpec, ParamFilter, Populate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum CustomerTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum CustomerStatus {
    Active,
    Inactive,
    Prospect,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    /// Assigned by the database on insert
    pub customer_code: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub tier: CustomerTier,
    pub status: CustomerStatus,
    pub address: Option<Json<Address>>,
    pub total_purchases: Decimal,
    pub last_purchase_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub notes: Option<String>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub audit: Audit,
}

static LIST: ListSpec = ListSpec {
    search: &["first_name", "last_name", "email", "customer_code", "phone", "company_name"],
    filters: &[
        ParamFilter::text("tier", "tier"),
        ParamFilter::text("status", "status"),
        ParamFilter::uuid("assignedTo", "assigned_to"),
    ],
    date_range: Some(DateRange { column: "created_at", kind: DateColumn::Timestamp }),
    order: &[("created_at", SortDirection::Desc)],
    default_limit: None,
};

static POPULATE: [Populate; 1] = [Populate::field("assignedTo", "users", &["name", "email"])];

impl Entity for Customer {
    const TABLE: &'static str = "customers";
    const LABEL: &'static str = "Customer";
    const DUPLICATE_MESSAGE: &'static str = "Customer with this email already exists";

    audited!();

    fn list_spec() -> &'static ListSpec {
        &LIST
    }

    fn populate() -> &'static [Populate] {
        &POPULATE
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateCustomer {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub company_name: Option<String>,
    pub tier: Option<CustomerTier>,
    pub status: Option<CustomerStatus>,
    #[validate]
    pub address: Option<Address>,
    pub assigned_to: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateCustomer {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub company_name: Option<String>,
    pub tier: Option<CustomerTier>,
    pub status: Option<CustomerStatus>,
    #[validate]
    pub address: Option<Address>,
    pub assigned_to: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl Writable for Customer {
    type Create = CreateCustomer;
    type Update = UpdateCustomer;

    fn create(input: CreateCustomer, actor: Uuid) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            customer_code: None,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email.trim().to_lowercase(),
            phone: input.phone,
            company_name: input.company_name,
            tier: input.tier.unwrap_or(CustomerTier::Bronze),
            status: input.status.unwrap_or(CustomerStatus::Active),
            address: input.address.map(Json),
            total_purchases: Decimal::ZERO,
            last_purchase_date: None,
            assigned_to: input.assigned_to,
            notes: input.notes,
            audit: Audit::new(Some(actor)),
        })
    }

    fn update(&mut self, input: UpdateCustomer) -> Result<(), ApiError> {
        merge(&mut self.first_name, input.first_name);
        merge(&mut self.last_name, input.last_name);
        merge(&mut self.email, input.email.map(|e| e.trim().to_lowercase()));
        merge_opt(&mut self.phone, input.phone);
        merge_opt(&mut self.company_name, input.company_name);
        merge(&mut self.tier, input.tier);
        merge(&mut self.status, input.status);
        merge_opt(&mut self.address, input.address.map(Json));
        merge_opt(&mut self.assigned_to, input.assigned_to);
        merge_opt(&mut self.notes, input.notes);
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        Reference::optional("users", "Assigned user", self.assigned_to)
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_customer_gets_defaults() {
        let input: CreateCustomer =
            serde_json::from_value(json!({ "firstName": "A", "lastName": "B", "email": "A@B.com" })).unwrap();
        assert!(input.validate().is_ok());
        let customer = Customer::create(input, Uuid::new_v4()).unwrap();
        assert_eq!(customer.email, "a@b.com");
        assert_eq!(customer.tier, CustomerTier::Bronze);
        assert_eq!(customer.status, CustomerStatus::Active);
        assert!(customer.references().is_empty());

        let wire = customer.to_api_value();
        assert_eq!(wire["firstName"], "A");
        assert!(wire["customerCode"].is_null());
    }

    #[test]
    fn invalid_email_fails_validation() {
        let input: CreateCustomer =
            serde_json::from_value(json!({ "firstName": "A", "lastName": "B", "email": "not-an-email" })).unwrap();
        let errs = input.validate().unwrap_err();
        assert!(errs.field_errors().contains_key("email"));
    }

    #[test]
    fn unknown_tier_is_rejected() {
        let body = json!({ "firstName": "A", "lastName": "B", "email": "a@b.com", "tier": "diamond" });
        assert!(serde_json::from_value::<CreateCustomer>(body).is_err());
    }
}
