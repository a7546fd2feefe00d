//! Stored records, their input DTOs and per-entity list contracts.

pub mod account;
pub mod attendance;
pub mod customer;
pub mod product;
pub mod resource;
pub mod sales_outlet;
pub mod service_template;
pub mod settings;
pub mod supplier;
pub mod ticket;
pub mod transaction;
pub mod user;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{postgres::PgRow, FromRow};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::ApiError;
use crate::listing::{ListSpec, Populate};

pub use account::Account;
pub use attendance::Attendance;
pub use customer::Customer;
pub use product::Product;
pub use resource::{Machine, Tool, Workstation};
pub use sales_outlet::SalesOutlet;
pub use service_template::ServiceTemplate;
pub use settings::Settings;
pub use supplier::Supplier;
pub use ticket::SupportTicket;
pub use transaction::Transaction;
pub use user::User;

/// Soft-delete flag and attribution shared by every record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub last_updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Audit {
    pub fn new(actor: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            is_active: true,
            created_by: actor,
            last_updated_by: actor,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, actor: Uuid) {
        self.last_updated_by = Some(actor);
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self, actor: Uuid) {
        self.is_active = false;
        self.touch(actor);
    }
}

pub trait Entity: for<'r> FromRow<'r, PgRow> + Serialize + Send + Sync + Unpin + Sized + 'static {
    const TABLE: &'static str;
    /// Display name used in messages, e.g. "Sales outlet"
    const LABEL: &'static str;
    /// Message for a natural-key collision
    const DUPLICATE_MESSAGE: &'static str = "Record already exists";

    fn id(&self) -> Uuid;
    fn audit(&self) -> &Audit;
    fn audit_mut(&mut self) -> &mut Audit;

    fn list_spec() -> &'static ListSpec;

    fn populate() -> &'static [Populate] {
        &[]
    }

    /// Client representation before population
    fn to_api_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Implements the id/audit accessors for a record with `id` and flattened `audit` fields.
macro_rules! audited {
    () => {
        fn id(&self) -> uuid::Uuid {
            self.id
        }

        fn audit(&self) -> &$crate::models::Audit {
            &self.audit
        }

        fn audit_mut(&mut self) -> &mut $crate::models::Audit {
            &mut self.audit
        }
    };
}

pub(crate) use audited;

/// Postal address stored as jsonb
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Address {
    #[validate(length(max = 200))]
    pub street: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub state: Option<String>,
    #[validate(length(max = 20))]
    pub postal_code: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
}

/// A foreign key that must point at an active record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub table: &'static str,
    pub label: &'static str,
    pub id: Uuid,
}

impl Reference {
    pub fn new(table: &'static str, label: &'static str, id: Uuid) -> Self {
        Self { table, label, id }
    }

    pub fn optional(table: &'static str, label: &'static str, id: Option<Uuid>) -> Option<Self> {
        id.map(|id| Self::new(table, label, id))
    }
}

/// Entities written through the generic create/update endpoints.
pub trait Writable: Entity {
    type Create: DeserializeOwned + Validate + Send + 'static;
    type Update: DeserializeOwned + Validate + Send + 'static;

    /// Whether `apply_settings` needs the settings record on create
    const USES_SETTINGS: bool = false;

    fn create(input: Self::Create, actor: Uuid) -> Result<Self, ApiError>;

    /// Merges present fields; guards on the current state go here too.
    fn update(&mut self, input: Self::Update) -> Result<(), ApiError>;

    fn apply_settings(&mut self, _settings: &Settings) {}

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }
}

/// Overwrites `target` when the update carries a value.
pub fn merge<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

pub fn merge_opt<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

pub fn non_negative(value: &rust_decimal::Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    Ok(())
}
