use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::{audited, merge, merge_opt, Audit, Entity, Reference, Writable};
use crate::error::ApiError;
use crate::filter::{Condition, FilterError, SortDirection};
use crate::listing::{parse_uuid, DateColumn, DateRange, ListSpec, ParamFilter, Populate};
use crate::workflow::TransactionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum TransactionType {
    Journal,
    Payment,
    Receipt,
    Sale,
    Purchase,
    Adjustment,
}

/// One debit or credit line against an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LedgerEntry {
    pub account: Uuid,
    #[serde(default)]
    #[validate(custom = "super::non_negative")]
    pub debit: Decimal,
    #[serde(default)]
    #[validate(custom = "super::non_negative")]
    pub credit: Decimal,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    /// Assigned by the database on insert
    pub transaction_number: Option<String>,
    pub date: NaiveDate,
    pub description: String,
    pub reference: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub entries: Json<Vec<LedgerEntry>>,
    pub total_amount: Decimal,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub posted_by: Option<Uuid>,
    pub posted_at: Option<DateTime<Utc>>,
    pub reconciled_by: Option<Uuid>,
    pub reconciled_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub audit: Audit,
}

fn entry_account(raw: &str) -> Result<Condition, FilterError> {
    let id = parse_uuid("account", raw)?;
    Ok(Condition::JsonContains {
        column: "entries".to_string(),
        value: json!([{ "account": id }]),
    })
}

static LIST: ListSpec = ListSpec {
    search: &["transaction_number", "description", "reference"],
    filters: &[
        ParamFilter::text("type", "type"),
        ParamFilter::text("status", "status"),
        ParamFilter::custom("account", entry_account),
    ],
    date_range: Some(DateRange { column: "date", kind: DateColumn::Date }),
    order: &[("date", SortDirection::Desc), ("created_at", SortDirection::Desc)],
    default_limit: None,
};

static POPULATE: [Populate; 5] = [
    Populate::nested("entries", "account", "accounts", &["code", "name", "type"]),
    Populate::field("createdBy", "users", &["name", "email"]),
    Populate::field("approvedBy", "users", &["name", "email"]),
    Populate::field("postedBy", "users", &["name", "email"]),
    Populate::field("reconciledBy", "users", &["name", "email"]),
];

impl Entity for Transaction {
    const TABLE: &'static str = "transactions";
    const LABEL: &'static str = "Transaction";
    const DUPLICATE_MESSAGE: &'static str = "Transaction with this number already exists";

    audited!();

    fn list_spec() -> &'static ListSpec {
        &LIST
    }

    fn populate() -> &'static [Populate] {
        &POPULATE
    }
}

impl Transaction {
    pub fn total_debit(&self) -> Decimal {
        self.entries.0.iter().map(|e| e.debit).sum()
    }

    pub fn total_credit(&self) -> Decimal {
        self.entries.0.iter().map(|e| e.credit).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debit() == self.total_credit()
    }
}

/// Each line carries exactly one positive side.
fn check_entries(entries: &[LedgerEntry]) -> Result<(), ApiError> {
    if entries.is_empty() {
        return Err(ApiError::invalid_field("At least one entry is required"));
    }
    for (i, entry) in entries.iter().enumerate() {
        let debit = entry.debit > Decimal::ZERO;
        let credit = entry.credit > Decimal::ZERO;
        if debit == credit {
            return Err(ApiError::invalid_field(format!(
                "Entry {} must have either a debit or a credit amount",
                i + 1
            )));
        }
    }
    Ok(())
}

fn total_of(entries: &[LedgerEntry]) -> Decimal {
    entries.iter().map(|e| e.debit).sum()
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTransaction {
    pub date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    #[validate]
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTransaction {
    pub date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 500))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub entries: Option<Vec<LedgerEntry>>,
}

impl Writable for Transaction {
    type Create = CreateTransaction;
    type Update = UpdateTransaction;

    fn create(input: CreateTransaction, actor: Uuid) -> Result<Self, ApiError> {
        check_entries(&input.entries)?;
        Ok(Self {
            id: Uuid::new_v4(),
            transaction_number: None,
            date: input.date.unwrap_or_else(|| Utc::now().date_naive()),
            description: input.description,
            reference: input.reference,
            transaction_type: input.transaction_type,
            status: TransactionStatus::Draft,
            total_amount: total_of(&input.entries),
            entries: Json(input.entries),
            approved_by: None,
            approved_at: None,
            posted_by: None,
            posted_at: None,
            reconciled_by: None,
            reconciled_at: None,
            audit: Audit::new(Some(actor)),
        })
    }

    fn update(&mut self, input: UpdateTransaction) -> Result<(), ApiError> {
        if !self.status.is_editable() {
            return Err(ApiError::invalid_state("Only draft transactions can be edited"));
        }
        merge(&mut self.date, input.date);
        merge(&mut self.description, input.description);
        merge_opt(&mut self.reference, input.reference);
        merge(&mut self.transaction_type, input.transaction_type);
        if let Some(entries) = input.entries {
            for entry in &entries {
                entry.validate()?;
            }
            check_entries(&entries)?;
            self.total_amount = total_of(&entries);
            self.entries = Json(entries);
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs: Vec<Reference> = Vec::new();
        for entry in &self.entries.0 {
            let r = Reference::new("accounts", "Account", entry.account);
            if !refs.contains(&r) {
                refs.push(r);
            }
        }
        refs
    }
}
