use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::{audited, merge, merge_opt, Audit, Entity, Reference, Writable};
use crate::error::ApiError;
use crate::filter::SortDirection;
use crate::listing::{ListSpec, ParamFilter, Populate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    /// Balance movement for one ledger line: assets and expenses grow with debits, the rest with credits.
    pub fn balance_delta(&self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            AccountType::Asset | AccountType::Expense => debit - credit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => credit - debit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub account_type: AccountType,
    pub category: Option<String>,
    pub parent_account: Option<Uuid>,
    pub balance: Decimal,
    pub currency: String,
    pub description: Option<String>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub audit: Audit,
}

static LIST: ListSpec = ListSpec {
    search: &["name", "code", "description"],
    filters: &[
        ParamFilter::text("type", "type"),
        ParamFilter::text("category", "category"),
        ParamFilter::uuid("parentAccount", "parent_account"),
    ],
    date_range: None,
    order: &[("type", SortDirection::Asc), ("code", SortDirection::Asc)],
    default_limit: None,
};

static POPULATE: [Populate; 1] = [Populate::field("parentAccount", "accounts", &["code", "name"])];

impl Entity for Account {
    const TABLE: &'static str = "accounts";
    const LABEL: &'static str = "Account";
    const DUPLICATE_MESSAGE: &'static str = "Account with this code already exists";

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
pub struct CreateAccount {
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub category: Option<String>,
    pub parent_account: Option<Uuid>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateAccount {
    #[validate(length(min = 1, max = 20))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub account_type: Option<AccountType>,
    pub category: Option<String>,
    pub parent_account: Option<Uuid>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub description: Option<String>,
}

impl Writable for Account {
    type Create = CreateAccount;
    type Update = UpdateAccount;

    fn create(input: CreateAccount, actor: Uuid) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            code: input.code.trim().to_string(),
            name: input.name,
            account_type: input.account_type,
            category: input.category,
            parent_account: input.parent_account,
            balance: Decimal::ZERO,
            currency: input.currency.unwrap_or_else(|| "USD".to_string()),
            description: input.description,
            audit: Audit::new(Some(actor)),
        })
    }

    fn update(&mut self, input: UpdateAccount) -> Result<(), ApiError> {
        if input.parent_account == Some(self.id) {
            return Err(ApiError::invalid_field("An account cannot be its own parent"));
        }
        merge(&mut self.code, input.code.map(|c| c.trim().to_string()));
        merge(&mut self.name, input.name);
        merge(&mut self.account_type, input.account_type);
        merge_opt(&mut self.category, input.category);
        merge_opt(&mut self.parent_account, input.parent_account);
        merge(&mut self.currency, input.currency);
        merge_opt(&mut self.description, input.description);
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        Reference::optional("accounts", "Parent account", self.parent_account)
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_dto_rejects_unknown_fields() {
        let body = json!({ "code": "1000", "name": "Cash", "type": "asset", "balance": 10 });
        assert!(serde_json::from_value::<CreateAccount>(body).is_err());
    }

    #[test]
    fn new_accounts_start_at_zero_balance() {
        let input: CreateAccount =
            serde_json::from_value(json!({ "code": " 1000 ", "name": "Cash", "type": "asset" })).unwrap();
        let account = Account::create(input, Uuid::new_v4()).unwrap();
        assert_eq!(account.code, "1000");
        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(account.currency, "USD");

        let wire = account.to_api_value();
        assert_eq!(wire["type"], "asset");
        assert_eq!(wire["isActive"], true);
        assert!(wire.get("audit").is_none());
    }

    #[test]
    fn debits_grow_assets_and_shrink_liabilities() {
        let ten = Decimal::new(10, 0);
        assert_eq!(AccountType::Asset.balance_delta(ten, Decimal::ZERO), ten);
        assert_eq!(AccountType::Expense.balance_delta(Decimal::ZERO, ten), -ten);
        assert_eq!(AccountType::Liability.balance_delta(ten, Decimal::ZERO), -ten);
        assert_eq!(AccountType::Revenue.balance_delta(Decimal::ZERO, ten), ten);
    }

    #[test]
    fn account_cannot_parent_itself() {
        let input: CreateAccount =
            serde_json::from_value(json!({ "code": "1000", "name": "Cash", "type": "asset" })).unwrap();
        let mut account = Account::create(input, Uuid::new_v4()).unwrap();
        let update = UpdateAccount { parent_account: Some(account.id), ..Default::default() };
        assert!(account.update(update).is_err());
    }
}
