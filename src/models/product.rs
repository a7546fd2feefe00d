use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::{audited, merge, merge_opt, Audit, Entity, Reference, Writable};
use crate::error::ApiError;
use crate::filter::{Condition, FilterOp, SortDirection};
use crate::listing::{ListSpec, ParamFilter, Populate};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub barcode: Option<String>,
    pub unit: String,
    pub unit_price: Decimal,
    pub cost_price: Decimal,
    pub current_stock: i64,
    pub min_stock: i64,
    pub supplier: Option<Uuid>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub audit: Audit,
}

fn low_stock(flag: bool) -> Condition {
    let low = Condition::columns("current_stock", FilterOp::Lte, "min_stock");
    if flag {
        low
    } else {
        Condition::Not(Box::new(low))
    }
}

fn out_of_stock(flag: bool) -> Condition {
    if flag {
        Condition::field("current_stock", FilterOp::Lte, 0i64)
    } else {
        Condition::field("current_stock", FilterOp::Gt, 0i64)
    }
}

static LIST: ListSpec = ListSpec {
    search: &["name", "sku", "description", "barcode", "brand"],
    filters: &[
        ParamFilter::text("category", "category"),
        ParamFilter::text("brand", "brand"),
        ParamFilter::uuid("supplier", "supplier"),
        ParamFilter::derived("lowStock", low_stock),
        ParamFilter::derived("outOfStock", out_of_stock),
    ],
    date_range: None,
    order: &[("name", SortDirection::Asc)],
    default_limit: None,
};

static POPULATE: [Populate; 1] = [Populate::field("supplier", "suppliers", &["code", "name", "contactPerson"])];

impl Entity for Product {
    const TABLE: &'static str = "products";
    const LABEL: &'static str = "Product";
    const DUPLICATE_MESSAGE: &'static str = "Product with this SKU already exists";

    audited!();

    fn list_spec() -> &'static ListSpec {
        &LIST
    }

    fn populate() -> &'static [Populate] {
        &POPULATE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockOperation {
    Add,
    Subtract,
    Set,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StockAdjustment {
    #[validate(range(min = 0))]
    pub quantity: i64,
    pub operation: StockOperation,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

impl Product {
    pub fn adjust_stock(&mut self, adjustment: &StockAdjustment) -> Result<(), ApiError> {
        let next = match adjustment.operation {
            StockOperation::Add => self.current_stock.checked_add(adjustment.quantity),
            StockOperation::Subtract => self.current_stock.checked_sub(adjustment.quantity),
            StockOperation::Set => Some(adjustment.quantity),
        };
        match next {
            Some(stock) if stock >= 0 => {
                self.current_stock = stock;
                Ok(())
            }
            _ => Err(ApiError::invalid_state("Insufficient stock")),
        }
    }

    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.min_stock
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateProduct {
    #[validate(length(min = 1, max = 50))]
    pub sku: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(length(max = 50))]
    pub barcode: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    #[validate(custom = "super::non_negative")]
    pub unit_price: Decimal,
    #[validate(custom = "super::non_negative")]
    pub cost_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub current_stock: Option<i64>,
    #[validate(range(min = 0))]
    pub min_stock: Option<i64>,
    pub supplier: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 50))]
    pub sku: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(length(max = 50))]
    pub barcode: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    #[validate(custom = "super::non_negative")]
    pub unit_price: Option<Decimal>,
    #[validate(custom = "super::non_negative")]
    pub cost_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub min_stock: Option<i64>,
    pub supplier: Option<Uuid>,
}

impl Writable for Product {
    type Create = CreateProduct;
    type Update = UpdateProduct;

    fn create(input: CreateProduct, actor: Uuid) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            sku: input.sku.trim().to_uppercase(),
            name: input.name,
            description: input.description,
            category: input.category,
            brand: input.brand,
            barcode: input.barcode,
            unit: input.unit.unwrap_or_else(|| "pcs".to_string()),
            unit_price: input.unit_price,
            cost_price: input.cost_price.unwrap_or(Decimal::ZERO),
            current_stock: input.current_stock.unwrap_or(0),
            min_stock: input.min_stock.unwrap_or(0),
            supplier: input.supplier,
            audit: Audit::new(Some(actor)),
        })
    }

    /// Stock moves only through `adjust_stock`.
    fn update(&mut self, input: UpdateProduct) -> Result<(), ApiError> {
        merge(&mut self.sku, input.sku.map(|s| s.trim().to_uppercase()));
        merge(&mut self.name, input.name);
        merge_opt(&mut self.description, input.description);
        merge_opt(&mut self.category, input.category);
        merge_opt(&mut self.brand, input.brand);
        merge_opt(&mut self.barcode, input.barcode);
        merge(&mut self.unit, input.unit);
        merge(&mut self.unit_price, input.unit_price);
        merge(&mut self.cost_price, input.cost_price);
        merge(&mut self.min_stock, input.min_stock);
        merge_opt(&mut self.supplier, input.supplier);
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        Reference::optional("suppliers", "Supplier", self.supplier)
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(stock: i64, min: i64) -> Product {
        let input: CreateProduct = serde_json::from_value(json!({
            "sku": "bolt-10",
            "name": "Bolt",
            "unitPrice": 0.25,
            "currentStock": stock,
            "minStock": min
        }))
        .unwrap();
        Product::create(input, Uuid::new_v4()).unwrap()
    }

    fn adjust(quantity: i64, operation: &str) -> StockAdjustment {
        serde_json::from_value(json!({ "quantity": quantity, "operation": operation })).unwrap()
    }

    #[test]
    fn stock_operations() {
        let mut p = product(10, 2);
        p.adjust_stock(&adjust(5, "add")).unwrap();
        assert_eq!(p.current_stock, 15);
        p.adjust_stock(&adjust(15, "subtract")).unwrap();
        assert_eq!(p.current_stock, 0);
        p.adjust_stock(&adjust(7, "set")).unwrap();
        assert_eq!(p.current_stock, 7);
    }

    #[test]
    fn stock_never_goes_negative() {
        let mut p = product(3, 0);
        let err = p.adjust_stock(&adjust(4, "subtract")).unwrap_err();
        assert_eq!(err.message(), "Insufficient stock");
        assert_eq!(p.current_stock, 3);
    }

    #[test]
    fn low_stock_compares_columns() {
        assert!(product(2, 2).is_low_stock());
        assert!(!product(3, 2).is_low_stock());
        assert_eq!(
            low_stock(true),
            Condition::columns("current_stock", FilterOp::Lte, "min_stock")
        );
    }

    #[test]
    fn negative_price_fails_validation() {
        let input: CreateProduct =
            serde_json::from_value(json!({ "sku": "x", "name": "X", "unitPrice": -1 })).unwrap();
        assert!(input.validate().is_err());
    }
}
