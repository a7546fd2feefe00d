use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::{audited, merge, merge_opt, Audit, Entity, Writable};
use crate::error::ApiError;
use crate::filter::SortDirection;
use crate::listing::{ListSpec, ParamFilter};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TemplateTask {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = 0))]
    pub estimated_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub default_price: Decimal,
    pub estimated_duration_minutes: Option<i64>,
    pub tasks: Json<Vec<TemplateTask>>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub audit: Audit,
}

static LIST: ListSpec = ListSpec {
    search: &["name", "description", "category"],
    filters: &[ParamFilter::text("category", "category")],
    date_range: None,
    order: &[("name", SortDirection::Asc)],
    default_limit: None,
};

impl Entity for ServiceTemplate {
    const TABLE: &'static str = "service_templates";
    const LABEL: &'static str = "Service template";
    const DUPLICATE_MESSAGE: &'static str = "Service template with this name already exists";

    audited!();

    fn list_spec() -> &'static ListSpec {
        &LIST
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateServiceTemplate {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(custom = "super::non_negative")]
    pub default_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub estimated_duration_minutes: Option<i64>,
    #[validate]
    #[serde(default)]
    pub tasks: Vec<TemplateTask>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateServiceTemplate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(custom = "super::non_negative")]
    pub default_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub estimated_duration_minutes: Option<i64>,
    pub tasks: Option<Vec<TemplateTask>>,
}

impl Writable for ServiceTemplate {
    type Create = CreateServiceTemplate;
    type Update = UpdateServiceTemplate;

    fn create(input: CreateServiceTemplate, actor: Uuid) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            description: input.description,
            category: input.category,
            default_price: input.default_price.unwrap_or(Decimal::ZERO),
            estimated_duration_minutes: input.estimated_duration_minutes,
            tasks: Json(input.tasks),
            audit: Audit::new(Some(actor)),
        })
    }

    fn update(&mut self, input: UpdateServiceTemplate) -> Result<(), ApiError> {
        if let Some(tasks) = &input.tasks {
            for task in tasks {
                task.validate()?;
            }
        }
        merge(&mut self.name, input.name.map(|n| n.trim().to_string()));
        merge_opt(&mut self.description, input.description);
        merge_opt(&mut self.category, input.category);
        merge(&mut self.default_price, input.default_price);
        merge_opt(&mut self.estimated_duration_minutes, input.estimated_duration_minutes);
        merge(&mut self.tasks, input.tasks.map(Json));
        Ok(())
    }
}
