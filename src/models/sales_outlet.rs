use serde::{Deserialize, Serialize};
use sqlx::types::Json;
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
pub enum OutletType {
    Store,
    Kiosk,
    Online,
    Franchise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum OutletStatus {
    Open,
    Closed,
    Renovating,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SalesOutlet {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub outlet_type: OutletType,
    pub status: OutletStatus,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub phone: Option<String>,
    pub manager: Option<Uuid>,
    pub staff: Json<Vec<Uuid>>,
    pub opening_hours: Option<String>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub audit: Audit,
}

static LIST: ListSpec = ListSpec {
    search: &["name", "code", "city", "region"],
    filters: &[
        ParamFilter::text("type", "type"),
        ParamFilter::text("status", "status"),
        ParamFilter::text("city", "city"),
        ParamFilter::text("region", "region"),
    ],
    date_range: None,
    order: &[("name", SortDirection::Asc)],
    default_limit: Some(50),
};

static POPULATE: [Populate; 2] = [
    Populate::field("manager", "users", &["name", "email"]),
    Populate::ids("staff", "users", &["name", "email", "position"]),
];

impl Entity for SalesOutlet {
    const TABLE: &'static str = "sales_outlets";
    const LABEL: &'static str = "Sales outlet";
    const DUPLICATE_MESSAGE: &'static str = "Sales outlet with this code already exists";

    audited!();

    fn list_spec() -> &'static ListSpec {
        &LIST
    }

    fn populate() -> &'static [Populate] {
        &POPULATE
    }
}

impl SalesOutlet {
    /// Returns false when the user was already on the roster.
    pub fn add_staff(&mut self, user: Uuid) -> bool {
        if self.staff.0.contains(&user) {
            return false;
        }
        self.staff.0.push(user);
        true
    }

    pub fn remove_staff(&mut self, user: Uuid) -> bool {
        let before = self.staff.0.len();
        self.staff.0.retain(|id| *id != user);
        self.staff.0.len() != before
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateSalesOutlet {
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(rename = "type")]
    pub outlet_type: OutletType,
    pub status: Option<OutletStatus>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub region: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub manager: Option<Uuid>,
    #[serde(default)]
    pub staff: Vec<Uuid>,
    #[validate(length(max = 200))]
    pub opening_hours: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateSalesOutlet {
    #[validate(length(min = 1, max = 20))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub outlet_type: Option<OutletType>,
    pub status: Option<OutletStatus>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub region: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub manager: Option<Uuid>,
    pub staff: Option<Vec<Uuid>>,
    #[validate(length(max = 200))]
    pub opening_hours: Option<String>,
}

fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

impl Writable for SalesOutlet {
    type Create = CreateSalesOutlet;
    type Update = UpdateSalesOutlet;

    fn create(input: CreateSalesOutlet, actor: Uuid) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            code: input.code.trim().to_uppercase(),
            name: input.name,
            outlet_type: input.outlet_type,
            status: input.status.unwrap_or(OutletStatus::Open),
            address: input.address,
            city: input.city,
            region: input.region,
            phone: input.phone,
            manager: input.manager,
            staff: Json(dedup(input.staff)),
            opening_hours: input.opening_hours,
            audit: Audit::new(Some(actor)),
        })
    }

    fn update(&mut self, input: UpdateSalesOutlet) -> Result<(), ApiError> {
        merge(&mut self.code, input.code.map(|c| c.trim().to_uppercase()));
        merge(&mut self.name, input.name);
        merge(&mut self.outlet_type, input.outlet_type);
        merge(&mut self.status, input.status);
        merge_opt(&mut self.address, input.address);
        merge_opt(&mut self.city, input.city);
        merge_opt(&mut self.region, input.region);
        merge_opt(&mut self.phone, input.phone);
        merge_opt(&mut self.manager, input.manager);
        merge(&mut self.staff, input.staff.map(|s| Json(dedup(s))));
        merge_opt(&mut self.opening_hours, input.opening_hours);
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        Reference::optional("users", "Manager", self.manager)
            .into_iter()
            .chain(self.staff.0.iter().map(|id| Reference::new("users", "Staff member", *id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outlet() -> SalesOutlet {
        let input: CreateSalesOutlet =
            serde_json::from_value(json!({ "code": "nyc-1", "name": "Downtown", "type": "store" })).unwrap();
        SalesOutlet::create(input, Uuid::new_v4()).unwrap()
    }

    #[test]
    fn roster_has_no_duplicates() {
        let mut o = outlet();
        let u = Uuid::new_v4();
        assert!(o.add_staff(u));
        assert!(!o.add_staff(u));
        assert_eq!(o.staff.0, vec![u]);
        assert!(o.remove_staff(u));
        assert!(!o.remove_staff(u));
    }

    #[test]
    fn defaults_and_wire_shape() {
        let o = outlet();
        assert_eq!(o.code, "NYC-1");
        assert_eq!(o.status, OutletStatus::Open);
        assert_eq!(o.to_api_value()["type"], "store");
        assert_eq!(o.to_api_value()["staff"], json!([]));
    }

    #[test]
    fn staff_ids_are_deduplicated_on_write() {
        let u = Uuid::new_v4();
        let input: CreateSalesOutlet = serde_json::from_value(
            json!({ "code": "x", "name": "X", "type": "kiosk", "staff": [u, u] }),
        )
        .unwrap();
        let o = SalesOutlet::create(input, Uuid::new_v4()).unwrap();
        assert_eq!(o.staff.0.len(), 1);
        assert_eq!(o.references().len(), 1);
    }
}
