//! Bookable shop-floor resources: machines, tools and workstations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::{audited, merge, merge_opt, Audit, Entity, Writable};
use crate::error::ApiError;
use crate::filter::{Condition, SortDirection};
use crate::listing::{ListSpec, ParamFilter, Populate};
use crate::workflow::booking::transition;
use crate::workflow::{ResourceAction, ResourceStatus};

/// Booking and maintenance state shared by every resource kind
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub status: ResourceStatus,
    pub booked_by: Option<Uuid>,
    pub booked_at: Option<DateTime<Utc>>,
    pub booked_until: Option<DateTime<Utc>>,
    pub current_job: Option<String>,
    pub last_maintenance_date: Option<DateTime<Utc>>,
    pub next_maintenance_date: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn new(status: Option<ResourceStatus>, next_maintenance_date: Option<DateTime<Utc>>) -> Self {
        Self {
            status: status.unwrap_or(ResourceStatus::Available),
            booked_by: None,
            booked_at: None,
            booked_until: None,
            current_job: None,
            last_maintenance_date: None,
            next_maintenance_date,
        }
    }

    pub fn book(&mut self, label: &str, by: Uuid, request: BookRequest, now: DateTime<Utc>) -> Result<(), ApiError> {
        let next = transition(label, self.status, ResourceAction::Book)?;
        if request.booked_until <= now {
            return Err(ApiError::invalid_field("bookedUntil must be in the future"));
        }
        self.status = next;
        self.booked_by = Some(by);
        self.booked_at = Some(now);
        self.booked_until = Some(request.booked_until);
        self.current_job = request.current_job;
        Ok(())
    }

    pub fn release(&mut self, label: &str) -> Result<(), ApiError> {
        self.status = transition(label, self.status, ResourceAction::Release)?;
        self.clear_booking();
        Ok(())
    }

    pub fn start_maintenance(&mut self, label: &str) -> Result<(), ApiError> {
        self.status = transition(label, self.status, ResourceAction::StartMaintenance)?;
        Ok(())
    }

    pub fn complete_maintenance(
        &mut self,
        label: &str,
        request: CompleteMaintenance,
        now: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        if let Some(next) = request.next_maintenance_date {
            if next <= now {
                return Err(ApiError::invalid_field("nextMaintenanceDate must be in the future"));
            }
        }
        self.status = transition(label, self.status, ResourceAction::CompleteMaintenance)?;
        self.last_maintenance_date = Some(now);
        merge_opt(&mut self.next_maintenance_date, request.next_maintenance_date);
        Ok(())
    }

    /// Direct status edits only toggle between available and out of service.
    fn set_service_status(&mut self, label: &str, status: ResourceStatus) -> Result<(), ApiError> {
        if status == self.status {
            return Ok(());
        }
        let settable = matches!(status, ResourceStatus::Available | ResourceStatus::OutOfService);
        let idle = matches!(self.status, ResourceStatus::Available | ResourceStatus::OutOfService);
        if !settable || !idle {
            return Err(ApiError::invalid_state(format!(
                "{} status changes go through booking and maintenance actions",
                label
            )));
        }
        self.status = status;
        Ok(())
    }

    fn clear_booking(&mut self) {
        self.booked_by = None;
        self.booked_at = None;
        self.booked_until = None;
        self.current_job = None;
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BookRequest {
    pub booked_until: DateTime<Utc>,
    #[validate(length(max = 200))]
    pub current_job: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompleteMaintenance {
    pub next_maintenance_date: Option<DateTime<Utc>>,
}

/// Resources that expose the booking actions
pub trait Bookable: Writable {
    fn booking(&self) -> &Booking;
    fn booking_mut(&mut self) -> &mut Booking;
}

fn available(flag: bool) -> Condition {
    if flag {
        Condition::eq("status", "available")
    } else {
        Condition::neq("status", "available")
    }
}

static BOOKED_BY: [Populate; 1] = [Populate::field("bookedBy", "users", &["name", "email"])];

// Machines

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: Uuid,
    pub serial_number: String,
    pub name: String,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub machine_type: Option<String>,
    pub location: Option<String>,
    pub department: Option<String>,
    pub hourly_rate: Option<Decimal>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub booking: Booking,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub audit: Audit,
}

static MACHINE_LIST: ListSpec = ListSpec {
    search: &["name", "serial_number", "model", "manufacturer"],
    filters: &[
        ParamFilter::text("type", "type"),
        ParamFilter::text("status", "status"),
        ParamFilter::text("department", "department"),
        ParamFilter::text("location", "location"),
        ParamFilter::derived("available", available),
    ],
    date_range: None,
    order: &[("name", SortDirection::Asc)],
    default_limit: None,
};

impl Entity for Machine {
    const TABLE: &'static str = "machines";
    const LABEL: &'static str = "Machine";
    const DUPLICATE_MESSAGE: &'static str = "Machine with this serial number already exists";

    audited!();

    fn list_spec() -> &'static ListSpec {
        &MACHINE_LIST
    }

    fn populate() -> &'static [Populate] {
        &BOOKED_BY
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateMachine {
    #[validate(length(min = 1, max = 100))]
    pub serial_number: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 100))]
    pub model: Option<String>,
    #[validate(length(max = 100))]
    pub manufacturer: Option<String>,
    #[serde(rename = "type")]
    #[validate(length(max = 100))]
    pub machine_type: Option<String>,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    #[validate(custom = "super::non_negative")]
    pub hourly_rate: Option<Decimal>,
    pub status: Option<ResourceStatus>,
    pub next_maintenance_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateMachine {
    #[validate(length(min = 1, max = 100))]
    pub serial_number: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub model: Option<String>,
    #[validate(length(max = 100))]
    pub manufacturer: Option<String>,
    #[serde(rename = "type")]
    #[validate(length(max = 100))]
    pub machine_type: Option<String>,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    #[validate(custom = "super::non_negative")]
    pub hourly_rate: Option<Decimal>,
    pub status: Option<ResourceStatus>,
    pub next_maintenance_date: Option<DateTime<Utc>>,
}

impl Writable for Machine {
    type Create = CreateMachine;
    type Update = UpdateMachine;

    fn create(input: CreateMachine, actor: Uuid) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            serial_number: input.serial_number.trim().to_string(),
            name: input.name,
            model: input.model,
            manufacturer: input.manufacturer,
            machine_type: input.machine_type,
            location: input.location,
            department: input.department,
            hourly_rate: input.hourly_rate,
            booking: Booking::new(input.status, input.next_maintenance_date),
            audit: Audit::new(Some(actor)),
        })
    }

    fn update(&mut self, input: UpdateMachine) -> Result<(), ApiError> {
        if let Some(status) = input.status {
            self.booking.set_service_status(Self::LABEL, status)?;
        }
        merge(&mut self.serial_number, input.serial_number.map(|s| s.trim().to_string()));
        merge(&mut self.name, input.name);
        merge_opt(&mut self.model, input.model);
        merge_opt(&mut self.manufacturer, input.manufacturer);
        merge_opt(&mut self.machine_type, input.machine_type);
        merge_opt(&mut self.location, input.location);
        merge_opt(&mut self.department, input.department);
        merge_opt(&mut self.hourly_rate, input.hourly_rate);
        merge_opt(&mut self.booking.next_maintenance_date, input.next_maintenance_date);
        Ok(())
    }
}

impl Bookable for Machine {
    fn booking(&self) -> &Booking {
        &self.booking
    }

    fn booking_mut(&mut self) -> &mut Booking {
        &mut self.booking
    }
}

// Tools

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ToolCondition {
    New,
    Good,
    Fair,
    Poor,
    Damaged,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub id: Uuid,
    pub tool_number: String,
    pub name: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub location: Option<String>,
    pub condition: ToolCondition,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub booking: Booking,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub audit: Audit,
}

static TOOL_LIST: ListSpec = ListSpec {
    search: &["name", "tool_number", "brand"],
    filters: &[
        ParamFilter::text("category", "category"),
        ParamFilter::text("status", "status"),
        ParamFilter::text("location", "location"),
        ParamFilter::text("condition", "condition"),
        ParamFilter::derived("available", available),
    ],
    date_range: None,
    order: &[("name", SortDirection::Asc)],
    default_limit: None,
};

impl Entity for Tool {
    const TABLE: &'static str = "tools";
    const LABEL: &'static str = "Tool";
    const DUPLICATE_MESSAGE: &'static str = "Tool with this tool number already exists";

    audited!();

    fn list_spec() -> &'static ListSpec {
        &TOOL_LIST
    }

    fn populate() -> &'static [Populate] {
        &BOOKED_BY
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTool {
    #[validate(length(min = 1, max = 100))]
    pub tool_number: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    pub condition: Option<ToolCondition>,
    pub status: Option<ResourceStatus>,
    pub next_maintenance_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTool {
    #[validate(length(min = 1, max = 100))]
    pub tool_number: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    pub condition: Option<ToolCondition>,
    pub status: Option<ResourceStatus>,
    pub next_maintenance_date: Option<DateTime<Utc>>,
}

impl Writable for Tool {
    type Create = CreateTool;
    type Update = UpdateTool;

    fn create(input: CreateTool, actor: Uuid) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            tool_number: input.tool_number.trim().to_string(),
            name: input.name,
            category: input.category,
            brand: input.brand,
            location: input.location,
            condition: input.condition.unwrap_or(ToolCondition::Good),
            booking: Booking::new(input.status, input.next_maintenance_date),
            audit: Audit::new(Some(actor)),
        })
    }

    fn update(&mut self, input: UpdateTool) -> Result<(), ApiError> {
        if let Some(status) = input.status {
            self.booking.set_service_status(Self::LABEL, status)?;
        }
        merge(&mut self.tool_number, input.tool_number.map(|s| s.trim().to_string()));
        merge(&mut self.name, input.name);
        merge_opt(&mut self.category, input.category);
        merge_opt(&mut self.brand, input.brand);
        merge_opt(&mut self.location, input.location);
        merge(&mut self.condition, input.condition);
        merge_opt(&mut self.booking.next_maintenance_date, input.next_maintenance_date);
        Ok(())
    }
}

impl Bookable for Tool {
    fn booking(&self) -> &Booking {
        &self.booking
    }

    fn booking_mut(&mut self) -> &mut Booking {
        &mut self.booking
    }
}

// Workstations

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Workstation {
    pub id: Uuid,
    pub station_number: String,
    pub name: String,
    pub department: Option<String>,
    pub location: Option<String>,
    pub capacity: Option<i32>,
    pub equipment: Json<Vec<String>>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub booking: Booking,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub audit: Audit,
}

static WORKSTATION_LIST: ListSpec = ListSpec {
    search: &["name", "station_number"],
    filters: &[
        ParamFilter::text("department", "department"),
        ParamFilter::text("status", "status"),
        ParamFilter::text("location", "location"),
        ParamFilter::derived("available", available),
    ],
    date_range: None,
    order: &[("station_number", SortDirection::Asc)],
    default_limit: None,
};

impl Entity for Workstation {
    const TABLE: &'static str = "workstations";
    const LABEL: &'static str = "Workstation";
    const DUPLICATE_MESSAGE: &'static str = "Workstation with this station number already exists";

    audited!();

    fn list_spec() -> &'static ListSpec {
        &WORKSTATION_LIST
    }

    fn populate() -> &'static [Populate] {
        &BOOKED_BY
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateWorkstation {
    #[validate(length(min = 1, max = 50))]
    pub station_number: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    #[validate(range(min = 1))]
    pub capacity: Option<i32>,
    #[serde(default)]
    pub equipment: Vec<String>,
    pub status: Option<ResourceStatus>,
    pub next_maintenance_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateWorkstation {
    #[validate(length(min = 1, max = 50))]
    pub station_number: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    #[validate(range(min = 1))]
    pub capacity: Option<i32>,
    pub equipment: Option<Vec<String>>,
    pub status: Option<ResourceStatus>,
    pub next_maintenance_date: Option<DateTime<Utc>>,
}

impl Writable for Workstation {
    type Create = CreateWorkstation;
    type Update = UpdateWorkstation;

    fn create(input: CreateWorkstation, actor: Uuid) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            station_number: input.station_number.trim().to_string(),
            name: input.name,
            department: input.department,
            location: input.location,
            capacity: input.capacity,
            equipment: Json(input.equipment),
            booking: Booking::new(input.status, input.next_maintenance_date),
            audit: Audit::new(Some(actor)),
        })
    }

    fn update(&mut self, input: UpdateWorkstation) -> Result<(), ApiError> {
        if let Some(status) = input.status {
            self.booking.set_service_status(Self::LABEL, status)?;
        }
        merge(&mut self.station_number, input.station_number.map(|s| s.trim().to_string()));
        merge(&mut self.name, input.name);
        merge_opt(&mut self.department, input.department);
        merge_opt(&mut self.location, input.location);
        merge_opt(&mut self.capacity, input.capacity);
        merge(&mut self.equipment, input.equipment.map(Json));
        merge_opt(&mut self.booking.next_maintenance_date, input.next_maintenance_date);
        Ok(())
    }
}

impl Bookable for Workstation {
    fn booking(&self) -> &Booking {
        &self.booking
    }

    fn booking_mut(&mut self) -> &mut Booking {
        &mut self.booking
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn machine() -> Machine {
        let input: CreateMachine =
            serde_json::from_value(json!({ "serialNumber": "SN-1", "name": "Lathe" })).unwrap();
        Machine::create(input, Uuid::new_v4()).unwrap()
    }

    fn book_for(hours: i64) -> BookRequest {
        BookRequest {
            booked_until: Utc::now() + Duration::hours(hours),
            current_job: Some("JOB-7".into()),
        }
    }

    #[test]
    fn booking_stamps_and_release_clears() {
        let mut m = machine();
        let user = Uuid::new_v4();
        m.booking.book("Machine", user, book_for(2), Utc::now()).unwrap();
        assert_eq!(m.booking.status, ResourceStatus::Booked);
        assert_eq!(m.booking.booked_by, Some(user));

        let err = m.booking.book("Machine", user, book_for(2), Utc::now()).unwrap_err();
        assert_eq!(err.message(), "Machine is not available for booking");

        m.booking.release("Machine").unwrap();
        assert_eq!(m.booking.status, ResourceStatus::Available);
        assert!(m.booking.booked_by.is_none());
        assert!(m.booking.current_job.is_none());
    }

    #[test]
    fn booking_must_end_in_the_future() {
        let mut m = machine();
        assert!(m.booking.book("Machine", Uuid::new_v4(), book_for(-1), Utc::now()).is_err());
        assert_eq!(m.booking.status, ResourceStatus::Available);
    }

    #[test]
    fn completing_maintenance_stamps_dates() {
        let mut m = machine();
        m.booking.start_maintenance("Machine").unwrap();
        let next = Utc::now() + Duration::days(90);
        let now = Utc::now();
        m.booking
            .complete_maintenance("Machine", CompleteMaintenance { next_maintenance_date: Some(next) }, now)
            .unwrap();
        assert_eq!(m.booking.status, ResourceStatus::Available);
        assert_eq!(m.booking.last_maintenance_date, Some(now));
        assert_eq!(m.booking.next_maintenance_date, Some(next));
    }

    #[test]
    fn booked_resources_cannot_be_edited_out_of_service() {
        let mut m = machine();
        m.booking.book("Machine", Uuid::new_v4(), book_for(1), Utc::now()).unwrap();
        let update = UpdateMachine { status: Some(ResourceStatus::OutOfService), ..Default::default() };
        assert!(m.update(update).is_err());
    }

    #[test]
    fn flattened_wire_shape() {
        let wire = machine().to_api_value();
        assert_eq!(wire["serialNumber"], "SN-1");
        assert_eq!(wire["status"], "available");
        assert!(wire["bookedBy"].is_null());
        assert!(wire.get("booking").is_none());
    }
}
