use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::{audited, merge, merge_opt, Audit, Entity, Reference, Writable};
use crate::error::ApiError;
use crate::filter::SortDirection;
use crate::listing::{DateColumn, DateRange, ListSpec, ParamFilter, Populate};
use crate::workflow::attendance::{normalize_breaks, worked_minutes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    HalfDay,
    Absent,
    OnLeave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BreakEntry {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[validate(length(max = 200))]
    pub reason: Option<String>,
}

impl BreakEntry {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: Uuid,
    pub employee: Uuid,
    pub date: NaiveDate,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub breaks: Json<Vec<BreakEntry>>,
    pub work_minutes: Option<i64>,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub audit: Audit,
}

static LIST: ListSpec = ListSpec {
    search: &["notes"],
    filters: &[
        ParamFilter::uuid("employee", "employee"),
        ParamFilter::text("status", "status"),
    ],
    date_range: Some(DateRange { column: "date", kind: DateColumn::Date }),
    order: &[("date", SortDirection::Desc)],
    default_limit: None,
};

static POPULATE: [Populate; 1] = [Populate::field("employee", "users", &["name", "email", "department"])];

impl Entity for Attendance {
    const TABLE: &'static str = "attendance";
    const LABEL: &'static str = "Attendance record";
    const DUPLICATE_MESSAGE: &'static str = "Attendance already recorded for this employee on this date";

    audited!();

    fn list_spec() -> &'static ListSpec {
        &LIST
    }

    fn populate() -> &'static [Populate] {
        &POPULATE
    }
}

impl Attendance {
    /// Fresh day record opened by a check-in
    pub fn check_in(employee: Uuid, at: DateTime<Utc>, status: AttendanceStatus, notes: Option<String>, actor: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            employee,
            date: at.date_naive(),
            check_in: Some(at),
            check_out: None,
            breaks: Json(Vec::new()),
            work_minutes: None,
            status,
            notes,
            audit: Audit::new(Some(actor)),
        }
    }

    fn recompute(&mut self) -> Result<(), ApiError> {
        normalize_breaks(&mut self.breaks.0)?;
        if let (Some(start), Some(end)) = (self.check_in, self.check_out) {
            if end < start {
                return Err(ApiError::invalid_field("Check-out must be after check-in"));
            }
        }
        self.work_minutes = match (self.check_in, self.check_out) {
            (Some(start), Some(end)) => Some(worked_minutes(start, end, &self.breaks.0)),
            _ => None,
        };
        Ok(())
    }
}

/// Manual record entered by a manager
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateAttendance {
    pub employee: Uuid,
    pub date: NaiveDate,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    #[validate]
    #[serde(default)]
    pub breaks: Vec<BreakEntry>,
    pub status: Option<AttendanceStatus>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateAttendance {
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub breaks: Option<Vec<BreakEntry>>,
    pub status: Option<AttendanceStatus>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Body of `POST /checkin`; `employee` defaults to the caller
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CheckInRequest {
    pub employee: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BreakRequest {
    pub employee: Option<Uuid>,
    #[validate(length(max = 200))]
    pub reason: Option<String>,
}

impl Writable for Attendance {
    type Create = CreateAttendance;
    type Update = UpdateAttendance;

    fn create(input: CreateAttendance, actor: Uuid) -> Result<Self, ApiError> {
        let mut record = Self {
            id: Uuid::new_v4(),
            employee: input.employee,
            date: input.date,
            check_in: input.check_in,
            check_out: input.check_out,
            breaks: Json(input.breaks),
            work_minutes: None,
            status: input.status.unwrap_or(AttendanceStatus::Present),
            notes: input.notes,
            audit: Audit::new(Some(actor)),
        };
        record.recompute()?;
        Ok(record)
    }

    fn update(&mut self, input: UpdateAttendance) -> Result<(), ApiError> {
        merge_opt(&mut self.check_in, input.check_in);
        merge_opt(&mut self.check_out, input.check_out);
        if let Some(breaks) = input.breaks {
            self.breaks = Json(breaks);
        }
        merge(&mut self.status, input.status);
        merge_opt(&mut self.notes, input.notes);
        self.recompute()
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::new("users", "Employee", self.employee)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn manual_breaks_get_their_duration() {
        let input: CreateAttendance = serde_json::from_value(json!({
            "employee": Uuid::new_v4(),
            "date": "2024-05-02",
            "checkIn": "2024-05-02T08:00:00Z",
            "checkOut": "2024-05-02T17:00:00Z",
            "breaks": [{ "start": "2024-05-02T12:00:00Z", "end": "2024-05-02T12:45:00Z", "reason": "lunch" }]
        }))
        .unwrap();
        let record = Attendance::create(input, Uuid::new_v4()).unwrap();
        assert_eq!(record.breaks.0[0].duration_minutes, Some(45));
        assert_eq!(record.work_minutes, Some(9 * 60 - 45));
        assert_eq!(record.status, AttendanceStatus::Present);
    }

    #[test]
    fn check_out_before_check_in_is_rejected() {
        let input: CreateAttendance = serde_json::from_value(json!({
            "employee": Uuid::new_v4(),
            "date": "2024-05-02",
            "checkIn": "2024-05-02T10:00:00Z",
            "checkOut": "2024-05-02T09:00:00Z"
        }))
        .unwrap();
        assert!(Attendance::create(input, Uuid::new_v4()).is_err());
    }

    #[test]
    fn check_in_opens_todays_record() {
        let at = Utc.with_ymd_and_hms(2024, 5, 2, 8, 55, 0).unwrap();
        let employee = Uuid::new_v4();
        let record = Attendance::check_in(employee, at, AttendanceStatus::Present, None, employee);
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert!(record.check_out.is_none());
        assert_eq!(record.to_api_value()["breaks"], json!([]));
    }
}
