use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{merge, merge_opt};
use crate::workflow::TicketPriority;

/// Primary key of the only settings row
pub const SETTINGS_ID: i32 = 1;

/// Ticket resolution targets in hours, by priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SlaHours {
    #[validate(range(min = 1))]
    pub low: i64,
    #[validate(range(min = 1))]
    pub medium: i64,
    #[validate(range(min = 1))]
    pub high: i64,
    #[validate(range(min = 1))]
    pub urgent: i64,
}

impl SlaHours {
    pub fn for_priority(&self, priority: TicketPriority) -> i64 {
        match priority {
            TicketPriority::Low => self.low,
            TicketPriority::Medium => self.medium,
            TicketPriority::High => self.high,
            TicketPriority::Urgent => self.urgent,
        }
    }
}

impl Default for SlaHours {
    fn default() -> Self {
        Self {
            low: 72,
            medium: 48,
            high: 24,
            urgent: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(skip_serializing)]
    pub id: i32,
    pub company_name: String,
    pub company_email: Option<String>,
    pub company_phone: Option<String>,
    pub company_address: Option<String>,
    pub company_logo_url: Option<String>,
    pub company_logo_filename: Option<String>,
    pub currency: String,
    pub timezone: String,
    /// `MM-DD`
    pub fiscal_year_start: String,
    /// `HH:MM`
    pub work_start_time: String,
    pub late_grace_minutes: i64,
    pub sla_hours: Json<SlaHours>,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl Settings {
    pub fn defaults() -> Self {
        Self {
            id: SETTINGS_ID,
            company_name: "My Company".to_string(),
            company_email: None,
            company_phone: None,
            company_address: None,
            company_logo_url: None,
            company_logo_filename: None,
            currency: "USD".to_string(),
            timezone: "UTC".to_string(),
            fiscal_year_start: "01-01".to_string(),
            work_start_time: "09:00".to_string(),
            late_grace_minutes: 15,
            sla_hours: Json(SlaHours::default()),
            updated_by: None,
            updated_at: Utc::now(),
        }
    }

    pub fn work_start(&self) -> NaiveTime {
        NaiveTime::parse_from_str(&self.work_start_time, "%H:%M")
            .unwrap_or_else(|_| NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN))
    }

    pub fn apply(&mut self, input: UpdateSettings, actor: Uuid) {
        merge(&mut self.company_name, input.company_name);
        merge_opt(&mut self.company_email, input.company_email);
        merge_opt(&mut self.company_phone, input.company_phone);
        merge_opt(&mut self.company_address, input.company_address);
        merge(&mut self.currency, input.currency.map(|c| c.to_uppercase()));
        merge(&mut self.timezone, input.timezone);
        merge(&mut self.fiscal_year_start, input.fiscal_year_start);
        merge(&mut self.work_start_time, input.work_start_time);
        merge(&mut self.late_grace_minutes, input.late_grace_minutes);
        merge(&mut self.sla_hours, input.sla_hours.map(Json));
        self.updated_by = Some(actor);
        self.updated_at = Utc::now();
    }

    pub fn set_logo(&mut self, url: String, filename: String, actor: Uuid) -> Option<String> {
        let previous = self.company_logo_filename.replace(filename);
        self.company_logo_url = Some(url);
        self.updated_by = Some(actor);
        self.updated_at = Utc::now();
        previous
    }
}

fn clock_time(value: &str) -> Result<(), ValidationError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map(|_| ())
        .map_err(|_| ValidationError::new("time"))
}

fn month_day(value: &str) -> Result<(), ValidationError> {
    let valid = value.len() == 5
        && chrono::NaiveDate::parse_from_str(&format!("2000-{}", value), "%Y-%m-%d").is_ok();
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("month_day"))
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateSettings {
    #[validate(length(min = 1, max = 200))]
    pub company_name: Option<String>,
    #[validate(email)]
    pub company_email: Option<String>,
    #[validate(length(max = 30))]
    pub company_phone: Option<String>,
    #[validate(length(max = 500))]
    pub company_address: Option<String>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub timezone: Option<String>,
    #[validate(custom = "month_day")]
    pub fiscal_year_start: Option<String>,
    #[validate(custom = "clock_time")]
    pub work_start_time: Option<String>,
    #[validate(range(min = 0, max = 240))]
    pub late_grace_minutes: Option<i64>,
    #[validate]
    pub sla_hours: Option<SlaHours>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::defaults();
        assert_eq!(s.work_start(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(s.sla_hours.0.for_priority(TicketPriority::Urgent), 4);
        let wire = serde_json::to_value(&s).unwrap();
        assert!(wire.get("id").is_none());
        assert_eq!(wire["slaHours"]["medium"], 48);
    }

    #[test]
    fn update_validates_formats() {
        let bad: UpdateSettings = serde_json::from_value(json!({ "workStartTime": "9am" })).unwrap();
        assert!(bad.validate().is_err());
        let bad: UpdateSettings = serde_json::from_value(json!({ "fiscalYearStart": "13-01" })).unwrap();
        assert!(bad.validate().is_err());
        let bad: UpdateSettings = serde_json::from_value(json!({ "slaHours": { "low": 0, "medium": 1, "high": 1, "urgent": 1 } })).unwrap();
        assert!(bad.validate().is_err());
        let good: UpdateSettings =
            serde_json::from_value(json!({ "workStartTime": "08:30", "fiscalYearStart": "04-01" })).unwrap();
        assert!(good.validate().is_ok());
    }

    #[test]
    fn apply_merges_and_stamps() {
        let mut s = Settings::defaults();
        let actor = Uuid::new_v4();
        let input: UpdateSettings =
            serde_json::from_value(json!({ "companyName": "Acme", "currency": "eur" })).unwrap();
        s.apply(input, actor);
        assert_eq!(s.company_name, "Acme");
        assert_eq!(s.currency, "EUR");
        assert_eq!(s.timezone, "UTC");
        assert_eq!(s.updated_by, Some(actor));
    }

    #[test]
    fn replacing_logo_returns_previous_file() {
        let mut s = Settings::defaults();
        let actor = Uuid::new_v4();
        assert_eq!(s.set_logo("/uploads/logos/a.png".into(), "a.png".into(), actor), None);
        assert_eq!(
            s.set_logo("/uploads/logos/b.png".into(), "b.png".into(), actor),
            Some("a.png".to_string())
        );
        assert_eq!(s.company_logo_url.as_deref(), Some("/uploads/logos/b.png"));
    }
}
