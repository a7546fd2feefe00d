use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::{audited, merge, merge_opt, Audit, Entity, Reference, Settings, Writable};
use crate::error::ApiError;
use crate::filter::SortDirection;
use crate::listing::{DateColumn, DateRange, ListSpec, ParamFilter, Populate};
use crate::workflow::ticket::transition;
use crate::workflow::{TicketPriority, TicketStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketComment {
    pub author: Uuid,
    pub message: String,
    #[serde(default)]
    pub internal: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    pub id: Uuid,
    /// Assigned by the database on insert
    pub ticket_number: Option<String>,
    pub subject: String,
    pub description: String,
    pub customer: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub category: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub satisfaction_rating: Option<i32>,
    pub satisfaction_comment: Option<String>,
    pub comments: Json<Vec<TicketComment>>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub audit: Audit,
}

static LIST: ListSpec = ListSpec {
    search: &["ticket_number", "subject", "description"],
    filters: &[
        ParamFilter::text("status", "status"),
        ParamFilter::text("priority", "priority"),
        ParamFilter::text("category", "category"),
        ParamFilter::uuid("customer", "customer"),
        ParamFilter::uuid("assignedTo", "assigned_to"),
    ],
    date_range: Some(DateRange { column: "created_at", kind: DateColumn::Timestamp }),
    order: &[("created_at", SortDirection::Desc)],
    default_limit: None,
};

static POPULATE: [Populate; 4] = [
    Populate::field("customer", "customers", &["customerCode", "firstName", "lastName", "email"]),
    Populate::field("assignedTo", "users", &["name", "email"]),
    Populate::field("createdBy", "users", &["name", "email"]),
    Populate::nested("comments", "author", "users", &["name"]),
];

impl Entity for SupportTicket {
    const TABLE: &'static str = "support_tickets";
    const LABEL: &'static str = "Ticket";
    const DUPLICATE_MESSAGE: &'static str = "Ticket with this number already exists";

    audited!();

    fn list_spec() -> &'static ListSpec {
        &LIST
    }

    fn populate() -> &'static [Populate] {
        &POPULATE
    }
}

impl SupportTicket {
    pub fn assign(&mut self, user: Uuid, now: DateTime<Utc>) {
        self.assigned_to = Some(user);
        self.assigned_at = Some(now);
    }

    /// Stamps `resolvedAt`/`closedAt`; reopening clears both.
    pub fn change_status(&mut self, to: TicketStatus, now: DateTime<Utc>) -> Result<(), ApiError> {
        self.status = transition(self.status, to)?;
        match to {
            TicketStatus::Resolved => self.resolved_at = Some(now),
            TicketStatus::Closed => {
                self.closed_at = Some(now);
                if self.resolved_at.is_none() {
                    self.resolved_at = Some(now);
                }
            }
            TicketStatus::Open => {
                self.resolved_at = None;
                self.closed_at = None;
            }
            TicketStatus::InProgress | TicketStatus::Waiting => {}
        }
        Ok(())
    }

    pub fn rate(&mut self, rating: RateTicket) {
        self.satisfaction_rating = Some(rating.rating);
        self.satisfaction_comment = rating.comment;
    }

    pub fn add_comment(&mut self, author: Uuid, comment: AddComment, now: DateTime<Utc>) {
        self.comments.0.push(TicketComment {
            author,
            message: comment.message,
            internal: comment.internal.unwrap_or(false),
            created_at: now,
        });
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_settled() && self.due_date.map_or(false, |due| due < now)
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTicket {
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000))]
    pub description: String,
    pub customer: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub priority: Option<TicketPriority>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTicket {
    #[validate(length(min = 1, max = 200))]
    pub subject: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub description: Option<String>,
    pub customer: Option<Uuid>,
    pub priority: Option<TicketPriority>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssignTicket {
    pub assigned_to: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangeTicketStatus {
    pub status: TicketStatus,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RateTicket {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddComment {
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
    pub internal: Option<bool>,
}

impl Writable for SupportTicket {
    type Create = CreateTicket;
    type Update = UpdateTicket;

    const USES_SETTINGS: bool = true;

    fn create(input: CreateTicket, actor: Uuid) -> Result<Self, ApiError> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            ticket_number: None,
            subject: input.subject,
            description: input.description,
            customer: input.customer,
            assigned_at: input.assigned_to.map(|_| now),
            assigned_to: input.assigned_to,
            priority: input.priority.unwrap_or(TicketPriority::Medium),
            status: TicketStatus::Open,
            category: input.category,
            due_date: input.due_date,
            resolved_at: None,
            closed_at: None,
            satisfaction_rating: None,
            satisfaction_comment: None,
            comments: Json(Vec::new()),
            audit: Audit::new(Some(actor)),
        })
    }

    fn update(&mut self, input: UpdateTicket) -> Result<(), ApiError> {
        merge(&mut self.subject, input.subject);
        merge(&mut self.description, input.description);
        merge_opt(&mut self.customer, input.customer);
        merge(&mut self.priority, input.priority);
        merge_opt(&mut self.category, input.category);
        merge_opt(&mut self.due_date, input.due_date);
        Ok(())
    }

    /// Due date defaults to creation time plus the priority's SLA.
    fn apply_settings(&mut self, settings: &Settings) {
        if self.due_date.is_none() {
            let hours = settings.sla_hours.0.for_priority(self.priority);
            self.due_date = Some(self.audit.created_at + Duration::hours(hours));
        }
    }

    fn references(&self) -> Vec<Reference> {
        Reference::optional("customers", "Customer", self.customer)
            .into_iter()
            .chain(Reference::optional("users", "Assigned user", self.assigned_to))
            .collect()
    }
}
