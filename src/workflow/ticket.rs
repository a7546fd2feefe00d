use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Waiting,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TicketStatus {
    /// Resolved and closed tickets no longer count against their due date.
    pub fn is_settled(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Waiting => "waiting",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    fn allowed_targets(&self) -> &'static [TicketStatus] {
        use TicketStatus::*;
        match self {
            Open => &[InProgress, Waiting, Resolved, Closed],
            InProgress => &[Waiting, Resolved, Closed],
            Waiting => &[InProgress, Resolved, Closed],
            Resolved => &[Closed, Open],
            Closed => &[Open],
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn transition(from: TicketStatus, to: TicketStatus) -> Result<TicketStatus, ApiError> {
    if from.allowed_targets().contains(&to) {
        Ok(to)
    } else {
        Err(ApiError::invalid_state(format!(
            "Cannot change ticket status from {} to {}",
            from, to
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TicketStatus::*;

    #[test]
    fn working_states_can_be_resolved_or_closed() {
        for from in [Open, InProgress, Waiting] {
            assert!(transition(from, Resolved).is_ok());
            assert!(transition(from, Closed).is_ok());
        }
    }

    #[test]
    fn settled_tickets_can_only_reopen_or_close() {
        assert_eq!(transition(Resolved, Open).unwrap(), Open);
        assert_eq!(transition(Closed, Open).unwrap(), Open);
        let err = transition(Closed, InProgress).unwrap_err();
        assert_eq!(err.message(), "Cannot change ticket status from closed to in_progress");
    }

    #[test]
    fn same_status_is_not_a_transition() {
        assert!(transition(Open, Open).is_err());
        assert!(transition(InProgress, Open).is_err());
    }
}
