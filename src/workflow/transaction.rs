use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum TransactionStatus {
    Draft,
    Approved,
    Posted,
    Reconciled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionAction {
    Approve,
    Post,
    Reconcile,
}

/// What deleting a transaction in a given status does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    Hard,
    Soft,
}

impl TransactionStatus {
    pub fn is_editable(&self) -> bool {
        matches!(self, TransactionStatus::Draft)
    }

    /// Posted and reconciled transactions have moved account balances.
    pub fn is_posted(&self) -> bool {
        matches!(self, TransactionStatus::Posted | TransactionStatus::Reconciled)
    }

    pub fn delete_policy(&self) -> Result<DeletePolicy, ApiError> {
        match self {
            TransactionStatus::Draft => Ok(DeletePolicy::Hard),
            TransactionStatus::Approved => Ok(DeletePolicy::Soft),
            TransactionStatus::Posted | TransactionStatus::Reconciled => {
                Err(ApiError::invalid_state("Posted transactions cannot be deleted"))
            }
        }
    }
}

impl TransactionAction {
    fn required_status(&self) -> TransactionStatus {
        match self {
            TransactionAction::Approve => TransactionStatus::Draft,
            TransactionAction::Post => TransactionStatus::Approved,
            TransactionAction::Reconcile => TransactionStatus::Posted,
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            TransactionAction::Approve => "approved",
            TransactionAction::Post => "posted",
            TransactionAction::Reconcile => "reconciled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Draft => "draft",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Posted => "posted",
            TransactionStatus::Reconciled => "reconciled",
        };
        f.write_str(s)
    }
}

const TRANSITIONS: &[(TransactionStatus, TransactionAction, TransactionStatus)] = &[
    (TransactionStatus::Draft, TransactionAction::Approve, TransactionStatus::Approved),
    (TransactionStatus::Approved, TransactionAction::Post, TransactionStatus::Posted),
    (TransactionStatus::Posted, TransactionAction::Reconcile, TransactionStatus::Reconciled),
];

pub fn transition(from: TransactionStatus, action: TransactionAction) -> Result<TransactionStatus, ApiError> {
    TRANSITIONS
        .iter()
        .find(|(state, a, _)| *state == from && *a == action)
        .map(|(_, _, to)| *to)
        .ok_or_else(|| {
            ApiError::invalid_state(format!(
                "Only {} transactions can be {}",
                action.required_status(),
                action.past_tense()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransactionAction::*;
    use TransactionStatus::*;

    #[test]
    fn happy_path_runs_draft_to_reconciled() {
        let s = transition(Draft, Approve).unwrap();
        let s = transition(s, Post).unwrap();
        assert_eq!(transition(s, Reconcile).unwrap(), Reconciled);
    }

    #[test]
    fn out_of_order_actions_are_rejected_with_message() {
        let err = transition(Approved, Approve).unwrap_err();
        assert_eq!(err.message(), "Only draft transactions can be approved");
        let err = transition(Draft, Post).unwrap_err();
        assert_eq!(err.message(), "Only approved transactions can be posted");
        let err = transition(Approved, Reconcile).unwrap_err();
        assert_eq!(err.message(), "Only posted transactions can be reconciled");
        assert!(transition(Reconciled, Reconcile).is_err());
    }

    #[test]
    fn delete_depends_on_status() {
        assert_eq!(Draft.delete_policy().unwrap(), DeletePolicy::Hard);
        assert_eq!(Approved.delete_policy().unwrap(), DeletePolicy::Soft);
        assert_eq!(
            Posted.delete_policy().unwrap_err().message(),
            "Posted transactions cannot be deleted"
        );
        assert!(Reconciled.delete_policy().is_err());
    }

    #[test]
    fn only_drafts_are_editable() {
        assert!(Draft.is_editable());
        assert!(!Approved.is_editable());
        assert!(Reconciled.is_posted());
    }
}
