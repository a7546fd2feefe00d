use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Status shared by machines, tools and workstations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ResourceStatus {
    Available,
    Booked,
    Maintenance,
    OutOfService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    Book,
    Release,
    StartMaintenance,
    CompleteMaintenance,
}

const TRANSITIONS: &[(ResourceStatus, ResourceAction, ResourceStatus)] = &[
    (ResourceStatus::Available, ResourceAction::Book, ResourceStatus::Booked),
    (ResourceStatus::Booked, ResourceAction::Release, ResourceStatus::Available),
    (ResourceStatus::Available, ResourceAction::StartMaintenance, ResourceStatus::Maintenance),
    (ResourceStatus::OutOfService, ResourceAction::StartMaintenance, ResourceStatus::Maintenance),
    (ResourceStatus::Maintenance, ResourceAction::CompleteMaintenance, ResourceStatus::Available),
];

/// `label` is the resource kind used in the rejection message, e.g. "Machine".
pub fn transition(label: &str, from: ResourceStatus, action: ResourceAction) -> Result<ResourceStatus, ApiError> {
    TRANSITIONS
        .iter()
        .find(|(state, a, _)| *state == from && *a == action)
        .map(|(_, _, to)| *to)
        .ok_or_else(|| {
            let message = match action {
                ResourceAction::Book => format!("{} is not available for booking", label),
                ResourceAction::Release => format!("{} is not currently booked", label),
                ResourceAction::StartMaintenance => format!("{} cannot start maintenance while {}", label, from.describe()),
                ResourceAction::CompleteMaintenance => format!("{} is not under maintenance", label),
            };
            ApiError::invalid_state(message)
        })
}

impl ResourceStatus {
    fn describe(&self) -> &'static str {
        match self {
            ResourceStatus::Available => "available",
            ResourceStatus::Booked => "booked",
            ResourceStatus::Maintenance => "under maintenance",
            ResourceStatus::OutOfService => "out of service",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ResourceAction::*;
    use ResourceStatus::*;

    #[test]
    fn book_and_release_cycle() {
        assert_eq!(transition("Machine", Available, Book).unwrap(), Booked);
        assert_eq!(transition("Machine", Booked, Release).unwrap(), Available);
    }

    #[test]
    fn double_booking_is_rejected() {
        let err = transition("Tool", Booked, Book).unwrap_err();
        assert_eq!(err.message(), "Tool is not available for booking");
        let err = transition("Tool", Maintenance, Book).unwrap_err();
        assert_eq!(err.message(), "Tool is not available for booking");
    }

    #[test]
    fn releasing_an_unbooked_resource_is_rejected() {
        let err = transition("Workstation", Available, Release).unwrap_err();
        assert_eq!(err.message(), "Workstation is not currently booked");
    }

    #[test]
    fn maintenance_cycle() {
        assert_eq!(transition("Machine", OutOfService, StartMaintenance).unwrap(), Maintenance);
        assert_eq!(transition("Machine", Maintenance, CompleteMaintenance).unwrap(), Available);
        assert!(transition("Machine", Booked, StartMaintenance).is_err());
        assert!(transition("Machine", Available, CompleteMaintenance).is_err());
    }
}
