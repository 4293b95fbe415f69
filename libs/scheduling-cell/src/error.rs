// libs/scheduling-cell/src/error.rs
use thiserror::Error;

use crate::models::AppointmentStatus;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchedulingError {
    #[error("Referenced facility, day, slot or appointment not found")]
    NotFound,

    #[error("Slot has no remaining capacity")]
    CapacityExceeded,

    #[error("Slot is administratively blocked")]
    SlotBlocked,

    #[error("Invalid transition from {from} to {attempted}")]
    InvalidTransition {
        from: AppointmentStatus,
        attempted: AppointmentStatus,
    },

    #[error("Appointment is already in terminal state {0}")]
    AlreadyTerminal(AppointmentStatus),

    #[error("Modifications must arrive at least {lead_time_hours}h before the slot start")]
    ModificationWindowClosed { lead_time_hours: i64 },

    /// The versioned slot update lost a race. Retried internally a
    /// bounded number of times; callers only see this if the retry
    /// budget is exhausted without reaching a business outcome.
    #[error("Concurrent update conflict on slot record")]
    ConcurrentConflict,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
