// libs/scheduling-cell/src/services/lifecycle.rs
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::error::SchedulingError;
use crate::models::AppointmentStatus;

/// The appointment state machine. Pure rules; callers supply the
/// current time so gates stay deterministic.
pub struct AppointmentLifecycleService {
    checkin_grace_minutes: i64,
}

impl AppointmentLifecycleService {
    pub fn new(checkin_grace_minutes: i64) -> Self {
        Self {
            checkin_grace_minutes,
        }
    }

    /// All legal next statuses from a given status. Happy path is
    /// scheduled -> confirmed -> checked_in -> in_progress -> completed;
    /// cancelled and no_show are terminal from any non-terminal state.
    pub fn valid_transitions(&self, current: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::CheckedIn,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::CheckedIn => vec![
                AppointmentStatus::InProgress,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::InProgress => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            // Terminal states admit nothing.
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::NoShow => vec![],
        }
    }

    /// Validate a requested transition. Illegal requests surface the
    /// attempted and current state; they are never silently coerced.
    pub fn validate_transition(
        &self,
        current: AppointmentStatus,
        attempted: AppointmentStatus,
    ) -> Result<(), SchedulingError> {
        debug!("Validating transition {} -> {}", current, attempted);

        if current.is_terminal() {
            warn!("Transition attempted out of terminal state {}", current);
            return Err(SchedulingError::AlreadyTerminal(current));
        }

        if !self.valid_transitions(current).contains(&attempted) {
            warn!("Invalid transition attempted: {} -> {}", current, attempted);
            return Err(SchedulingError::InvalidTransition {
                from: current,
                attempted,
            });
        }

        Ok(())
    }

    /// Check-in requires the slot to be (nearly) open: no earlier than
    /// the grace window before the slot start.
    pub fn validate_check_in_time(
        &self,
        slot_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulingError> {
        let earliest = slot_start - Duration::minutes(self.checkin_grace_minutes);
        if now < earliest {
            return Err(SchedulingError::ValidationError(format!(
                "check-in opens at {} ({}min before slot start)",
                earliest, self.checkin_grace_minutes
            )));
        }
        Ok(())
    }

    /// No-show may only be recorded once the slot has fully passed.
    pub fn validate_no_show_time(
        &self,
        slot_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulingError> {
        if now <= slot_end {
            return Err(SchedulingError::ValidationError(format!(
                "no-show cannot be recorded before the slot ends at {}",
                slot_end
            )));
        }
        Ok(())
    }

    /// Cancellation always carries a reason for the audit record.
    pub fn validate_cancellation_reason(&self, reason: &str) -> Result<(), SchedulingError> {
        if reason.trim().is_empty() {
            return Err(SchedulingError::ValidationError(
                "cancellation requires a reason".to_string(),
            ));
        }
        Ok(())
    }

    /// Reschedule is a side-transition allowed from any non-terminal
    /// state; the appointment re-enters scheduled on the new slot.
    pub fn validate_reschedule(&self, current: AppointmentStatus) -> Result<(), SchedulingError> {
        if current.is_terminal() {
            return Err(SchedulingError::AlreadyTerminal(current));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    fn service() -> AppointmentLifecycleService {
        AppointmentLifecycleService::new(15)
    }

    const ALL: [AppointmentStatus; 7] = [
        Scheduled, Confirmed, CheckedIn, InProgress, Completed, Cancelled, NoShow,
    ];

    #[test]
    fn happy_path_is_strictly_sequential() {
        let svc = service();
        assert!(svc.validate_transition(Scheduled, Confirmed).is_ok());
        assert!(svc.validate_transition(Confirmed, CheckedIn).is_ok());
        assert!(svc.validate_transition(CheckedIn, InProgress).is_ok());
        assert!(svc.validate_transition(InProgress, Completed).is_ok());

        // Skipping a step is illegal.
        assert!(svc.validate_transition(Scheduled, CheckedIn).is_err());
        assert!(svc.validate_transition(Confirmed, Completed).is_err());
        assert!(svc.validate_transition(CheckedIn, Completed).is_err());
    }

    #[test]
    fn terminal_states_admit_no_transitions() {
        let svc = service();
        for terminal in [Completed, Cancelled, NoShow] {
            for target in ALL {
                assert_eq!(
                    svc.validate_transition(terminal, target),
                    Err(SchedulingError::AlreadyTerminal(terminal)),
                    "{} -> {} must be rejected",
                    terminal,
                    target
                );
            }
        }
    }

    #[test]
    fn every_state_event_pair_is_documented_or_rejected() {
        let svc = service();
        for from in ALL {
            let documented = svc.valid_transitions(from);
            for to in ALL {
                let outcome = svc.validate_transition(from, to);
                if documented.contains(&to) {
                    assert!(outcome.is_ok(), "{} -> {} should be legal", from, to);
                } else {
                    assert!(outcome.is_err(), "{} -> {} should be rejected", from, to);
                }
            }
        }
    }

    #[test]
    fn cancel_is_reachable_from_every_non_terminal_state() {
        let svc = service();
        for from in [Scheduled, Confirmed, CheckedIn, InProgress] {
            assert!(svc.validate_transition(from, Cancelled).is_ok());
        }
    }

    #[test]
    fn check_in_respects_grace_window() {
        let svc = service();
        let start = Utc::now();
        assert!(svc
            .validate_check_in_time(start, start - Duration::minutes(10))
            .is_ok());
        assert!(svc
            .validate_check_in_time(start, start - Duration::minutes(16))
            .is_err());
    }

    #[test]
    fn no_show_only_after_slot_end() {
        let svc = service();
        let end = Utc::now();
        assert!(svc.validate_no_show_time(end, end + Duration::minutes(1)).is_ok());
        assert!(svc.validate_no_show_time(end, end - Duration::minutes(1)).is_err());
        assert!(svc.validate_no_show_time(end, end).is_err());
    }
}
