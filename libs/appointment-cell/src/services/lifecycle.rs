// libs/appointment-cell/src/services/lifecycle.rs
use shared_models::AppointmentStatus;

use crate::models::BookingOutcome;

/// What a booking attempt does to an appointment in a given status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub outcome: BookingOutcome,
    /// New status to write, `None` when the appointment is left untouched.
    pub next_status: Option<AppointmentStatus>,
    /// Whether the booking doctor gets linked to the appointment.
    pub links_doctor: bool,
}

impl Transition {
    fn reject(outcome: BookingOutcome) -> Self {
        Self {
            outcome,
            next_status: None,
            links_doctor: false,
        }
    }

    fn advance(outcome: BookingOutcome, next_status: AppointmentStatus) -> Self {
        Self {
            outcome,
            next_status: Some(next_status),
            links_doctor: true,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// The booking state machine. Driven only by the status read under the
/// appointment lock.
pub fn decide_transition(current: &AppointmentStatus) -> Transition {
    match current {
        AppointmentStatus::Available => {
            Transition::advance(BookingOutcome::Claimed, AppointmentStatus::Active)
        }
        AppointmentStatus::Active => {
            Transition::advance(BookingOutcome::Waitlisted, AppointmentStatus::Waitlisted)
        }
        AppointmentStatus::Past => Transition::reject(BookingOutcome::RejectedPast),
        AppointmentStatus::Waitlisted => {
            Transition::reject(BookingOutcome::RejectedAlreadyWaitlisted)
        }
        AppointmentStatus::Unrecognized(raw) => {
            Transition::reject(BookingOutcome::InvalidStatus(raw.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_is_claimed() {
        let transition = decide_transition(&AppointmentStatus::Available);
        assert_eq!(transition.outcome, BookingOutcome::Claimed);
        assert_eq!(transition.next_status, Some(AppointmentStatus::Active));
        assert!(transition.links_doctor);
        assert!(transition.is_success());
    }

    #[test]
    fn active_is_waitlisted() {
        let transition = decide_transition(&AppointmentStatus::Active);
        assert_eq!(transition.outcome, BookingOutcome::Waitlisted);
        assert_eq!(transition.next_status, Some(AppointmentStatus::Waitlisted));
        assert!(transition.links_doctor);
    }

    #[test]
    fn terminal_statuses_are_rejected_without_writes() {
        for (status, outcome) in [
            (AppointmentStatus::Past, BookingOutcome::RejectedPast),
            (AppointmentStatus::Waitlisted, BookingOutcome::RejectedAlreadyWaitlisted),
        ] {
            let transition = decide_transition(&status);
            assert_eq!(transition.outcome, outcome);
            assert_eq!(transition.next_status, None);
            assert!(!transition.links_doctor);
            assert!(!transition.is_success());
        }
    }

    #[test]
    fn unknown_status_is_reported() {
        let transition = decide_transition(&AppointmentStatus::from("CX"));
        assert_eq!(
            transition.outcome,
            BookingOutcome::InvalidStatus("CX".to_string())
        );
        assert_eq!(transition.next_status, None);
        assert_eq!(transition.outcome.status_line(), "Status: CX is incorrect");
    }
}
