// libs/scheduling-cell/src/router.rs
use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::handlers;
use crate::state::SchedulingState;

pub fn scheduling_routes(state: SchedulingState) -> Router {
    Router::new()
        // Slot calendar
        .route("/days", post(handlers::create_day))
        .route(
            "/days/{facility_id}/{date}/slots",
            get(handlers::find_available_slots),
        )
        .route(
            "/days/{facility_id}/{date}/slots/{start_time}/block",
            post(handlers::block_slot),
        )
        .route(
            "/days/{facility_id}/{date}/slots/{start_time}/unblock",
            post(handlers::unblock_slot),
        )
        .route(
            "/days/{facility_id}/{date}/holiday",
            post(handlers::mark_holiday).delete(handlers::unmark_holiday),
        )
        // Appointments
        .route("/appointments", post(handlers::book_appointment))
        .route("/appointments/{appointment_id}", get(handlers::get_appointment))
        .route(
            "/appointments/{appointment_id}/cancel",
            post(handlers::cancel_appointment),
        )
        .route(
            "/appointments/{appointment_id}/reschedule",
            patch(handlers::reschedule_appointment),
        )
        .route(
            "/appointments/{appointment_id}/confirm",
            post(handlers::confirm_appointment),
        )
        .route(
            "/appointments/{appointment_id}/check-in",
            post(handlers::check_in_appointment),
        )
        .route(
            "/appointments/{appointment_id}/start",
            post(handlers::start_appointment),
        )
        .route(
            "/appointments/{appointment_id}/complete",
            post(handlers::complete_appointment),
        )
        .route(
            "/appointments/{appointment_id}/no-show",
            post(handlers::no_show_appointment),
        )
        .route(
            "/patients/{patient_id}/appointments",
            get(handlers::get_patient_appointments),
        )
        // Waitlist
        .route("/waitlist", post(handlers::join_waitlist))
        .route("/waitlist/{request_id}", delete(handlers::withdraw_waitlist))
        .with_state(state)
}
