// libs/scheduling-cell/src/handlers.rs
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::AppError;

use crate::error::SchedulingError;
use crate::models::{
    BlockSlotRequest, BookAppointmentRequest, CancelAppointmentRequest, CreateDayRequest,
    JoinWaitlistRequest, MarkHolidayRequest, RescheduleAppointmentRequest, ServiceType,
};
use crate::state::SchedulingState;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub service_type: Option<ServiceType>,
}

// ==============================================================================
// CALENDAR HANDLERS
// ==============================================================================

pub async fn create_day(
    State(state): State<SchedulingState>,
    Json(request): Json<CreateDayRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let day = state
        .calendar
        .create_day(&request.facility_id, request.date, request.slots)
        .await
        .map_err(map_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "day": day
        })),
    ))
}

pub async fn find_available_slots(
    State(state): State<SchedulingState>,
    Path((facility_id, date)): Path<(String, NaiveDate)>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state
        .calendar
        .list_available(&facility_id, date, query.service_type)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "facility_id": facility_id,
        "date": date,
        "slots": slots
    })))
}

pub async fn block_slot(
    State(state): State<SchedulingState>,
    Path((facility_id, date, start_time)): Path<(String, NaiveDate, String)>,
    Json(request): Json<BlockSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let start_time = parse_start_time(&start_time)?;
    state
        .calendar
        .block(&facility_id, date, start_time, &request.reason)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true })))
}

pub async fn unblock_slot(
    State(state): State<SchedulingState>,
    Path((facility_id, date, start_time)): Path<(String, NaiveDate, String)>,
) -> Result<Json<Value>, AppError> {
    let start_time = parse_start_time(&start_time)?;
    state
        .calendar
        .unblock(&facility_id, date, start_time)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true })))
}

pub async fn mark_holiday(
    State(state): State<SchedulingState>,
    Path((facility_id, date)): Path<(String, NaiveDate)>,
    Json(request): Json<MarkHolidayRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .calendar
        .mark_holiday(&facility_id, date, request.name)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true })))
}

pub async fn unmark_holiday(
    State(state): State<SchedulingState>,
    Path((facility_id, date)): Path<(String, NaiveDate)>,
) -> Result<Json<Value>, AppError> {
    state
        .calendar
        .unmark_holiday(&facility_id, date)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

pub async fn book_appointment(
    State(state): State<SchedulingState>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = state.coordinator.book(request).await.map_err(map_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment
        })),
    ))
}

pub async fn get_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .coordinator
        .get(appointment_id)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "appointment": appointment })))
}

pub async fn get_patient_appointments(
    State(state): State<SchedulingState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointments = state
        .coordinator
        .list_for_patient(patient_id)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "count": appointments.len()
    })))
}

/// Cancellation frees a capacity unit; the waitlist gets first refusal
/// on it before the response returns.
pub async fn cancel_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = state
        .coordinator
        .cancel(appointment_id, request)
        .await
        .map_err(map_error)?;

    let converted = state
        .waitlist
        .notify_capacity_freed(
            &outcome.freed.facility_id,
            outcome.freed.date,
            outcome.freed.service_type,
        )
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "waitlist_converted": converted
    })))
}

pub async fn reschedule_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .coordinator
        .reschedule(appointment_id, request)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

pub async fn confirm_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .coordinator
        .confirm(appointment_id)
        .await
        .map_err(map_error)?;
    Ok(Json(json!({ "success": true, "appointment": appointment })))
}

pub async fn check_in_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .coordinator
        .check_in(appointment_id)
        .await
        .map_err(map_error)?;
    Ok(Json(json!({ "success": true, "appointment": appointment })))
}

pub async fn start_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .coordinator
        .mark_in_progress(appointment_id)
        .await
        .map_err(map_error)?;
    Ok(Json(json!({ "success": true, "appointment": appointment })))
}

pub async fn complete_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .coordinator
        .complete(appointment_id)
        .await
        .map_err(map_error)?;
    Ok(Json(json!({ "success": true, "appointment": appointment })))
}

pub async fn no_show_appointment(
    State(state): State<SchedulingState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .coordinator
        .mark_no_show(appointment_id)
        .await
        .map_err(map_error)?;
    Ok(Json(json!({ "success": true, "appointment": appointment })))
}

// ==============================================================================
// WAITLIST HANDLERS
// ==============================================================================

pub async fn join_waitlist(
    State(state): State<SchedulingState>,
    Json(request): Json<JoinWaitlistRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let entry = state.waitlist.enqueue(request).await.map_err(map_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "entry": entry
        })),
    ))
}

pub async fn withdraw_waitlist(
    State(state): State<SchedulingState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let removed = state
        .waitlist
        .withdraw(request_id)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "success": true, "removed": removed })))
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

fn map_error(e: SchedulingError) -> AppError {
    match &e {
        SchedulingError::NotFound => AppError::NotFound(e.to_string()),
        SchedulingError::CapacityExceeded | SchedulingError::SlotBlocked => {
            AppError::Conflict(e.to_string())
        }
        SchedulingError::InvalidTransition { .. } | SchedulingError::AlreadyTerminal(_) => {
            AppError::Unprocessable(e.to_string())
        }
        SchedulingError::ModificationWindowClosed { .. } => AppError::BadRequest(e.to_string()),
        SchedulingError::ValidationError(_) => AppError::ValidationError(e.to_string()),
        SchedulingError::ConcurrentConflict | SchedulingError::Storage(_) => {
            AppError::Internal(e.to_string())
        }
    }
}

/// Slot start times travel in paths as `HH:MM`, matching the slot
/// template format.
fn parse_start_time(raw: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| AppError::BadRequest(format!("invalid slot start time {:?}", raw)))
}
