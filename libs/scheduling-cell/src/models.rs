// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::SchedulingError;

// ==============================================================================
// SLOT CALENDAR MODELS
// ==============================================================================

/// One bookable capacity unit inside a facility-day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: u32,
    pub booked: u32,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub service_type: ServiceType,
    pub price: Option<f64>,
}

impl TimeSlot {
    /// Remaining capacity. A blocked slot never offers capacity,
    /// whatever its booked count.
    pub fn available(&self) -> u32 {
        if self.is_blocked {
            0
        } else {
            self.capacity.saturating_sub(self.booked)
        }
    }

    /// Guard for the core invariant `0 <= booked <= capacity`. Called
    /// at every mutation boundary, independent of the storage layer.
    pub fn check_invariant(&self) -> Result<(), SchedulingError> {
        if self.booked > self.capacity {
            return Err(SchedulingError::Storage(format!(
                "slot {} booked {} exceeds capacity {}",
                self.start_time, self.booked, self.capacity
            )));
        }
        Ok(())
    }
}

/// All bookable capacity for one facility on one calendar day.
/// Past days are never deleted; they remain as an audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotCalendarDay {
    pub facility_id: String,
    pub date: NaiveDate,
    pub slots: Vec<TimeSlot>,
    pub is_holiday: bool,
    pub holiday_name: Option<String>,
}

impl SlotCalendarDay {
    pub fn slot(&self, start_time: NaiveTime) -> Option<&TimeSlot> {
        self.slots.iter().find(|s| s.start_time == start_time)
    }

    pub fn slot_mut(&mut self, start_time: NaiveTime) -> Option<&mut TimeSlot> {
        self.slots.iter_mut().find(|s| s.start_time == start_time)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Regular,
    Urgent,
    HomeCollection,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceType::Regular => write!(f, "regular"),
            ServiceType::Urgent => write!(f, "urgent"),
            ServiceType::HomeCollection => write!(f, "home_collection"),
        }
    }
}

/// Input shape for creating a facility-day; produced by the external
/// schedule-template collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSpec {
    pub start_time: String,
    pub end_time: String,
    pub capacity: u32,
    pub service_type: ServiceType,
    pub price: Option<f64>,
}

/// Snapshot row returned by availability listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub service_type: ServiceType,
    pub available: u32,
    pub price: Option<f64>,
}

// ==============================================================================
// APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub facility_id: String,
    pub date: NaiveDate,
    pub slot_start_time: NaiveTime,
    pub slot_end_time: NaiveTime,
    pub service_type: ServiceType,
    pub status: AppointmentStatus,
    pub priority: AppointmentPriority,
    pub notes: Option<String>,
    pub cancellation: Option<CancellationRecord>,
    pub reschedule_history: Vec<RescheduleRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Instant the occupied slot opens, on the appointment's date.
    pub fn slot_start_instant(&self) -> DateTime<Utc> {
        self.date.and_time(self.slot_start_time).and_utc()
    }

    pub fn slot_end_instant(&self) -> DateTime<Utc> {
        self.date.and_time(self.slot_end_time).and_utc()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    CheckedIn,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::CheckedIn => write!(f, "checked_in"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentPriority {
    Routine,
    Urgent,
    Stat,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Patient,
    Operator,
    System,
}

impl CancelledBy {
    /// Operator-initiated cancellations bypass the modification
    /// window; automated sweeps act with operator authority.
    pub fn bypasses_modification_window(&self) -> bool {
        matches!(self, CancelledBy::Operator | CancelledBy::System)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationRecord {
    pub reason: String,
    pub cancelled_by: CancelledBy,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRecord {
    pub from_date: NaiveDate,
    pub from_start_time: NaiveTime,
    pub to_date: NaiveDate,
    pub to_start_time: NaiveTime,
    pub rescheduled_by: Uuid,
    pub rescheduled_at: DateTime<Utc>,
}

// ==============================================================================
// WAITLIST MODELS
// ==============================================================================

/// A deferred booking request, served FIFO by enqueued_at when
/// capacity frees for a matching (facility, date, service).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub facility_id: String,
    pub service_type: ServiceType,
    pub acceptable_dates: Vec<NaiveDate>,
    pub priority: AppointmentPriority,
    pub enqueued_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDayRequest {
    pub facility_id: String,
    pub date: NaiveDate,
    pub slots: Vec<SlotSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub facility_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub priority: AppointmentPriority,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
    pub cancelled_by: CancelledBy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: NaiveDate,
    pub new_start_time: NaiveTime,
    pub rescheduled_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinWaitlistRequest {
    pub patient_id: Uuid,
    pub facility_id: String,
    pub service_type: ServiceType,
    pub acceptable_dates: Vec<NaiveDate>,
    pub priority: Option<AppointmentPriority>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSlotRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkHolidayRequest {
    pub name: Option<String>,
}
