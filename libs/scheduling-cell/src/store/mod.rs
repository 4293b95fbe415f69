// libs/scheduling-cell/src/store/mod.rs
//
// Persistence seams for the scheduling core. The calendar store is
// versioned: every read carries a version token and every write is a
// compare-and-set against it, so reserve/release can be a single
// atomic check-and-increment rather than a read-modify-write save.
// Appointments and waitlist entries are owned by one coordinating
// operation at a time and need only plain single-record updates.

pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::models::{Appointment, ServiceType, SlotCalendarDay, WaitlistEntry};

/// A record paired with the version token its read observed.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub record: T,
    pub version: u64,
}

#[async_trait]
pub trait CalendarStore: Send + Sync {
    async fn get_day(
        &self,
        facility_id: &str,
        date: NaiveDate,
    ) -> Result<Option<Versioned<SlotCalendarDay>>, SchedulingError>;

    /// Creates the facility-day record; fails if one already exists
    /// for the (facility, date) key.
    async fn insert_day(&self, day: SlotCalendarDay) -> Result<(), SchedulingError>;

    /// Compare-and-set write. Fails with `ConcurrentConflict` when the
    /// stored version no longer matches `expected_version`.
    async fn put_day(
        &self,
        day: SlotCalendarDay,
        expected_version: u64,
    ) -> Result<(), SchedulingError>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError>;
    async fn insert(&self, appointment: Appointment) -> Result<(), SchedulingError>;
    async fn update(&self, appointment: Appointment) -> Result<(), SchedulingError>;
    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, SchedulingError>;
}

#[async_trait]
pub trait WaitlistStore: Send + Sync {
    async fn insert(&self, entry: WaitlistEntry) -> Result<(), SchedulingError>;

    /// Removes the entry. Returns false when it was already gone,
    /// making withdraw idempotent.
    async fn remove(&self, id: Uuid) -> Result<bool, SchedulingError>;

    /// Entries for the facility/service whose acceptable dates include
    /// `date`, in FIFO order by enqueued_at.
    async fn matching_entries(
        &self,
        facility_id: &str,
        service_type: ServiceType,
        date: NaiveDate,
    ) -> Result<Vec<WaitlistEntry>, SchedulingError>;
}
