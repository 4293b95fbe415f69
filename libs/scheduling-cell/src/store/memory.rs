// libs/scheduling-cell/src/store/memory.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::models::{Appointment, ServiceType, SlotCalendarDay, WaitlistEntry};
use crate::store::{AppointmentStore, CalendarStore, Versioned, WaitlistStore};

/// In-memory calendar store. The write lock makes each get/put pair's
/// CAS check indivisible; the version token carries the optimistic
/// concurrency across the caller's read-check-write cycle.
#[derive(Default)]
pub struct InMemoryCalendarStore {
    days: Arc<RwLock<HashMap<(String, NaiveDate), (SlotCalendarDay, u64)>>>,
}

impl InMemoryCalendarStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CalendarStore for InMemoryCalendarStore {
    async fn get_day(
        &self,
        facility_id: &str,
        date: NaiveDate,
    ) -> Result<Option<Versioned<SlotCalendarDay>>, SchedulingError> {
        let days = self.days.read().await;
        Ok(days
            .get(&(facility_id.to_string(), date))
            .map(|(day, version)| Versioned {
                record: day.clone(),
                version: *version,
            }))
    }

    async fn insert_day(&self, day: SlotCalendarDay) -> Result<(), SchedulingError> {
        let mut days = self.days.write().await;
        let key = (day.facility_id.clone(), day.date);
        if days.contains_key(&key) {
            return Err(SchedulingError::ValidationError(format!(
                "calendar day already exists for {} on {}",
                key.0, key.1
            )));
        }
        days.insert(key, (day, 0));
        Ok(())
    }

    async fn put_day(
        &self,
        day: SlotCalendarDay,
        expected_version: u64,
    ) -> Result<(), SchedulingError> {
        let mut days = self.days.write().await;
        let key = (day.facility_id.clone(), day.date);
        match days.get_mut(&key) {
            Some((stored, version)) => {
                if *version != expected_version {
                    return Err(SchedulingError::ConcurrentConflict);
                }
                *stored = day;
                *version += 1;
                Ok(())
            }
            None => Err(SchedulingError::NotFound),
        }
    }
}

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: Arc<RwLock<HashMap<Uuid, Appointment>>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn insert(&self, appointment: Appointment) -> Result<(), SchedulingError> {
        let mut appointments = self.appointments.write().await;
        if appointments.contains_key(&appointment.id) {
            return Err(SchedulingError::Storage(format!(
                "appointment {} already exists",
                appointment.id
            )));
        }
        appointments.insert(appointment.id, appointment);
        Ok(())
    }

    async fn update(&self, appointment: Appointment) -> Result<(), SchedulingError> {
        let mut appointments = self.appointments.write().await;
        if !appointments.contains_key(&appointment.id) {
            return Err(SchedulingError::NotFound);
        }
        appointments.insert(appointment.id, appointment);
        Ok(())
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.date, a.slot_start_time));
        Ok(found)
    }
}

#[derive(Default)]
pub struct InMemoryWaitlistStore {
    // Vec keeps insertion order as the tie-break for equal enqueued_at.
    entries: Arc<RwLock<Vec<WaitlistEntry>>>,
}

impl InMemoryWaitlistStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WaitlistStore for InMemoryWaitlistStore {
    async fn insert(&self, entry: WaitlistEntry) -> Result<(), SchedulingError> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<bool, SchedulingError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        Ok(entries.len() < before)
    }

    async fn matching_entries(
        &self,
        facility_id: &str,
        service_type: ServiceType,
        date: NaiveDate,
    ) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let entries = self.entries.read().await;
        let mut matching: Vec<WaitlistEntry> = entries
            .iter()
            .filter(|e| {
                e.facility_id == facility_id
                    && e.service_type == service_type
                    && e.acceptable_dates.contains(&date)
            })
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.enqueued_at);
        Ok(matching)
    }
}
