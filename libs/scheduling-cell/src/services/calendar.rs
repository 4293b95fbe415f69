// libs/scheduling-cell/src/services/calendar.rs
use chrono::{NaiveDate, NaiveTime};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SchedulingError;
use crate::models::{ServiceType, SlotAvailability, SlotCalendarDay, SlotSpec, TimeSlot};
use crate::store::CalendarStore;

pub const HOLIDAY_BLOCK_REASON: &str = "Holiday";

/// Authoritative record of capacity for a facility-day. All capacity
/// reads and writes go through this service; reserve and release are
/// compare-and-set loops against the versioned day record, never a
/// read-modify-write save.
pub struct SlotCalendarService {
    store: Arc<dyn CalendarStore>,
    max_retries: u32,
}

impl SlotCalendarService {
    pub fn new(store: Arc<dyn CalendarStore>, max_retries: u32) -> Self {
        Self { store, max_retries }
    }

    /// Create the slot calendar for one facility-day from template
    /// output. Malformed slots are rejected, not repaired.
    pub async fn create_day(
        &self,
        facility_id: &str,
        date: NaiveDate,
        specs: Vec<SlotSpec>,
    ) -> Result<SlotCalendarDay, SchedulingError> {
        if facility_id.trim().is_empty() {
            return Err(SchedulingError::ValidationError(
                "facility_id must not be empty".to_string(),
            ));
        }

        let mut slots = Vec::with_capacity(specs.len());
        let mut seen_starts = HashSet::new();

        for spec in specs {
            let start_time = parse_slot_time(&spec.start_time)?;
            let end_time = parse_slot_time(&spec.end_time)?;

            if end_time <= start_time {
                return Err(SchedulingError::ValidationError(format!(
                    "slot end {} must be after start {}",
                    spec.end_time, spec.start_time
                )));
            }
            if spec.capacity == 0 {
                return Err(SchedulingError::ValidationError(format!(
                    "slot {} must have capacity >= 1",
                    spec.start_time
                )));
            }
            if !seen_starts.insert(start_time) {
                return Err(SchedulingError::ValidationError(format!(
                    "duplicate slot start time {}",
                    spec.start_time
                )));
            }

            slots.push(TimeSlot {
                start_time,
                end_time,
                capacity: spec.capacity,
                booked: 0,
                is_blocked: false,
                block_reason: None,
                service_type: spec.service_type,
                price: spec.price,
            });
        }

        slots.sort_by_key(|s| s.start_time);

        let day = SlotCalendarDay {
            facility_id: facility_id.to_string(),
            date,
            slots,
            is_holiday: false,
            holiday_name: None,
        };

        self.store.insert_day(day.clone()).await?;
        info!(
            "Created calendar day for facility {} on {} with {} slots",
            facility_id,
            date,
            day.slots.len()
        );
        Ok(day)
    }

    pub async fn get_day(
        &self,
        facility_id: &str,
        date: NaiveDate,
    ) -> Result<SlotCalendarDay, SchedulingError> {
        Ok(self
            .store
            .get_day(facility_id, date)
            .await?
            .ok_or(SchedulingError::NotFound)?
            .record)
    }

    pub async fn get_slot(
        &self,
        facility_id: &str,
        date: NaiveDate,
        start_time: NaiveTime,
    ) -> Result<TimeSlot, SchedulingError> {
        let day = self.get_day(facility_id, date).await?;
        day.slot(start_time).cloned().ok_or(SchedulingError::NotFound)
    }

    /// Snapshot of bookable slots at call time. Excludes blocked slots
    /// and slots with no remaining capacity.
    pub async fn list_available(
        &self,
        facility_id: &str,
        date: NaiveDate,
        service_type: Option<ServiceType>,
    ) -> Result<Vec<SlotAvailability>, SchedulingError> {
        let day = self.get_day(facility_id, date).await?;
        Ok(day
            .slots
            .iter()
            .filter(|s| s.available() > 0)
            .filter(|s| service_type.map_or(true, |wanted| s.service_type == wanted))
            .map(|s| SlotAvailability {
                start_time: s.start_time,
                end_time: s.end_time,
                service_type: s.service_type,
                available: s.available(),
                price: s.price,
            })
            .collect())
    }

    /// Atomically claim `count` units of a slot's capacity. The whole
    /// reservation fails if fewer than `count` units remain. A lost
    /// compare-and-set is retried against a fresh read, bounded by the
    /// configured budget.
    pub async fn reserve(
        &self,
        facility_id: &str,
        date: NaiveDate,
        start_time: NaiveTime,
        count: u32,
    ) -> Result<(), SchedulingError> {
        for attempt in 1..=self.max_retries {
            let versioned = self
                .store
                .get_day(facility_id, date)
                .await?
                .ok_or(SchedulingError::NotFound)?;
            let mut day = versioned.record;
            let slot = day.slot_mut(start_time).ok_or(SchedulingError::NotFound)?;

            if slot.is_blocked {
                return Err(SchedulingError::SlotBlocked);
            }
            if slot.booked + count > slot.capacity {
                debug!(
                    "Reservation refused for {} {} {}: {} booked of {}",
                    facility_id, date, start_time, slot.booked, slot.capacity
                );
                return Err(SchedulingError::CapacityExceeded);
            }

            slot.booked += count;
            slot.check_invariant()?;

            match self.store.put_day(day, versioned.version).await {
                Ok(()) => {
                    debug!(
                        "Reserved {} unit(s) of {} {} {}",
                        count, facility_id, date, start_time
                    );
                    return Ok(());
                }
                Err(SchedulingError::ConcurrentConflict) => {
                    warn!(
                        "Reserve lost the slot-record race, retrying attempt {}/{}",
                        attempt, self.max_retries
                    );
                    tokio::time::sleep(tokio::time::Duration::from_millis(10 * attempt as u64))
                        .await;
                }
                Err(e) => return Err(e),
            }
        }

        // Retry budget exhausted: a fresh read decides whether a
        // business outcome holds before conceding the conflict.
        let day = self.get_day(facility_id, date).await?;
        let slot = day.slot(start_time).ok_or(SchedulingError::NotFound)?;
        if slot.is_blocked {
            return Err(SchedulingError::SlotBlocked);
        }
        if slot.booked + count > slot.capacity {
            return Err(SchedulingError::CapacityExceeded);
        }
        Err(SchedulingError::ConcurrentConflict)
    }

    /// Return `count` units of capacity. Floored at zero and never
    /// fails on a capacity check; cancellation must always succeed
    /// against the slot.
    pub async fn release(
        &self,
        facility_id: &str,
        date: NaiveDate,
        start_time: NaiveTime,
        count: u32,
    ) -> Result<(), SchedulingError> {
        for attempt in 1..=self.max_retries {
            let versioned = self
                .store
                .get_day(facility_id, date)
                .await?
                .ok_or(SchedulingError::NotFound)?;
            let mut day = versioned.record;
            let slot = day.slot_mut(start_time).ok_or(SchedulingError::NotFound)?;

            slot.booked = slot.booked.saturating_sub(count);
            slot.check_invariant()?;

            match self.store.put_day(day, versioned.version).await {
                Ok(()) => {
                    debug!(
                        "Released {} unit(s) of {} {} {}",
                        count, facility_id, date, start_time
                    );
                    return Ok(());
                }
                Err(SchedulingError::ConcurrentConflict) => {
                    warn!(
                        "Release lost the slot-record race, retrying attempt {}/{}",
                        attempt, self.max_retries
                    );
                    tokio::time::sleep(tokio::time::Duration::from_millis(10 * attempt as u64))
                        .await;
                }
                Err(e) => return Err(e),
            }
        }

        // Release has no capacity failure; only a vanished slot is a
        // business outcome.
        let day = self.get_day(facility_id, date).await?;
        day.slot(start_time).ok_or(SchedulingError::NotFound)?;
        Err(SchedulingError::ConcurrentConflict)
    }

    /// Administratively block a slot. Idempotent; already-booked
    /// appointments are not evicted.
    pub async fn block(
        &self,
        facility_id: &str,
        date: NaiveDate,
        start_time: NaiveTime,
        reason: &str,
    ) -> Result<(), SchedulingError> {
        self.mutate_day(facility_id, date, |day| {
            let slot = day.slot_mut(start_time).ok_or(SchedulingError::NotFound)?;
            slot.is_blocked = true;
            slot.block_reason = Some(reason.to_string());
            Ok(())
        })
        .await?;
        info!("Blocked slot {} {} {}: {}", facility_id, date, start_time, reason);
        Ok(())
    }

    pub async fn unblock(
        &self,
        facility_id: &str,
        date: NaiveDate,
        start_time: NaiveTime,
    ) -> Result<(), SchedulingError> {
        self.mutate_day(facility_id, date, |day| {
            let slot = day.slot_mut(start_time).ok_or(SchedulingError::NotFound)?;
            slot.is_blocked = false;
            slot.block_reason = None;
            Ok(())
        })
        .await?;
        info!("Unblocked slot {} {} {}", facility_id, date, start_time);
        Ok(())
    }

    /// Block every slot for the day with the holiday reason.
    pub async fn mark_holiday(
        &self,
        facility_id: &str,
        date: NaiveDate,
        name: Option<String>,
    ) -> Result<(), SchedulingError> {
        self.mutate_day(facility_id, date, |day| {
            day.is_holiday = true;
            day.holiday_name = name.clone();
            for slot in &mut day.slots {
                // Slots already blocked for their own reason keep it,
                // so unmarking the holiday does not unblock them.
                if !slot.is_blocked {
                    slot.is_blocked = true;
                    slot.block_reason = Some(HOLIDAY_BLOCK_REASON.to_string());
                }
            }
            Ok(())
        })
        .await?;
        info!("Marked {} on {} as holiday", facility_id, date);
        Ok(())
    }

    /// Unblocks only slots blocked for the holiday itself; slots
    /// individually blocked for other reasons stay blocked.
    pub async fn unmark_holiday(
        &self,
        facility_id: &str,
        date: NaiveDate,
    ) -> Result<(), SchedulingError> {
        self.mutate_day(facility_id, date, |day| {
            day.is_holiday = false;
            day.holiday_name = None;
            for slot in &mut day.slots {
                if slot.block_reason.as_deref() == Some(HOLIDAY_BLOCK_REASON) {
                    slot.is_blocked = false;
                    slot.block_reason = None;
                }
            }
            Ok(())
        })
        .await?;
        info!("Unmarked holiday for {} on {}", facility_id, date);
        Ok(())
    }

    /// CAS loop for administrative day mutations (block/holiday).
    async fn mutate_day<F>(
        &self,
        facility_id: &str,
        date: NaiveDate,
        mutate: F,
    ) -> Result<(), SchedulingError>
    where
        F: Fn(&mut SlotCalendarDay) -> Result<(), SchedulingError>,
    {
        for attempt in 1..=self.max_retries {
            let versioned = self
                .store
                .get_day(facility_id, date)
                .await?
                .ok_or(SchedulingError::NotFound)?;
            let mut day = versioned.record;
            mutate(&mut day)?;

            match self.store.put_day(day, versioned.version).await {
                Ok(()) => return Ok(()),
                Err(SchedulingError::ConcurrentConflict) => {
                    warn!(
                        "Day mutation lost the slot-record race, retrying attempt {}/{}",
                        attempt, self.max_retries
                    );
                    tokio::time::sleep(tokio::time::Duration::from_millis(10 * attempt as u64))
                        .await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(SchedulingError::ConcurrentConflict)
    }
}

/// Slot times come in as `HH:MM` strings from the template collaborator.
fn parse_slot_time(raw: &str) -> Result<NaiveTime, SchedulingError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| SchedulingError::ValidationError(format!("invalid slot time {:?}", raw)))
}
