// libs/scheduling-cell/src/services/waitlist.rs
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::SchedulingError;
use crate::models::{
    Appointment, AppointmentPriority, BookAppointmentRequest, JoinWaitlistRequest, ServiceType,
    WaitlistEntry,
};
use crate::services::booking::BookingCoordinator;
use crate::services::calendar::SlotCalendarService;
use crate::services::notify::{NotificationSink, SchedulingEvent};
use crate::store::WaitlistStore;

/// FIFO matching of deferred booking requests to freed capacity.
pub struct WaitlistManager {
    store: Arc<dyn WaitlistStore>,
    calendar: Arc<SlotCalendarService>,
    coordinator: Arc<BookingCoordinator>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl WaitlistManager {
    pub fn new(
        store: Arc<dyn WaitlistStore>,
        calendar: Arc<SlotCalendarService>,
        coordinator: Arc<BookingCoordinator>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            calendar,
            coordinator,
            notifier,
            clock,
        }
    }

    pub async fn enqueue(
        &self,
        request: JoinWaitlistRequest,
    ) -> Result<WaitlistEntry, SchedulingError> {
        if request.acceptable_dates.is_empty() {
            return Err(SchedulingError::ValidationError(
                "waitlist request needs at least one acceptable date".to_string(),
            ));
        }

        let entry = WaitlistEntry {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            facility_id: request.facility_id,
            service_type: request.service_type,
            acceptable_dates: request.acceptable_dates,
            priority: request.priority.unwrap_or(AppointmentPriority::Routine),
            enqueued_at: self.clock.now(),
        };
        self.store.insert(entry.clone()).await?;

        info!(
            "Waitlist entry {} enqueued for patient {} at {}",
            entry.id, entry.patient_id, entry.facility_id
        );
        Ok(entry)
    }

    /// Idempotent removal; withdrawing an unknown or already-converted
    /// entry is a no-op.
    pub async fn withdraw(&self, request_id: Uuid) -> Result<bool, SchedulingError> {
        let removed = self.store.remove(request_id).await?;
        if removed {
            info!("Waitlist entry {} withdrawn", request_id);
        } else {
            debug!("Waitlist entry {} already gone", request_id);
        }
        Ok(removed)
    }

    /// Offer one freed unit of capacity to the queue. Entries for the
    /// facility/service whose acceptable dates include the freed date
    /// are tried in FIFO order; the first successful booking wins and
    /// the scan stops, so one freed unit converts at most one entry. An
    /// entry that loses the reserve race to a direct booking is not an
    /// error; the scan just moves on.
    #[instrument(skip(self))]
    pub async fn notify_capacity_freed(
        &self,
        facility_id: &str,
        date: NaiveDate,
        service_type: ServiceType,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let entries = self
            .store
            .matching_entries(facility_id, service_type, date)
            .await?;
        if entries.is_empty() {
            debug!(
                "No waitlist entries for {} {} {}",
                facility_id, date, service_type
            );
            return Ok(None);
        }

        for entry in entries {
            match self.try_convert(&entry, facility_id, date, service_type).await {
                Some(appointment) => {
                    self.store.remove(entry.id).await?;
                    info!(
                        "Waitlist entry {} converted to appointment {}",
                        entry.id, appointment.id
                    );
                    self.notifier
                        .dispatch(SchedulingEvent::WaitlistMatched {
                            request_id: entry.id,
                            appointment_id: appointment.id,
                            patient_id: entry.patient_id,
                        })
                        .await;
                    return Ok(Some(appointment));
                }
                None => continue,
            }
        }

        Ok(None)
    }

    /// Attempt to book the entry into the earliest bookable slot of
    /// the matching service on the freed date. Capacity races and
    /// closed windows skip to the next candidate slot rather than
    /// failing the scan.
    async fn try_convert(
        &self,
        entry: &WaitlistEntry,
        facility_id: &str,
        date: NaiveDate,
        service_type: ServiceType,
    ) -> Option<Appointment> {
        let available = match self
            .calendar
            .list_available(facility_id, date, Some(service_type))
            .await
        {
            Ok(slots) => slots,
            Err(e) => {
                warn!("Availability lookup failed during waitlist match: {}", e);
                return None;
            }
        };

        for slot in available {
            let request = BookAppointmentRequest {
                patient_id: entry.patient_id,
                facility_id: facility_id.to_string(),
                date,
                start_time: slot.start_time,
                priority: entry.priority,
                notes: None,
            };
            match self.coordinator.book(request).await {
                Ok(appointment) => return Some(appointment),
                Err(
                    SchedulingError::CapacityExceeded
                    | SchedulingError::SlotBlocked
                    | SchedulingError::ModificationWindowClosed { .. }
                    | SchedulingError::ConcurrentConflict,
                ) => {
                    // Lost the race for this slot or it is no longer
                    // takeable; try the next candidate.
                    continue;
                }
                Err(e) => {
                    warn!(
                        "Waitlist conversion for entry {} failed: {}",
                        entry.id, e
                    );
                    return None;
                }
            }
        }

        None
    }
}
