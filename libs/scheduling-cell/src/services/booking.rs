// libs/scheduling-cell/src/services/booking.rs
//
// The only component allowed to create, cancel or reschedule
// appointments. Every path keeps slot capacity and appointment state
// consistent as a pair: a reservation is rolled back if the
// appointment write behind it fails, and a reschedule reserves its
// destination before touching its source.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::SchedulingError;
use crate::models::{
    Appointment, AppointmentStatus, BookAppointmentRequest, CancelAppointmentRequest,
    CancellationRecord, RescheduleAppointmentRequest, RescheduleRecord, ServiceType,
};
use crate::services::calendar::SlotCalendarService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notify::{NotificationSink, SchedulingEvent};
use crate::store::AppointmentStore;

/// Capacity returned to the pool by a cancellation; the waitlist gets
/// first refusal on it.
#[derive(Debug, Clone)]
pub struct FreedCapacity {
    pub facility_id: String,
    pub date: NaiveDate,
    pub service_type: ServiceType,
}

#[derive(Debug, Clone)]
pub struct CancellationOutcome {
    pub appointment: Appointment,
    pub freed: FreedCapacity,
}

pub struct BookingCoordinator {
    calendar: Arc<SlotCalendarService>,
    appointments: Arc<dyn AppointmentStore>,
    lifecycle: AppointmentLifecycleService,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    lead_time_hours: i64,
}

impl BookingCoordinator {
    pub fn new(
        calendar: Arc<SlotCalendarService>,
        appointments: Arc<dyn AppointmentStore>,
        lifecycle: AppointmentLifecycleService,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        lead_time_hours: i64,
    ) -> Self {
        Self {
            calendar,
            appointments,
            lifecycle,
            notifier,
            clock,
            lead_time_hours,
        }
    }

    /// Reserve one unit of slot capacity, then create the appointment
    /// in `scheduled`. A failed appointment write rolls the
    /// reservation back; capacity is never left consumed without a
    /// live appointment behind it.
    #[instrument(skip(self, request), fields(patient_id = %request.patient_id))]
    pub async fn book(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let slot = self
            .calendar
            .get_slot(&request.facility_id, request.date, request.start_time)
            .await?;

        self.ensure_window_open(slot_instant(request.date, request.start_time))?;

        self.calendar
            .reserve(&request.facility_id, request.date, request.start_time, 1)
            .await?;

        let now = self.clock.now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            facility_id: request.facility_id.clone(),
            date: request.date,
            slot_start_time: slot.start_time,
            slot_end_time: slot.end_time,
            service_type: slot.service_type,
            status: AppointmentStatus::Scheduled,
            priority: request.priority,
            notes: request.notes,
            cancellation: None,
            reschedule_history: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.appointments.insert(appointment.clone()).await {
            error!(
                "Appointment write failed after reservation, rolling back: {}",
                e
            );
            if let Err(release_err) = self
                .calendar
                .release(&request.facility_id, request.date, request.start_time, 1)
                .await
            {
                error!("Compensating release also failed: {}", release_err);
            }
            return Err(e);
        }

        info!(
            "Appointment {} booked for patient {} at {} {} {}",
            appointment.id,
            appointment.patient_id,
            appointment.facility_id,
            appointment.date,
            appointment.slot_start_time
        );
        self.notifier
            .dispatch(SchedulingEvent::Booked {
                appointment_id: appointment.id,
                patient_id: appointment.patient_id,
            })
            .await;

        Ok(appointment)
    }

    /// Transition to cancelled, then return the capacity unit. The
    /// freed unit is reported so the caller can offer it to the
    /// waitlist.
    #[instrument(skip(self, request))]
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
    ) -> Result<CancellationOutcome, SchedulingError> {
        let mut appointment = self.get(appointment_id).await?;

        // Terminal state wins over every other rejection; a second
        // cancel reports AlreadyTerminal even when the slot start has
        // moved inside the window or passed entirely.
        self.lifecycle
            .validate_transition(appointment.status, AppointmentStatus::Cancelled)?;
        self.lifecycle.validate_cancellation_reason(&request.reason)?;
        if !request.cancelled_by.bypasses_modification_window() {
            self.ensure_window_open(appointment.slot_start_instant())?;
        }

        appointment.status = AppointmentStatus::Cancelled;
        appointment.cancellation = Some(CancellationRecord {
            reason: request.reason,
            cancelled_by: request.cancelled_by,
            cancelled_at: self.clock.now(),
        });
        appointment.updated_at = self.clock.now();
        self.appointments.update(appointment.clone()).await?;

        // Release cannot fail a capacity check; anything else here is
        // a storage fault we log without failing the cancellation.
        if let Err(e) = self
            .calendar
            .release(
                &appointment.facility_id,
                appointment.date,
                appointment.slot_start_time,
                1,
            )
            .await
        {
            error!(
                "Failed to release capacity for cancelled appointment {}: {}",
                appointment.id, e
            );
        }

        info!("Appointment {} cancelled", appointment.id);
        self.notifier
            .dispatch(SchedulingEvent::Cancelled {
                appointment_id: appointment.id,
                patient_id: appointment.patient_id,
            })
            .await;

        let freed = FreedCapacity {
            facility_id: appointment.facility_id.clone(),
            date: appointment.date,
            service_type: appointment.service_type,
        };
        Ok(CancellationOutcome { appointment, freed })
    }

    /// Two-slot atomic move: the destination is reserved first, and
    /// only then is the source released and the binding updated. If
    /// the destination reserve fails the source is untouched, so the
    /// appointment is never left without a valid slot. The transient
    /// double-hold between reserve and release is intentional.
    #[instrument(skip(self, request))]
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = self.get(appointment_id).await?;

        self.lifecycle.validate_reschedule(appointment.status)?;
        // The window guards the commitment being broken: the source slot.
        self.ensure_window_open(appointment.slot_start_instant())?;

        let new_slot = self
            .calendar
            .get_slot(
                &appointment.facility_id,
                request.new_date,
                request.new_start_time,
            )
            .await?;

        self.calendar
            .reserve(
                &appointment.facility_id,
                request.new_date,
                request.new_start_time,
                1,
            )
            .await?;

        let old_date = appointment.date;
        let old_start = appointment.slot_start_time;

        appointment.reschedule_history.push(RescheduleRecord {
            from_date: old_date,
            from_start_time: old_start,
            to_date: request.new_date,
            to_start_time: request.new_start_time,
            rescheduled_by: request.rescheduled_by,
            rescheduled_at: self.clock.now(),
        });
        appointment.date = request.new_date;
        appointment.slot_start_time = new_slot.start_time;
        appointment.slot_end_time = new_slot.end_time;
        appointment.service_type = new_slot.service_type;
        // Side-transition: the appointment re-enters scheduled on the
        // new slot, keeping its identity.
        appointment.status = AppointmentStatus::Scheduled;
        appointment.updated_at = self.clock.now();

        if let Err(e) = self.appointments.update(appointment.clone()).await {
            error!(
                "Appointment rebind failed after destination reserve, rolling back: {}",
                e
            );
            if let Err(release_err) = self
                .calendar
                .release(
                    &appointment.facility_id,
                    request.new_date,
                    request.new_start_time,
                    1,
                )
                .await
            {
                error!("Compensating release also failed: {}", release_err);
            }
            return Err(e);
        }

        if let Err(e) = self
            .calendar
            .release(&appointment.facility_id, old_date, old_start, 1)
            .await
        {
            error!(
                "Failed to release source slot after reschedule of {}: {}",
                appointment.id, e
            );
        }

        info!(
            "Appointment {} rescheduled from {} {} to {} {}",
            appointment.id, old_date, old_start, appointment.date, appointment.slot_start_time
        );
        self.notifier
            .dispatch(SchedulingEvent::Rescheduled {
                appointment_id: appointment.id,
                patient_id: appointment.patient_id,
                new_date: appointment.date,
                new_start_time: appointment.slot_start_time,
            })
            .await;

        Ok(appointment)
    }

    pub async fn confirm(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        self.transition(appointment_id, AppointmentStatus::Confirmed, |_, _| Ok(()))
            .await
    }

    pub async fn check_in(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        let now = self.clock.now();
        self.transition(
            appointment_id,
            AppointmentStatus::CheckedIn,
            |lifecycle, appointment| {
                lifecycle.validate_check_in_time(appointment.slot_start_instant(), now)
            },
        )
        .await
    }

    pub async fn mark_in_progress(
        &self,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        self.transition(appointment_id, AppointmentStatus::InProgress, |_, _| Ok(()))
            .await
    }

    /// Completion is what the billing collaborator reads.
    pub async fn complete(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        self.transition(appointment_id, AppointmentStatus::Completed, |_, _| Ok(()))
            .await
    }

    pub async fn mark_no_show(
        &self,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        let now = self.clock.now();
        self.transition(
            appointment_id,
            AppointmentStatus::NoShow,
            |lifecycle, appointment| {
                lifecycle.validate_no_show_time(appointment.slot_end_instant(), now)
            },
        )
        .await
    }

    pub async fn get(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        self.appointments
            .get(appointment_id)
            .await?
            .ok_or(SchedulingError::NotFound)
    }

    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.appointments.list_for_patient(patient_id).await
    }

    async fn transition<F>(
        &self,
        appointment_id: Uuid,
        target: AppointmentStatus,
        gate: F,
    ) -> Result<Appointment, SchedulingError>
    where
        F: Fn(&AppointmentLifecycleService, &Appointment) -> Result<(), SchedulingError>,
    {
        let mut appointment = self.get(appointment_id).await?;

        self.lifecycle
            .validate_transition(appointment.status, target)?;
        gate(&self.lifecycle, &appointment)?;

        appointment.status = target;
        appointment.updated_at = self.clock.now();
        self.appointments.update(appointment.clone()).await?;

        debug!("Appointment {} transitioned to {}", appointment.id, target);
        Ok(appointment)
    }

    fn ensure_window_open(&self, slot_start: DateTime<Utc>) -> Result<(), SchedulingError> {
        if slot_start - self.clock.now() < Duration::hours(self.lead_time_hours) {
            return Err(SchedulingError::ModificationWindowClosed {
                lead_time_hours: self.lead_time_hours,
            });
        }
        Ok(())
    }
}

fn slot_instant(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}
