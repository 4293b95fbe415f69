// libs/scheduling-cell/src/services/notify.rs
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tracing::info;
use uuid::Uuid;

/// Events the scheduling core hands to the external notification
/// collaborator. Dispatch failures are the collaborator's problem,
/// never the booking protocol's.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulingEvent {
    Booked {
        appointment_id: Uuid,
        patient_id: Uuid,
    },
    Cancelled {
        appointment_id: Uuid,
        patient_id: Uuid,
    },
    Rescheduled {
        appointment_id: Uuid,
        patient_id: Uuid,
        new_date: NaiveDate,
        new_start_time: NaiveTime,
    },
    WaitlistMatched {
        request_id: Uuid,
        appointment_id: Uuid,
        patient_id: Uuid,
    },
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn dispatch(&self, event: SchedulingEvent);
}

/// Default sink: structured log lines, picked up by whatever ships
/// them onward.
#[derive(Default)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn dispatch(&self, event: SchedulingEvent) {
        info!("Scheduling event: {:?}", event);
    }
}

/// Test sink that records every dispatched event.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: tokio::sync::Mutex<Vec<SchedulingEvent>>,
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn dispatch(&self, event: SchedulingEvent) {
        self.events.lock().await.push(event);
    }
}
