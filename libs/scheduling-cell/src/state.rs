// libs/scheduling-cell/src/state.rs
use std::sync::Arc;

use shared_config::AppConfig;

use crate::clock::{Clock, SystemClock};
use crate::services::booking::BookingCoordinator;
use crate::services::calendar::SlotCalendarService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notify::{NotificationSink, TracingNotifier};
use crate::services::waitlist::WaitlistManager;
use crate::store::memory::{
    InMemoryAppointmentStore, InMemoryCalendarStore, InMemoryWaitlistStore,
};

/// Shared service graph. Unlike stateless cells, the scheduling state
/// must outlive individual requests because it owns the slot records.
#[derive(Clone)]
pub struct SchedulingState {
    pub calendar: Arc<SlotCalendarService>,
    pub coordinator: Arc<BookingCoordinator>,
    pub waitlist: Arc<WaitlistManager>,
}

impl SchedulingState {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_dependencies(
            config,
            Arc::new(SystemClock),
            Arc::new(TracingNotifier),
        )
    }

    /// Wiring seam for tests: inject a fixed clock or a recording
    /// notification sink.
    pub fn with_dependencies(
        config: &AppConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let calendar = Arc::new(SlotCalendarService::new(
            Arc::new(InMemoryCalendarStore::new()),
            config.reserve_max_retries,
        ));
        let coordinator = Arc::new(BookingCoordinator::new(
            Arc::clone(&calendar),
            Arc::new(InMemoryAppointmentStore::new()),
            AppointmentLifecycleService::new(config.checkin_grace_minutes),
            Arc::clone(&notifier),
            Arc::clone(&clock),
            config.modification_lead_time_hours,
        ));
        let waitlist = Arc::new(WaitlistManager::new(
            Arc::new(InMemoryWaitlistStore::new()),
            Arc::clone(&calendar),
            Arc::clone(&coordinator),
            notifier,
            clock,
        ));

        Self {
            calendar,
            coordinator,
            waitlist,
        }
    }
}
