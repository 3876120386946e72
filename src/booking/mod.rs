mod error;
mod mutations;
mod queries;
#[cfg(test)]
mod tests;

pub use error::BookingError;
pub use mutations::BookingRequest;

use std::sync::Arc;

use crate::planner::PlannerSettings;
use crate::store::Datastore;
use crate::throttle::{self, AttemptThrottle};

/// What the booking and admin screens do around the core: fetch records,
/// plan slots, and push throttled writes to the datastore.
pub struct BookingService<S> {
    pub(super) store: Arc<S>,
    pub(super) throttle: Arc<AttemptThrottle>,
    pub(super) settings: PlannerSettings,
}

impl<S: Datastore> BookingService<S> {
    /// Uses the process-wide throttle.
    pub fn new(store: Arc<S>, settings: PlannerSettings) -> Self {
        Self::with_throttle(store, throttle::global(), settings)
    }

    pub fn with_throttle(store: Arc<S>, throttle: Arc<AttemptThrottle>, settings: PlannerSettings) -> Self {
        Self {
            store,
            throttle,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn throttle(&self) -> &AttemptThrottle {
        &self.throttle
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }
}
