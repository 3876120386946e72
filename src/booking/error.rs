use ulid::Ulid;

use crate::store::StoreError;
use crate::throttle::Throttled;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    Throttled { retry_after_secs: u64 },
    NotFound(Ulid),
    /// The slot is no longer offered, or the datastore refused it as taken.
    SlotUnavailable,
    InvalidInput(&'static str),
    Store(StoreError),
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::Throttled { retry_after_secs } => {
                write!(f, "too many attempts, retry in {retry_after_secs} seconds")
            }
            BookingError::NotFound(id) => write!(f, "not found: {id}"),
            BookingError::SlotUnavailable => write!(f, "slot is no longer available"),
            BookingError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            BookingError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for BookingError {}

impl From<Throttled> for BookingError {
    fn from(t: Throttled) -> Self {
        BookingError::Throttled {
            retry_after_secs: t.retry_after_secs,
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => BookingError::NotFound(id),
            StoreError::Conflict(_) => BookingError::SlotUnavailable,
            other => BookingError::Store(other),
        }
    }
}
