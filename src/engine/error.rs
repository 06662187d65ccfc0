use crate::model::{MalformedDate, Slot};
use crate::time::MalformedTime;

/// Everything the store reports to its caller. Remote failures are folded into
/// the `*Failed` kinds at the store boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    MalformedTime(String),
    MalformedDate(String),
    DuplicateSlot(Slot),
    LoadFailed(String),
    BookingFailed(String),
    UpdateFailed(String),
    DeleteFailed(String),
    /// The id (or slot, for bookings) already has a remote call outstanding.
    Busy(String),
    MissingService,
    LimitExceeded(&'static str),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::MalformedTime(e) => write!(f, "invalid time: {e}"),
            StoreError::MalformedDate(e) => write!(f, "invalid date: {e}"),
            StoreError::DuplicateSlot(slot) => {
                write!(f, "an appointment is already booked for {slot}")
            }
            StoreError::LoadFailed(e) => write!(f, "could not load appointments: {e}"),
            StoreError::BookingFailed(e) => write!(f, "could not save the appointment: {e}"),
            StoreError::UpdateFailed(e) => {
                write!(f, "could not update the appointment, change undone: {e}")
            }
            StoreError::DeleteFailed(e) => {
                write!(f, "could not delete the appointment, it was restored: {e}")
            }
            StoreError::Busy(what) => {
                write!(f, "{what} is still being saved, try again in a moment")
            }
            StoreError::MissingService => write!(f, "choose a service before booking"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<MalformedTime> for StoreError {
    fn from(e: MalformedTime) -> Self {
        StoreError::MalformedTime(e.0)
    }
}

impl From<MalformedDate> for StoreError {
    fn from(e: MalformedDate) -> Self {
        StoreError::MalformedDate(e.0)
    }
}
