use crate::model::{Appointment, Slot};

/// True if a non-completed appointment already holds exactly this slot.
///
/// Slots are discrete: 9:00 and 9:01 never collide. Completed appointments
/// free their slot for re-booking.
pub fn would_conflict(slot: &Slot, existing: &[Appointment]) -> bool {
    existing.iter().any(|e| {
        !e.is_completed() && e.time == slot.time && e.date_key() == slot.date_key
    })
}
