use std::cmp::Ordering;

use crate::model::{weekday_rank, Appointment};

/// Chronological order: absolute date when both sides have one, then
/// weekday rank, then AM before PM, then minute of day.
///
/// Dated appointments sort ahead of weekday-only ones. Comparing a dated row
/// with an undated one by weekday alone is not transitive once dated rows
/// span more than one week.
pub fn compare(a: &Appointment, b: &Appointment) -> Ordering {
    match (a.iso_date, b.iso_date) {
        (Some(da), Some(db)) => {
            let by_date = da.cmp(&db);
            if by_date != Ordering::Equal {
                return by_date;
            }
        }
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
        (None, None) => {}
    }
    weekday_rank(&a.weekday_label)
        .cmp(&weekday_rank(&b.weekday_label))
        .then_with(|| a.time.period().cmp(&b.time.period()))
        .then_with(|| a.time.minutes().cmp(&b.time.minutes()))
}

/// Stable sort; equal appointments keep their relative order.
pub fn sort_appointments(list: &mut [Appointment]) {
    list.sort_by(compare);
}
