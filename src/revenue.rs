//! Weekly revenue statistics. Pure functions over a slice of appointments;
//! which week to report is the caller's choice.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::Serialize;

use crate::model::{weekday_name, Appointment};

/// Rendered in place of a weekday when no day earned anything.
pub const NO_BUSIEST_DAY: &str = "none";

const DAYS_PER_WEEK: usize = 7;

const BUCKET_DAYS: [Weekday; DAYS_PER_WEEK] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Monday of the week containing `date`.
pub fn week_monday(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Inclusive local-time bounds of a reporting week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl WeekWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Monday 00:00:00.000 through Sunday 23:59:59.999 of the week holding `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let monday = week_monday(date);
        let sunday = monday + Duration::days(6);
        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        Self {
            start: monday.and_time(NaiveTime::MIN),
            end: sunday.and_time(end_of_day),
        }
    }

    /// The same window shifted by whole weeks (negative goes back).
    pub fn offset(&self, weeks: i64) -> Self {
        Self {
            start: self.start + Duration::weeks(weeks),
            end: self.end + Duration::weeks(weeks),
        }
    }

    /// A date counts if its midnight falls inside the window.
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        let midnight = date.and_time(NaiveTime::MIN);
        self.start <= midnight && midnight <= self.end
    }

    /// Short label such as `12 Oct - 18 Oct`.
    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.start.format("%-d %b"),
            self.end.format("%-d %b")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekStats {
    /// Completed earnings per weekday, Monday first.
    pub completed_earnings: [f64; DAYS_PER_WEEK],
    pub pending_earnings: [f64; DAYS_PER_WEEK],
    pub total_earnings: f64,
    pub total_pending: f64,
    pub completed_count: usize,
    pub pending_count: usize,
    pub busiest_day: Option<Weekday>,
    pub average_per_completed: f64,
}

impl WeekStats {
    pub fn busiest_day_label(&self) -> &'static str {
        self.busiest_day.map(weekday_name).unwrap_or(NO_BUSIEST_DAY)
    }
}

/// Bucket the window's dated appointments by weekday and total them.
///
/// Appointments without a calendar date are left out. The busiest day is
/// the first weekday holding the highest completed total, and there is none
/// when every completed bucket is zero.
pub fn aggregate(appointments: &[Appointment], window: &WeekWindow) -> WeekStats {
    let mut completed_earnings = [0.0; DAYS_PER_WEEK];
    let mut pending_earnings = [0.0; DAYS_PER_WEEK];
    let mut completed_count = 0;
    let mut pending_count = 0;

    for appointment in appointments {
        let Some(date) = appointment.iso_date else { continue };
        if !window.contains_date(date) {
            continue;
        }
        let bucket = date.weekday().num_days_from_monday() as usize;
        if appointment.is_completed() {
            completed_earnings[bucket] += appointment.price;
            completed_count += 1;
        } else {
            pending_earnings[bucket] += appointment.price;
            pending_count += 1;
        }
    }

    let total_earnings: f64 = completed_earnings.iter().sum();
    let total_pending: f64 = pending_earnings.iter().sum();

    let mut busiest: Option<(usize, f64)> = None;
    for (idx, &amount) in completed_earnings.iter().enumerate() {
        if amount > busiest.map_or(0.0, |(_, best)| best) {
            busiest = Some((idx, amount));
        }
    }
    let busiest_day = busiest.map(|(idx, _)| BUCKET_DAYS[idx]);

    let average_per_completed = if completed_count > 0 {
        (total_earnings / completed_count as f64).round()
    } else {
        0.0
    };

    WeekStats {
        completed_earnings,
        pending_earnings,
        total_earnings,
        total_pending,
        completed_count,
        pending_count,
        busiest_day,
        average_per_completed,
    }
}
