//! Derived reminder and medication state.
//!
//! Pure functions recomputed from the source collections after every fetch
//! or mutation. Nothing here is stored, so a count can never drift away from
//! the list it was computed from.
//!
//! "Today" is the calendar date of `now` in `now`'s own timezone. Callers
//! pass `Local::now()`; tests pin `Utc` or a `FixedOffset`.

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::models::{Medication, MedicationStatus, Reminder};

/// Reminders due today that are not done yet, in input order.
pub fn todays_reminders<Tz: TimeZone>(reminders: &[Reminder], now: &DateTime<Tz>) -> Vec<Reminder> {
    let today = now.date_naive();
    let tz = now.timezone();
    reminders
        .iter()
        .filter(|r| !r.is_done && r.scheduled_time.with_timezone(&tz).date_naive() == today)
        .cloned()
        .collect()
}

/// Reminders scheduled strictly after `now` that are not done.
///
/// A reminder later today counts here and in [`todays_reminders`].
pub fn upcoming_count<Tz: TimeZone>(reminders: &[Reminder], now: &DateTime<Tz>) -> usize {
    reminders
        .iter()
        .filter(|r| !r.is_done && r.scheduled_time > *now)
        .count()
}

/// Reminders not done, whatever their date.
pub fn active_count(reminders: &[Reminder]) -> usize {
    reminders.iter().filter(|r| !r.is_done).count()
}

/// Expired iff the end date is strictly before today. Time of day is ignored.
pub fn medication_status<Tz: TimeZone>(medication: &Medication, now: &DateTime<Tz>) -> MedicationStatus {
    match medication.end_date {
        Some(end) if end < now.date_naive() => MedicationStatus::Expired,
        _ => MedicationStatus::Active,
    }
}

/// Dashboard aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total_medications: usize,
    pub active_medications: usize,
    pub active_reminders: usize,
    pub upcoming_doses: usize,
    pub todays_reminders: Vec<Reminder>,
}

pub fn dashboard<Tz: TimeZone>(
    medications: &[Medication],
    reminders: &[Reminder],
    now: &DateTime<Tz>,
) -> DashboardSummary {
    DashboardSummary {
        total_medications: medications.len(),
        active_medications: medications
            .iter()
            .filter(|m| medication_status(m, now) == MedicationStatus::Active)
            .count(),
        active_reminders: active_count(reminders),
        upcoming_doses: upcoming_count(reminders, now),
        todays_reminders: todays_reminders(reminders, now),
    }
}
