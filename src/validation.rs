//! Client-side validation run before any request is sent.
//!
//! Each validator turns a form into the request body it guards, or returns
//! per-field messages for inline display.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{
    Medication, MedicationInput, NewReminder, RecordId, Registration, RepeatMode,
};

const MIN_PASSWORD_LEN: usize = 8;

/// Field name → message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields.iter().map(|(field, msg)| (*field, msg.as_str()))
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════
// Medication form
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MedicationForm {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub instructions: String,
}

impl From<&Medication> for MedicationForm {
    fn from(medication: &Medication) -> Self {
        Self {
            name: medication.name.clone(),
            dosage: medication.dosage.clone(),
            frequency: medication.frequency.clone(),
            start_date: medication.start_date,
            end_date: medication.end_date,
            instructions: medication.instructions.clone(),
        }
    }
}

pub fn validate_medication(form: &MedicationForm) -> Result<MedicationInput, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let name = form.name.trim();
    let dosage = form.dosage.trim();
    let frequency = form.frequency.trim();

    if name.is_empty() {
        errors.add("name", "Name is required");
    }
    if dosage.is_empty() {
        errors.add("dosage", "Dosage is required");
    }
    if frequency.is_empty() {
        errors.add("frequency", "Frequency is required");
    }
    if let (Some(start), Some(end)) = (form.start_date, form.end_date) {
        if end < start {
            errors.add("end_date", "End date must be after start date");
        }
    }

    errors.into_result(MedicationInput {
        name: name.to_string(),
        dosage: dosage.to_string(),
        frequency: frequency.to_string(),
        start_date: form.start_date,
        end_date: form.end_date,
        instructions: form.instructions.trim().to_string(),
    })
}

// ═══════════════════════════════════════════
// Reminder form
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderForm {
    pub medication: Option<RecordId>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub repeat: RepeatMode,
}

pub fn validate_reminder(form: &ReminderForm) -> Result<NewReminder, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if form.medication.is_none() {
        errors.add("medication", "Medication is required");
    }
    if form.scheduled_time.is_none() {
        errors.add("scheduled_time", "Scheduled time is required");
    }

    match (form.medication, form.scheduled_time) {
        (Some(medication), Some(scheduled_time)) => errors.into_result(NewReminder {
            medication,
            scheduled_time,
            repeat: form.repeat,
            is_done: false,
        }),
        _ => Err(errors),
    }
}

// ═══════════════════════════════════════════
// Registration
// ═══════════════════════════════════════════

pub fn validate_registration(registration: &Registration) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if registration.username.trim().is_empty() {
        errors.add("username", "Username is required");
    }
    if registration.password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
    if registration.password != registration.password_confirm {
        errors.add("password_confirm", "Passwords don't match");
    }
    errors.into_result(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn form() -> MedicationForm {
        MedicationForm {
            name: "Aspirin".into(),
            dosage: "500mg".into(),
            frequency: "2x daily".into(),
            ..MedicationForm::default()
        }
    }

    #[test]
    fn valid_medication_trims_fields() {
        let mut f = form();
        f.name = "  Aspirin ".into();
        let input = validate_medication(&f).unwrap();
        assert_eq!(input.name, "Aspirin");
    }

    #[test]
    fn blank_required_fields_reported_per_field() {
        let f = MedicationForm {
            name: "   ".into(),
            ..MedicationForm::default()
        };
        let errors = validate_medication(&f).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.get("name"), Some("Name is required"));
        assert_eq!(errors.get("dosage"), Some("Dosage is required"));
        assert_eq!(errors.get("frequency"), Some("Frequency is required"));
    }

    #[test]
    fn end_date_before_start_rejected() {
        let mut f = form();
        f.start_date = NaiveDate::from_ymd_opt(2024, 6, 10);
        f.end_date = NaiveDate::from_ymd_opt(2024, 6, 1);
        let errors = validate_medication(&f).unwrap_err();
        assert_eq!(errors.get("end_date"), Some("End date must be after start date"));
    }

    #[test]
    fn same_start_and_end_date_allowed() {
        let mut f = form();
        f.start_date = NaiveDate::from_ymd_opt(2024, 6, 1);
        f.end_date = f.start_date;
        assert!(validate_medication(&f).is_ok());
    }

    #[test]
    fn form_from_existing_medication() {
        let med = Medication {
            id: RecordId(3),
            name: "Aspirin".into(),
            dosage: "81mg".into(),
            frequency: "daily".into(),
            start_date: None,
            end_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            instructions: String::new(),
        };
        let f = MedicationForm::from(&med);
        assert_eq!(f.dosage, "81mg");
        assert_eq!(f.end_date, med.end_date);
    }

    #[test]
    fn reminder_requires_medication_and_time() {
        let errors = validate_reminder(&ReminderForm::default()).unwrap_err();
        assert_eq!(errors.get("medication"), Some("Medication is required"));
        assert_eq!(errors.get("scheduled_time"), Some("Scheduled time is required"));
    }

    #[test]
    fn valid_reminder_starts_not_done() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let reminder = validate_reminder(&ReminderForm {
            medication: Some(RecordId(2)),
            scheduled_time: Some(at),
            repeat: RepeatMode::Daily,
        })
        .unwrap();
        assert!(!reminder.is_done);
        assert_eq!(reminder.repeat, RepeatMode::Daily);
    }

    #[test]
    fn registration_checks_password() {
        let mut registration = Registration {
            username: "sam".into(),
            email: "sam@example.com".into(),
            password: "short".into(),
            password_confirm: "other".into(),
            first_name: String::new(),
            last_name: String::new(),
        };
        let errors = validate_registration(&registration).unwrap_err();
        assert!(errors.get("password").is_some());
        assert_eq!(errors.get("password_confirm"), Some("Passwords don't match"));

        registration.password = "long enough".into();
        registration.password_confirm = "long enough".into();
        assert!(validate_registration(&registration).is_ok());
    }

    #[test]
    fn display_lists_fields_in_order() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "Name is required");
        errors.add("dosage", "Dosage is required");
        assert_eq!(
            errors.to_string(),
            "dosage: Dosage is required; name: Name is required"
        );
    }
}
