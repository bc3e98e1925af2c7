//! REST boundary.
//!
//! One trait per resource so boards depend only on what they call, and
//! tests can inject a fake backend. `HttpClient` implements all of them
//! against the real server.

pub mod client;
pub mod error;

#[cfg(test)]
pub(crate) mod mock;

pub use client::HttpClient;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::models::{
    AuthResponse, Credentials, ImageUpload, Medication, MedicationInput, NewReminder,
    NotificationReceipt, OcrExtraction, Prescription, PrescriptionCommit, RecordId, Registration,
    Reminder, ReminderFilter, ReminderPatch, User,
};

#[async_trait]
pub trait MedicationApi: Send + Sync {
    async fn list_medications(&self) -> Result<Vec<Medication>, ClientError>;
    async fn create_medication(&self, input: &MedicationInput) -> Result<Medication, ClientError>;
    async fn update_medication(
        &self,
        id: RecordId,
        input: &MedicationInput,
    ) -> Result<Medication, ClientError>;
    async fn delete_medication(&self, id: RecordId) -> Result<(), ClientError>;
}

#[async_trait]
pub trait ReminderApi: Send + Sync {
    async fn list_reminders(&self, filter: &ReminderFilter) -> Result<Vec<Reminder>, ClientError>;
    async fn create_reminder(&self, reminder: &NewReminder) -> Result<Reminder, ClientError>;
    async fn update_reminder(
        &self,
        id: RecordId,
        patch: &ReminderPatch,
    ) -> Result<Reminder, ClientError>;
    async fn delete_reminder(&self, id: RecordId) -> Result<(), ClientError>;
    /// Ask the server to push a test notification. Does not change the reminder.
    async fn send_test_notification(&self, id: RecordId)
        -> Result<NotificationReceipt, ClientError>;
}

#[async_trait]
pub trait PrescriptionApi: Send + Sync {
    async fn upload_prescription(&self, image: &ImageUpload) -> Result<OcrExtraction, ClientError>;
    async fn create_prescription(
        &self,
        commit: &PrescriptionCommit,
    ) -> Result<Prescription, ClientError>;
    async fn update_prescription(
        &self,
        id: RecordId,
        commit: &PrescriptionCommit,
    ) -> Result<Prescription, ClientError>;
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ClientError>;
    async fn register(&self, registration: &Registration) -> Result<AuthResponse, ClientError>;
    async fn current_user(&self) -> Result<User, ClientError>;
    async fn logout(&self) -> Result<(), ClientError>;
}
