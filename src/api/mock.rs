//! In-memory backend for tests.
//!
//! Behaves like the server for the happy path, records every call, and can
//! be told to fail the next call or hold creates, updates, or deletes until
//! released.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{AuthApi, MedicationApi, PrescriptionApi, ReminderApi};
use crate::error::ClientError;
use crate::models::{
    AuthResponse, Credentials, ImageUpload, Medication, MedicationInput, NewReminder,
    NotificationReceipt, OcrExtraction, Prescription, PrescriptionCommit, RecordId, Registration,
    Reminder, ReminderFilter, ReminderPatch, User,
};

/// Kind of write that [`MockBackend::hold`] can gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Gate {
    Create,
    Update,
    Delete,
}

#[derive(Default)]
struct MockState {
    medications: Vec<Medication>,
    reminders: Vec<Reminder>,
    prescriptions: Vec<Prescription>,
    extraction: OcrExtraction,
    failures: VecDeque<ClientError>,
    calls: Vec<String>,
}

pub(crate) struct MockBackend {
    state: Mutex<MockState>,
    next_id: AtomicI64,
    gates: Mutex<HashMap<Gate, Arc<Notify>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            next_id: AtomicI64::new(100),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_medications(self, medications: Vec<Medication>) -> Self {
        self.state.lock().unwrap().medications = medications;
        self
    }

    pub fn with_reminders(self, reminders: Vec<Reminder>) -> Self {
        self.state.lock().unwrap().reminders = reminders;
        self
    }

    pub fn with_extraction(self, extraction: OcrExtraction) -> Self {
        self.state.lock().unwrap().extraction = extraction;
        self
    }

    /// Fail the next call with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, error: ClientError) {
        self.state.lock().unwrap().failures.push_back(error);
    }

    /// Make every write of `kind` wait for the returned handle's
    /// `notify_one` after the server state has changed.
    pub fn hold(&self, kind: Gate) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(kind, gate.clone());
        gate
    }

    async fn pass(&self, kind: Gate) {
        let gate = self.gates.lock().unwrap().get(&kind).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn medications(&self) -> Vec<Medication> {
        self.state.lock().unwrap().medications.clone()
    }

    pub fn reminders(&self) -> Vec<Reminder> {
        self.state.lock().unwrap().reminders.clone()
    }

    pub fn prescriptions(&self) -> Vec<Prescription> {
        self.state.lock().unwrap().prescriptions.clone()
    }

    fn next_id(&self) -> RecordId {
        RecordId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Log the call, then pop a queued failure if any.
    fn enter(&self, call: impl Into<String>) -> Result<std::sync::MutexGuard<'_, MockState>, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.into());
        match state.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

fn not_found() -> ClientError {
    ClientError::Server {
        status: 404,
        message: Some("Not found.".into()),
    }
}

fn mock_user(username: &str) -> User {
    User {
        id: RecordId(1),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        first_name: String::new(),
        last_name: String::new(),
    }
}

#[async_trait]
impl MedicationApi for MockBackend {
    async fn list_medications(&self) -> Result<Vec<Medication>, ClientError> {
        let state = self.enter("list_medications")?;
        Ok(state.medications.clone())
    }

    async fn create_medication(&self, input: &MedicationInput) -> Result<Medication, ClientError> {
        let id = self.next_id();
        let medication = {
            let mut state = self.enter("create_medication")?;
            let medication = input.to_medication(id);
            state.medications.insert(0, medication.clone());
            medication
        };
        self.pass(Gate::Create).await;
        Ok(medication)
    }

    async fn update_medication(
        &self,
        id: RecordId,
        input: &MedicationInput,
    ) -> Result<Medication, ClientError> {
        let mut state = self.enter(format!("update_medication:{id}"))?;
        let slot = state
            .medications
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(not_found)?;
        *slot = input.to_medication(id);
        Ok(slot.clone())
    }

    async fn delete_medication(&self, id: RecordId) -> Result<(), ClientError> {
        {
            let mut state = self.enter(format!("delete_medication:{id}"))?;
            let before = state.medications.len();
            state.medications.retain(|m| m.id != id);
            if state.medications.len() == before {
                return Err(not_found());
            }
            state.reminders.retain(|r| r.medication != id);
        }
        self.pass(Gate::Delete).await;
        Ok(())
    }
}

#[async_trait]
impl ReminderApi for MockBackend {
    async fn list_reminders(&self, filter: &ReminderFilter) -> Result<Vec<Reminder>, ClientError> {
        let state = self.enter("list_reminders")?;
        Ok(state
            .reminders
            .iter()
            .filter(|r| filter.is_done.map_or(true, |done| r.is_done == done))
            .filter(|r| filter.repeat.map_or(true, |repeat| r.repeat == repeat))
            .cloned()
            .collect())
    }

    async fn create_reminder(&self, reminder: &NewReminder) -> Result<Reminder, ClientError> {
        let id = self.next_id();
        let created = {
            let mut state = self.enter("create_reminder")?;
            let mut created = reminder.to_reminder(id);
            created.medication_name = state
                .medications
                .iter()
                .find(|m| m.id == reminder.medication)
                .map(|m| m.name.clone());
            state.reminders.insert(0, created.clone());
            created
        };
        self.pass(Gate::Create).await;
        Ok(created)
    }

    async fn update_reminder(
        &self,
        id: RecordId,
        patch: &ReminderPatch,
    ) -> Result<Reminder, ClientError> {
        let result = {
            let mut state = self.enter(format!("update_reminder:{id}"))?;
            let slot = state
                .reminders
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(not_found)?;
            if let Some(is_done) = patch.is_done {
                slot.is_done = is_done;
            }
            if let Some(scheduled_time) = patch.scheduled_time {
                slot.scheduled_time = scheduled_time;
            }
            if let Some(repeat) = patch.repeat {
                slot.repeat = repeat;
            }
            slot.clone()
        };

        self.pass(Gate::Update).await;
        Ok(result)
    }

    async fn delete_reminder(&self, id: RecordId) -> Result<(), ClientError> {
        {
            let mut state = self.enter(format!("delete_reminder:{id}"))?;
            let before = state.reminders.len();
            state.reminders.retain(|r| r.id != id);
            if state.reminders.len() == before {
                return Err(not_found());
            }
        }
        self.pass(Gate::Delete).await;
        Ok(())
    }

    async fn send_test_notification(
        &self,
        id: RecordId,
    ) -> Result<NotificationReceipt, ClientError> {
        let state = self.enter(format!("send_test:{id}"))?;
        if !state.reminders.iter().any(|r| r.id == id) {
            return Err(not_found());
        }
        Ok(NotificationReceipt {
            message: format!("Test notification sent for reminder {id}"),
        })
    }
}

#[async_trait]
impl PrescriptionApi for MockBackend {
    async fn upload_prescription(&self, image: &ImageUpload) -> Result<OcrExtraction, ClientError> {
        let state = self.enter(format!("upload:{}", image.file_name))?;
        Ok(state.extraction.clone())
    }

    async fn create_prescription(
        &self,
        commit: &PrescriptionCommit,
    ) -> Result<Prescription, ClientError> {
        let id = self.next_id();
        let mut state = self.enter("create_prescription")?;
        let prescription = Prescription {
            id,
            doctor_name: Some(commit.doctor_name.clone()),
            medications: commit.medications.clone(),
        };
        state.prescriptions.push(prescription.clone());
        Ok(prescription)
    }

    async fn update_prescription(
        &self,
        id: RecordId,
        commit: &PrescriptionCommit,
    ) -> Result<Prescription, ClientError> {
        let mut state = self.enter(format!("update_prescription:{id}"))?;
        let prescription = Prescription {
            id,
            doctor_name: Some(commit.doctor_name.clone()),
            medications: commit.medications.clone(),
        };
        state.prescriptions.retain(|p| p.id != id);
        state.prescriptions.push(prescription.clone());
        Ok(prescription)
    }
}

#[async_trait]
impl AuthApi for MockBackend {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ClientError> {
        self.enter("login")?;
        Ok(AuthResponse {
            token: format!("token-{}", credentials.username),
            user: mock_user(&credentials.username),
        })
    }

    async fn register(&self, registration: &Registration) -> Result<AuthResponse, ClientError> {
        self.enter("register")?;
        Ok(AuthResponse {
            token: format!("token-{}", registration.username),
            user: mock_user(&registration.username),
        })
    }

    async fn current_user(&self) -> Result<User, ClientError> {
        self.enter("current_user")?;
        Ok(mock_user("ana"))
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.enter("logout")?;
        Ok(())
    }
}
