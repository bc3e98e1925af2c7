//! Prescription review: edit an OCR extraction before it is saved.
//!
//! The draft moves `Idle → Editing → Extracted → Saved`. An upload or save
//! failure puts it in `Error` with the draft intact; the next edit returns
//! it to `Editing`. The medication rows never drop below one.

use std::sync::Arc;

use thiserror::Error;

use crate::api::PrescriptionApi;
use crate::error::ClientError;
use crate::models::{
    ImageUpload, MedicationCandidate, OcrExtraction, Prescription, PrescriptionCommit, RecordId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftState {
    Idle,
    /// Image chosen, nothing extracted yet.
    Editing,
    Extracted,
    Saved,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateField {
    Name,
    Dosage,
    Frequency,
}

#[derive(Error, Debug)]
pub enum DraftError {
    #[error("A prescription needs at least one medication row")]
    LastRow,

    #[error("No medication row at position {0}")]
    RowOutOfRange(usize),

    #[error("Select an image first")]
    NoImage,

    #[error("Add at least one medication before saving")]
    NoMedications,

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl DraftError {
    pub fn user_message(&self) -> String {
        match self {
            DraftError::Client(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

// ═══════════════════════════════════════════
// Draft
// ═══════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct PrescriptionDraft {
    state: DraftState,
    image: Option<ImageUpload>,
    id: Option<RecordId>,
    doctor_name: String,
    medications: Vec<MedicationCandidate>,
    error: Option<String>,
}

impl Default for PrescriptionDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl PrescriptionDraft {
    pub fn new() -> Self {
        Self {
            state: DraftState::Idle,
            image: None,
            id: None,
            doctor_name: String::new(),
            medications: vec![MedicationCandidate::default()],
            error: None,
        }
    }

    pub fn state(&self) -> DraftState {
        self.state
    }

    pub fn image(&self) -> Option<&ImageUpload> {
        self.image.as_ref()
    }

    /// Server id, known once the extraction or a save returned one.
    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub fn doctor_name(&self) -> &str {
        &self.doctor_name
    }

    pub fn medications(&self) -> &[MedicationCandidate] {
        &self.medications
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Start over with a new image.
    pub fn select_image(&mut self, image: ImageUpload) {
        *self = Self::new();
        self.image = Some(image);
        self.state = DraftState::Editing;
    }

    pub fn apply_extraction(&mut self, extraction: OcrExtraction) {
        self.id = extraction.id;
        self.doctor_name = extraction.doctor_name.unwrap_or_default();
        self.medications = extraction.medications;
        if self.medications.is_empty() {
            self.medications.push(MedicationCandidate::default());
        }
        self.error = None;
        self.state = DraftState::Extracted;
    }

    pub fn set_doctor_name(&mut self, name: impl Into<String>) {
        self.doctor_name = name.into();
        self.touch();
    }

    pub fn set_field(
        &mut self,
        index: usize,
        field: CandidateField,
        value: impl Into<String>,
    ) -> Result<(), DraftError> {
        let row = self
            .medications
            .get_mut(index)
            .ok_or(DraftError::RowOutOfRange(index))?;
        let value = value.into();
        match field {
            CandidateField::Name => row.name = value,
            CandidateField::Dosage => row.dosage = value,
            CandidateField::Frequency => row.frequency = value,
        }
        self.touch();
        Ok(())
    }

    pub fn add_row(&mut self) {
        self.medications.push(MedicationCandidate::default());
        self.touch();
    }

    pub fn remove_row(&mut self, index: usize) -> Result<MedicationCandidate, DraftError> {
        if index >= self.medications.len() {
            return Err(DraftError::RowOutOfRange(index));
        }
        if self.medications.len() == 1 {
            return Err(DraftError::LastRow);
        }
        let removed = self.medications.remove(index);
        self.touch();
        Ok(removed)
    }

    /// Request body for saving. Blank rows are left out.
    pub fn commit(&self) -> Result<PrescriptionCommit, DraftError> {
        let medications: Vec<_> = self
            .medications
            .iter()
            .filter(|m| !m.is_blank())
            .map(|m| MedicationCandidate {
                name: m.name.trim().to_string(),
                dosage: m.dosage.trim().to_string(),
                frequency: m.frequency.trim().to_string(),
            })
            .collect();
        if medications.is_empty() {
            return Err(DraftError::NoMedications);
        }
        Ok(PrescriptionCommit {
            doctor_name: self.doctor_name.trim().to_string(),
            medications,
        })
    }

    pub fn mark_saved(&mut self, prescription: &Prescription) {
        self.id = Some(prescription.id);
        self.error = None;
        self.state = DraftState::Saved;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.state = DraftState::Error;
    }

    fn touch(&mut self) {
        if matches!(self.state, DraftState::Error | DraftState::Saved) {
            self.error = None;
            self.state = DraftState::Editing;
        }
    }
}

// ═══════════════════════════════════════════
// Upload and save
// ═══════════════════════════════════════════

pub struct PrescriptionUpload<A: PrescriptionApi + ?Sized> {
    api: Arc<A>,
}

impl<A: PrescriptionApi + ?Sized> PrescriptionUpload<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Send the selected image for OCR and merge the result into the draft.
    pub async fn upload(&self, draft: &mut PrescriptionDraft) -> Result<(), DraftError> {
        let image = draft.image().cloned().ok_or(DraftError::NoImage)?;
        match self.api.upload_prescription(&image).await {
            Ok(extraction) => {
                tracing::info!(
                    id = ?extraction.id,
                    medications = extraction.medications.len(),
                    "Prescription extracted"
                );
                draft.apply_extraction(extraction);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Prescription upload failed");
                draft.fail(e.user_message());
                Err(e.into())
            }
        }
    }

    /// Save the draft: create when no id is known yet, patch otherwise.
    pub async fn save(&self, draft: &mut PrescriptionDraft) -> Result<Prescription, DraftError> {
        let commit = draft.commit()?;
        let result = match draft.id() {
            Some(id) => self.api.update_prescription(id, &commit).await,
            None => self.api.create_prescription(&commit).await,
        };
        match result {
            Ok(prescription) => {
                tracing::info!(id = %prescription.id, "Prescription saved");
                draft.mark_saved(&prescription);
                Ok(prescription)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Prescription save failed");
                draft.fail(e.user_message());
                Err(e.into())
            }
        }
    }
}
