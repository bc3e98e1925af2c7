use serde::{Deserialize, Serialize};

use super::RecordId;

/// One medication line extracted from a prescription image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationCandidate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
}

impl MedicationCandidate {
    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty()
            && self.dosage.trim().is_empty()
            && self.frequency.trim().is_empty()
    }
}

/// Response of `POST /api/ocr/upload/`. Extraction is best-effort, so every
/// field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrExtraction {
    #[serde(default, alias = "prescription_id")]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub medications: Vec<MedicationCandidate>,
}

/// Body for `POST /api/prescriptions/` and `PATCH /api/prescriptions/{id}/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionCommit {
    pub doctor_name: String,
    pub medications: Vec<MedicationCandidate>,
}

/// Committed prescription as echoed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: RecordId,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub medications: Vec<MedicationCandidate>,
}

/// Image selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read an image from disk, keeping only the file name for the upload.
    pub async fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("prescription")
            .to_string();
        Ok(Self { file_name, bytes })
    }

    /// MIME type guessed from the file extension.
    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}
