use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::RecordId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub id: RecordId,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub instructions: String,
}

/// Body for `POST /api/medications/` and `PUT /api/medications/{id}/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationInput {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instructions: String,
}

impl MedicationInput {
    /// Local record shown while the server request is in flight.
    pub fn to_medication(&self, id: RecordId) -> Medication {
        Medication {
            id,
            name: self.name.clone(),
            dosage: self.dosage.clone(),
            frequency: self.frequency.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            instructions: self.instructions.clone(),
        }
    }
}

/// A medication with its derived status, as listed on the medications screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MedicationCard {
    pub medication: Medication,
    pub status: super::MedicationStatus,
}
