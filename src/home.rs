//! Home dashboard: both boards plus the derived summary.

use std::sync::Arc;

use chrono::{DateTime, TimeZone};

use crate::api::{MedicationApi, ReminderApi};
use crate::derived::{self, DashboardSummary};
use crate::error::ClientError;
use crate::medications::MedicationBoard;
use crate::models::{RecordId, ReminderFilter};
use crate::reminders::ReminderBoard;
use crate::store::Outcome;

pub struct Dashboard<A: MedicationApi + ReminderApi + ?Sized> {
    medications: MedicationBoard<A>,
    reminders: ReminderBoard<A>,
}

impl<A: MedicationApi + ReminderApi + ?Sized> Dashboard<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            medications: MedicationBoard::new(api.clone()),
            reminders: ReminderBoard::new(api),
        }
    }

    pub fn medications(&self) -> &MedicationBoard<A> {
        &self.medications
    }

    pub fn reminders(&self) -> &ReminderBoard<A> {
        &self.reminders
    }

    /// Load both collections concurrently. Each board keeps its own banner;
    /// the first error is returned.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let filter = ReminderFilter::default();
        let (medications, reminders) =
            tokio::join!(self.medications.load(), self.reminders.load(&filter));
        medications?;
        reminders
    }

    /// Summary as of `now`, recomputed from the current collections.
    pub fn summary<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DashboardSummary, ClientError> {
        let medications = self.medications.medications()?;
        let reminders = self.reminders.reminders()?;
        Ok(derived::dashboard(&medications, &reminders, now))
    }

    /// Delete a medication and, once the server agrees, its reminders.
    pub async fn delete_medication(&self, id: RecordId) -> Result<Outcome<()>, ClientError> {
        let outcome = self.medications.delete(id).await?;
        if outcome == Outcome::Applied(()) {
            self.reminders.drop_for_medication(id)?;
        }
        Ok(outcome)
    }

    pub fn unmount(&self) {
        self.medications.unmount();
        self.reminders.unmount();
    }
}
