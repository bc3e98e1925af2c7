//! Medication list board.
//!
//! Owns the medication collection for one screen. Reads fill the store (or
//! a banner on failure); writes go through [`RecordStore::mutate`] so the
//! list updates immediately and rolls back if the server refuses.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone};

use crate::api::MedicationApi;
use crate::derived::medication_status;
use crate::error::ClientError;
use crate::models::{Medication, MedicationCard, RecordId};
use crate::store::{Change, Outcome, RecordStore};
use crate::validation::{validate_medication, MedicationForm};

pub struct MedicationBoard<A: MedicationApi + ?Sized> {
    api: Arc<A>,
    store: RecordStore<Medication>,
    banner: Mutex<Option<String>>,
}

impl<A: MedicationApi + ?Sized> MedicationBoard<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            store: RecordStore::default(),
            banner: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &RecordStore<Medication> {
        &self.store
    }

    /// Fetch the list. A failure leaves the previous records in place and
    /// sets the banner.
    pub async fn load(&self) -> Result<(), ClientError> {
        match self.api.list_medications().await {
            Ok(medications) => {
                tracing::debug!(count = medications.len(), "Medications loaded");
                self.store.replace_all(medications)?;
                self.set_banner(None);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load medications");
                self.set_banner(Some(e.user_message()));
                Err(e)
            }
        }
    }

    /// Read-error message to show above the list, if the last load failed.
    pub fn banner(&self) -> Option<String> {
        self.banner.lock().ok().and_then(|b| b.clone())
    }

    fn set_banner(&self, message: Option<String>) {
        if let Ok(mut banner) = self.banner.lock() {
            *banner = message;
        }
    }

    pub fn medications(&self) -> Result<Vec<Medication>, ClientError> {
        self.store.records()
    }

    /// Cards with their status as of `now`.
    pub fn cards<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Vec<MedicationCard>, ClientError> {
        Ok(self
            .store
            .records()?
            .into_iter()
            .map(|medication| MedicationCard {
                status: medication_status(&medication, now),
                medication,
            })
            .collect())
    }

    pub async fn create(&self, form: &MedicationForm) -> Result<Outcome<Medication>, ClientError> {
        let input = validate_medication(form)?;
        let placeholder = input.to_medication(self.store.provisional_id());
        let outcome = self
            .store
            .mutate(
                Change::Insert(placeholder),
                self.api.create_medication(&input),
                |created: &Medication| Some(created.clone()),
            )
            .await?;
        match outcome {
            Outcome::Applied(created) => {
                tracing::info!(id = %created.id, "Medication created");
                Ok(Outcome::Applied(created))
            }
            Outcome::Withdrawn(created) => {
                // Deleted while saving: finish the delete now that it has an id.
                tracing::info!(id = %created.id, "Medication deleted before create finished");
                match self.api.delete_medication(created.id).await {
                    Err(e) if !e.is_not_found() => Err(e),
                    _ => Ok(Outcome::Discarded),
                }
            }
            Outcome::Discarded => Ok(Outcome::Discarded),
        }
    }

    pub async fn update(
        &self,
        id: RecordId,
        form: &MedicationForm,
    ) -> Result<Outcome<Medication>, ClientError> {
        let input = validate_medication(form)?;
        if id.is_provisional() {
            return Err(ClientError::NotSaved(id));
        }
        self.store
            .mutate(
                Change::Replace(input.to_medication(id)),
                self.api.update_medication(id, &input),
                |updated: &Medication| Some(updated.clone()),
            )
            .await
    }

    /// Delete a medication. Deleting one that is already gone issues no
    /// request, and a 404 from the server counts as done. A placeholder
    /// still being created is pulled locally; its create issues the delete.
    pub async fn delete(&self, id: RecordId) -> Result<Outcome<()>, ClientError> {
        if id.is_provisional() {
            return Ok(if self.store.withdraw(id)? {
                Outcome::Applied(())
            } else {
                Outcome::Discarded
            });
        }
        if !self.store.contains(id)? {
            tracing::debug!(%id, "Medication already removed");
            return Ok(Outcome::Discarded);
        }
        let api = &self.api;
        let request = async move {
            match api.delete_medication(id).await {
                Err(e) if e.is_not_found() => Ok(()),
                other => other,
            }
        };
        let outcome = self.store.mutate(Change::Remove(id), request, |_| None).await?;
        tracing::info!(%id, "Medication deleted");
        Ok(outcome)
    }

    pub fn unmount(&self) {
        self.store.unmount();
    }
}

impl<A: MedicationApi + ?Sized> Drop for MedicationBoard<A> {
    fn drop(&mut self) {
        self.store.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{Gate, MockBackend};
    use crate::models::MedicationStatus;
    use chrono::{NaiveDate, Utc};

    fn med(id: i64, name: &str, end: Option<NaiveDate>) -> Medication {
        Medication {
            id: RecordId(id),
            name: name.into(),
            dosage: "10mg".into(),
            frequency: "daily".into(),
            start_date: None,
            end_date: end,
            instructions: String::new(),
        }
    }

    fn form(name: &str) -> MedicationForm {
        MedicationForm {
            name: name.into(),
            dosage: "500mg".into(),
            frequency: "2x daily".into(),
            ..MedicationForm::default()
        }
    }

    async fn loaded(api: MockBackend) -> (Arc<MockBackend>, MedicationBoard<MockBackend>) {
        let api = Arc::new(api);
        let board = MedicationBoard::new(api.clone());
        board.load().await.unwrap();
        (api, board)
    }

    #[tokio::test]
    async fn cards_carry_status() {
        let (_, board) = loaded(MockBackend::new().with_medications(vec![
            med(1, "Old", NaiveDate::from_ymd_opt(2020, 1, 1)),
            med(2, "Ongoing", None),
        ]))
        .await;

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let cards = board.cards(&now).unwrap();
        assert_eq!(cards[0].status, MedicationStatus::Expired);
        assert_eq!(cards[1].status, MedicationStatus::Active);
    }

    #[tokio::test]
    async fn load_failure_sets_banner_and_keeps_records() {
        let (api, board) = loaded(MockBackend::new().with_medications(vec![med(1, "A", None)])).await;
        api.fail_next(ClientError::Network("down".into()));

        assert!(board.load().await.is_err());
        assert!(board.banner().unwrap().contains("Could not reach the server"));
        assert_eq!(board.medications().unwrap().len(), 1);

        board.load().await.unwrap();
        assert_eq!(board.banner(), None);
    }

    #[tokio::test]
    async fn create_replaces_placeholder_with_server_record() {
        let (_, board) = loaded(MockBackend::new().with_medications(vec![med(1, "A", None)])).await;

        let created = board.create(&form("Aspirin")).await.unwrap().applied().unwrap();
        let records = board.medications().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], created);
        assert!(!records[0].id.is_provisional());
    }

    #[tokio::test]
    async fn invalid_form_sends_nothing() {
        let (api, board) = loaded(MockBackend::new()).await;

        let err = board.create(&form("  ")).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(api.calls(), vec!["list_medications"]);
        assert!(board.medications().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_create_drops_placeholder() {
        let (api, board) = loaded(MockBackend::new().with_medications(vec![med(1, "A", None)])).await;
        api.fail_next(ClientError::Server {
            status: 400,
            message: Some("name: already exists".into()),
        });

        let err = board.create(&form("A")).await.unwrap_err();
        assert_eq!(err.user_message(), "name: already exists");
        assert_eq!(board.medications().unwrap(), vec![med(1, "A", None)]);
    }

    #[tokio::test]
    async fn failed_update_restores_previous() {
        let original = med(1, "A", None);
        let (api, board) = loaded(MockBackend::new().with_medications(vec![original.clone()])).await;
        api.fail_next(ClientError::Network("timeout".into()));

        assert!(board.update(RecordId(1), &form("Renamed")).await.is_err());
        assert_eq!(board.medications().unwrap(), vec![original]);
    }

    #[tokio::test]
    async fn update_applies_server_version() {
        let (api, board) = loaded(MockBackend::new().with_medications(vec![med(1, "A", None)])).await;

        board.update(RecordId(1), &form("Renamed")).await.unwrap();
        assert_eq!(board.medications().unwrap()[0].name, "Renamed");
        assert_eq!(api.medications()[0].name, "Renamed");
    }

    #[tokio::test]
    async fn failed_delete_reinserts_at_original_position() {
        let (api, board) = loaded(MockBackend::new().with_medications(vec![
            med(1, "A", None),
            med(2, "B", None),
            med(3, "C", None),
        ]))
        .await;
        api.fail_next(ClientError::Server {
            status: 500,
            message: None,
        });

        assert!(board.delete(RecordId(2)).await.is_err());
        let ids: Vec<_> = board.medications().unwrap().iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn double_delete_issues_one_request() {
        let (api, board) = loaded(MockBackend::new().with_medications(vec![med(1, "A", None)])).await;

        assert_eq!(board.delete(RecordId(1)).await.unwrap(), Outcome::Applied(()));
        assert_eq!(board.delete(RecordId(1)).await.unwrap(), Outcome::Discarded);
        let deletes = api.calls().iter().filter(|c| c.starts_with("delete")).count();
        assert_eq!(deletes, 1);
    }

    #[tokio::test]
    async fn not_found_on_delete_counts_as_success() {
        let (api, board) = loaded(MockBackend::new().with_medications(vec![med(1, "A", None)])).await;
        api.fail_next(ClientError::Server {
            status: 404,
            message: Some("Not found.".into()),
        });

        assert!(board.delete(RecordId(1)).await.is_ok());
        assert!(board.medications().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unmounted_board_ignores_results() {
        let api = Arc::new(MockBackend::new().with_medications(vec![med(1, "A", None)]));
        let board = MedicationBoard::new(api.clone());
        board.unmount();

        board.load().await.unwrap();
        assert!(board.medications().unwrap().is_empty());
        assert_eq!(board.create(&form("B")).await.unwrap(), Outcome::Discarded);
        assert_eq!(api.medications().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_double_delete_issues_one_request() {
        let (api, board) = loaded(MockBackend::new().with_medications(vec![med(1, "A", None)])).await;
        let gate = api.hold(Gate::Delete);

        let (first, second) = tokio::join!(board.delete(RecordId(1)), async {
            let second = board.delete(RecordId(1)).await;
            gate.notify_one();
            second
        });

        assert_eq!(first.unwrap(), Outcome::Applied(()));
        assert_eq!(second.unwrap(), Outcome::Discarded);
        assert_eq!(api.calls(), vec!["list_medications", "delete_medication:1"]);
        assert_eq!(board.banner(), None);
        assert!(api.medications().is_empty());
    }

    #[tokio::test]
    async fn delete_while_creating_removes_record_once_saved() {
        let (api, board) = loaded(MockBackend::new()).await;
        let gate = api.hold(Gate::Create);

        let new_form = form("Aspirin");
        let (created, deleted) = tokio::join!(board.create(&new_form), async {
            let placeholder = board.medications().unwrap()[0].id;
            assert!(placeholder.is_provisional());
            let deleted = board.delete(placeholder).await;
            assert!(board.medications().unwrap().is_empty());
            gate.notify_one();
            deleted
        });

        assert_eq!(deleted.unwrap(), Outcome::Applied(()));
        assert_eq!(created.unwrap(), Outcome::Discarded);
        assert_eq!(
            api.calls(),
            vec!["list_medications", "create_medication", "delete_medication:100"]
        );
        assert!(board.medications().unwrap().is_empty());
        assert!(api.medications().is_empty());
    }

    #[tokio::test]
    async fn update_while_creating_sends_nothing() {
        let (api, board) = loaded(MockBackend::new()).await;
        let gate = api.hold(Gate::Create);

        let new_form = form("Aspirin");
        let (created, updated) = tokio::join!(board.create(&new_form), async {
            let placeholder = board.medications().unwrap()[0].id;
            let updated = board.update(placeholder, &form("Aspirin 81")).await;
            gate.notify_one();
            updated
        });

        assert!(matches!(updated, Err(ClientError::NotSaved(_))));
        let created = created.unwrap().applied().unwrap();
        assert_eq!(api.calls(), vec!["list_medications", "create_medication"]);
        assert_eq!(board.medications().unwrap(), vec![created]);
    }
}
