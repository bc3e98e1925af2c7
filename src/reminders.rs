//! Reminder board: today's list, counts, and done toggling.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone};

use crate::api::ReminderApi;
use crate::collection;
use crate::derived;
use crate::error::ClientError;
use crate::models::{NotificationReceipt, RecordId, Reminder, ReminderFilter, ReminderPatch};
use crate::store::{Change, Outcome, RecordStore};
use crate::validation::{validate_reminder, ReminderForm};

pub struct ReminderBoard<A: ReminderApi + ?Sized> {
    api: Arc<A>,
    store: RecordStore<Reminder>,
    banner: Mutex<Option<String>>,
}

impl<A: ReminderApi + ?Sized> ReminderBoard<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            store: RecordStore::default(),
            banner: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &RecordStore<Reminder> {
        &self.store
    }

    pub async fn load(&self, filter: &ReminderFilter) -> Result<(), ClientError> {
        match self.api.list_reminders(filter).await {
            Ok(reminders) => {
                tracing::debug!(count = reminders.len(), "Reminders loaded");
                self.store.replace_all(reminders)?;
                self.set_banner(None);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load reminders");
                self.set_banner(Some(e.user_message()));
                Err(e)
            }
        }
    }

    pub fn banner(&self) -> Option<String> {
        self.banner.lock().ok().and_then(|b| b.clone())
    }

    fn set_banner(&self, message: Option<String>) {
        if let Ok(mut banner) = self.banner.lock() {
            *banner = message;
        }
    }

    pub fn reminders(&self) -> Result<Vec<Reminder>, ClientError> {
        self.store.records()
    }

    pub fn todays<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Vec<Reminder>, ClientError> {
        Ok(derived::todays_reminders(&self.store.records()?, now))
    }

    pub fn upcoming_count<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<usize, ClientError> {
        Ok(derived::upcoming_count(&self.store.records()?, now))
    }

    pub fn active_count(&self) -> Result<usize, ClientError> {
        Ok(derived::active_count(&self.store.records()?))
    }

    pub async fn create(&self, form: &ReminderForm) -> Result<Outcome<Reminder>, ClientError> {
        let new_reminder = validate_reminder(form)?;
        let placeholder = new_reminder.to_reminder(self.store.provisional_id());
        let outcome = self
            .store
            .mutate(
                Change::Insert(placeholder),
                self.api.create_reminder(&new_reminder),
                |created: &Reminder| Some(created.clone()),
            )
            .await?;
        match outcome {
            Outcome::Withdrawn(created) => {
                tracing::info!(id = %created.id, "Reminder deleted before create finished");
                match self.api.delete_reminder(created.id).await {
                    Err(e) if !e.is_not_found() => Err(e),
                    _ => Ok(Outcome::Discarded),
                }
            }
            other => Ok(other),
        }
    }

    /// Flip the done flag.
    pub async fn toggle_done(&self, id: RecordId) -> Result<Outcome<Reminder>, ClientError> {
        match self.store.get(id)? {
            Some(current) => self.set_done(id, !current.is_done).await,
            None => Ok(Outcome::Discarded),
        }
    }

    /// Set the done flag, showing it immediately.
    pub async fn set_done(&self, id: RecordId, is_done: bool) -> Result<Outcome<Reminder>, ClientError> {
        if id.is_provisional() {
            return Err(ClientError::NotSaved(id));
        }
        let toggled = collection::apply_optimistic_toggle(&self.store.records()?, id, is_done);
        let Some(optimistic) = collection::find(&toggled, id).cloned() else {
            return Ok(Outcome::Discarded);
        };

        let outcome = self
            .store
            .mutate(
                Change::Replace(optimistic),
                self.api.update_reminder(id, &ReminderPatch::done(is_done)),
                |updated: &Reminder| Some(updated.clone()),
            )
            .await?;
        tracing::debug!(%id, is_done, applied = matches!(outcome, Outcome::Applied(_)), "Reminder done flag set");
        Ok(outcome)
    }

    /// Delete a reminder. A placeholder still being created is pulled
    /// locally and deleted once its create returns.
    pub async fn delete(&self, id: RecordId) -> Result<Outcome<()>, ClientError> {
        if id.is_provisional() {
            return Ok(if self.store.withdraw(id)? {
                Outcome::Applied(())
            } else {
                Outcome::Discarded
            });
        }
        if !self.store.contains(id)? {
            tracing::debug!(%id, "Reminder already removed");
            return Ok(Outcome::Discarded);
        }
        let api = &self.api;
        let request = async move {
            match api.delete_reminder(id).await {
                Err(e) if e.is_not_found() => Ok(()),
                other => other,
            }
        };
        self.store.mutate(Change::Remove(id), request, |_| None).await
    }

    /// Ask the server to push a test notification for this reminder.
    pub async fn send_test(&self, id: RecordId) -> Result<Outcome<NotificationReceipt>, ClientError> {
        if id.is_provisional() {
            return Err(ClientError::NotSaved(id));
        }
        let outcome = self
            .store
            .mutate(
                Change::Nothing,
                self.api.send_test_notification(id),
                |_| None,
            )
            .await?;
        tracing::info!(%id, "Test notification requested");
        Ok(outcome)
    }

    /// Drop reminders of a deleted medication. The server cascades the
    /// delete on its side.
    pub fn drop_for_medication(&self, medication: RecordId) -> Result<(), ClientError> {
        self.store
            .update(|reminders| collection::remove_reminders_for(reminders, medication))
    }

    pub fn unmount(&self) {
        self.store.unmount();
    }
}

impl<A: ReminderApi + ?Sized> Drop for ReminderBoard<A> {
    fn drop(&mut self) {
        self.store.unmount();
    }
}
