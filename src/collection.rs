//! Ordered record collections and the optimistic edits applied to them.
//!
//! Every function returns a new collection and leaves its input untouched.
//! An identifier that is not present is never an error: the result is
//! simply equal to the input, which makes late responses and repeated
//! deletes harmless.

use crate::models::{Medication, RecordId, Reminder};

/// A record the server identifies by id.
pub trait Identified: Clone {
    fn id(&self) -> RecordId;
}

impl Identified for Medication {
    fn id(&self) -> RecordId {
        self.id
    }
}

impl Identified for Reminder {
    fn id(&self) -> RecordId {
        self.id
    }
}

pub fn position<T: Identified>(collection: &[T], id: RecordId) -> Option<usize> {
    collection.iter().position(|item| item.id() == id)
}

pub fn find<T: Identified>(collection: &[T], id: RecordId) -> Option<&T> {
    collection.iter().find(|item| item.id() == id)
}

/// Set the completion flag of one reminder.
pub fn apply_optimistic_toggle(reminders: &[Reminder], id: RecordId, is_done: bool) -> Vec<Reminder> {
    reminders
        .iter()
        .map(|r| if r.id == id { r.with_done(is_done) } else { r.clone() })
        .collect()
}

pub fn apply_optimistic_removal<T: Identified>(collection: &[T], id: RecordId) -> Vec<T> {
    collection
        .iter()
        .filter(|item| item.id() != id)
        .cloned()
        .collect()
}

/// Replace the element sharing the record's id. Unknown ids are ignored.
pub fn merge_server_record<T: Identified>(collection: &[T], record: T) -> Vec<T> {
    replace_record(collection, record.id(), record)
}

/// Replace the element with id `target` by `record`, which may carry a
/// different id (a provisional placeholder being confirmed). Any other
/// element already holding the record's id is dropped so ids stay unique.
pub fn replace_record<T: Identified>(collection: &[T], target: RecordId, record: T) -> Vec<T> {
    if position(collection, target).is_none() {
        return collection.to_vec();
    }
    let new_id = record.id();
    let mut record = Some(record);
    collection
        .iter()
        .filter_map(|item| {
            if item.id() == target {
                record.take()
            } else if item.id() == new_id {
                None
            } else {
                Some(item.clone())
            }
        })
        .collect()
}

/// Add a newly created record at the front (server order is newest first).
/// A record whose id is already present is merged in place instead.
pub fn insert_server_record<T: Identified>(collection: &[T], record: T) -> Vec<T> {
    if position(collection, record.id()).is_some() {
        return merge_server_record(collection, record);
    }
    let mut out = Vec::with_capacity(collection.len() + 1);
    out.push(record);
    out.extend(collection.iter().cloned());
    out
}

/// Drop reminders that belong to a medication (the server deletes them
/// together with the medication).
pub fn remove_reminders_for(reminders: &[Reminder], medication: RecordId) -> Vec<Reminder> {
    reminders
        .iter()
        .filter(|r| r.medication != medication)
        .cloned()
        .collect()
}
