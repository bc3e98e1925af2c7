use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RecordId, RepeatMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: RecordId,
    /// Owning medication. Non-owning reference by id.
    pub medication: RecordId,
    /// Denormalized by the server on list responses.
    #[serde(default)]
    pub medication_name: Option<String>,
    pub scheduled_time: DateTime<Utc>,
    #[serde(default)]
    pub repeat: RepeatMode,
    #[serde(default)]
    pub is_done: bool,
}

impl Reminder {
    pub fn with_done(&self, is_done: bool) -> Self {
        Self {
            is_done,
            ..self.clone()
        }
    }
}

/// Body for `POST /api/reminders/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReminder {
    pub medication: RecordId,
    pub scheduled_time: DateTime<Utc>,
    pub repeat: RepeatMode,
    pub is_done: bool,
}

impl NewReminder {
    pub fn to_reminder(&self, id: RecordId) -> Reminder {
        Reminder {
            id,
            medication: self.medication,
            medication_name: None,
            scheduled_time: self.scheduled_time,
            repeat: self.repeat,
            is_done: self.is_done,
        }
    }
}

/// Body for `PATCH /api/reminders/{id}/`. Only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReminderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_done: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatMode>,
}

impl ReminderPatch {
    pub fn done(is_done: bool) -> Self {
        Self {
            is_done: Some(is_done),
            ..Self::default()
        }
    }
}

/// Query parameters for `GET /api/reminders/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReminderFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_done: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering: Option<String>,
}

/// Response of `POST /api/reminders/{id}/send_test/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationReceipt {
    #[serde(default)]
    pub message: String,
}
