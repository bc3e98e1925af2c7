//! Client error taxonomy.
//!
//! Validation errors block submission and carry per-field messages. Network
//! and server errors come from the REST boundary. `Unauthorized` is the only
//! error that ends the session.

use thiserror::Error;

use crate::models::RecordId;
use crate::validation::ValidationErrors;

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";
const NETWORK_FAILURE: &str = "Could not reach the server. Check your connection and try again.";
const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";
const FIX_FIELDS: &str = "Please correct the highlighted fields.";
const STILL_SAVING: &str = "Still saving. Try again in a moment.";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server { status: u16, message: Option<String> },

    #[error("Authentication required")]
    Unauthorized,

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Token storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Lock poisoned")]
    LockPoisoned,

    /// The record has only a provisional id; its create is still in flight.
    #[error("Record {0} is not saved yet")]
    NotSaved(RecordId),
}

impl ClientError {
    /// Message to show the user. Server-provided text wins; everything
    /// else maps to a fixed fallback.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(_) => FIX_FIELDS.to_string(),
            ClientError::Network(_) => NETWORK_FAILURE.to_string(),
            ClientError::Server {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            ClientError::Unauthorized => SESSION_EXPIRED.to_string(),
            ClientError::NotSaved(_) => STILL_SAVING.to_string(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Server { status: 404, .. })
    }

    /// True when the user must sign in again.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }
}

impl From<ValidationErrors> for ClientError {
    fn from(errors: ValidationErrors) -> Self {
        ClientError::Validation(errors)
    }
}
