pub mod enums;
pub mod medication;
pub mod prescription;
pub mod reminder;
pub mod user;

pub use enums::*;
pub use medication::*;
pub use prescription::*;
pub use reminder::*;
pub use user::*;

use serde::{Deserialize, Serialize};

/// Server-assigned record identifier.
///
/// Negative values are provisional: they mark optimistic placeholders that
/// have not been confirmed by the server yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl RecordId {
    pub fn is_provisional(&self) -> bool {
        self.0 < 0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(RecordId)
    }
}
