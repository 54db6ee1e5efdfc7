//! Record status shared by patients and appointments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Lifecycle status of a patient record or appointment.
///
/// Every transition between the three values is permitted and none of them is
/// terminal; the dashboard lets staff flip a record back and forth freely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    /// Newly created, awaiting confirmation
    #[default]
    Pending,
    /// Confirmed by clinic staff
    Confirmed,
    /// Cancelled
    Cancelled,
}

impl RecordStatus {
    /// All statuses in the order they are offered in a status picker.
    pub const ALL: [RecordStatus; 3] = [
        RecordStatus::Pending,
        RecordStatus::Confirmed,
        RecordStatus::Cancelled,
    ];

    /// Stored and displayed form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "Pending",
            RecordStatus::Confirmed => "Confirmed",
            RecordStatus::Cancelled => "Cancelled",
        }
    }

    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(&self, _next: RecordStatus) -> bool {
        true
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(RecordStatus::Pending),
            "Confirmed" => Ok(RecordStatus::Confirmed),
            "Cancelled" => Ok(RecordStatus::Cancelled),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_pending() {
        assert_eq!(RecordStatus::default(), RecordStatus::Pending);
    }

    #[test]
    fn test_parse_round_trips_display() {
        for status in RecordStatus::ALL {
            assert_eq!(status.to_string().parse::<RecordStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("Completed".parse::<RecordStatus>().is_err());
        // Stored values are case-sensitive
        assert!("pending".parse::<RecordStatus>().is_err());
    }

    #[test]
    fn test_every_transition_allowed() {
        for from in RecordStatus::ALL {
            for to in RecordStatus::ALL {
                assert!(from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn test_serde_uses_display_names() {
        let json = serde_json::to_string(&RecordStatus::Confirmed).unwrap();
        assert_eq!(json, "\"Confirmed\"");
        let parsed: RecordStatus = serde_json::from_str("\"Cancelled\"").unwrap();
        assert_eq!(parsed, RecordStatus::Cancelled);
    }
}
