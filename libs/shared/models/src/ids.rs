//! Canonical identifiers.
//!
//! Every row id crossing the persistence boundary is a UUID wrapped in its own
//! type, so a professional id can never be passed where an appointment id is
//! expected. Ids are parsed once, at the HTTP edge.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {kind} id: '{value}'")]
pub struct InvalidId {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! canonical_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub const KIND: &'static str = $kind;

            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = InvalidId;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| InvalidId { kind: $kind, value: s.to_string() })
            }
        }
    };
}

canonical_id!(
    /// A professional offering sessions.
    ProfessionalId,
    "professional"
);
canonical_id!(PatientId, "patient");
canonical_id!(
    /// An appointment. Stored as a UUID everywhere; no legacy `APT-` strings.
    AppointmentId,
    "appointment"
);
canonical_id!(
    /// Row id of a rule, override or blocked slot.
    RecordId,
    "record"
);

impl From<InvalidId> for crate::error::AppError {
    fn from(err: InvalidId) -> Self {
        crate::error::AppError::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_canonical_uuid() {
        let raw = "d5cfacac-cb98-46f0-bde0-41d8f6a2424c";
        let id: ProfessionalId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
    }

    #[test]
    fn test_legacy_formats_are_rejected() {
        assert_matches!(
            "APT-00000042".parse::<AppointmentId>(),
            Err(InvalidId { kind: "appointment", .. })
        );
        assert!("42".parse::<AppointmentId>().is_err());
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = AppointmentId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
        let back: AppointmentId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }
}
