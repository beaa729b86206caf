use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! backend_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value
            #[must_use]
            pub fn value(&self) -> u64 {
                self.0
            }

            /// Zero is what an unselected form control submits; it never names a row.
            #[must_use]
            pub fn is_present(&self) -> bool {
                self.0 != 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map($name::new)
                    .map_err(|_| ParseIdError {
                        kind: stringify!($name),
                    })
            }
        }
    };
}

backend_id!(
    /// Unique identifier for a treatment session
    SessionId
);
backend_id!(
    /// Unique identifier for a treatment plan
    PlanId
);
backend_id!(
    /// Unique identifier for one item of a treatment plan
    PlanItemId
);
backend_id!(
    /// Unique identifier for a consultation (appointment)
    ConsultationId
);
backend_id!(PatientId);
backend_id!(DentistId);
backend_id!(
    /// Unique identifier for a role (user type)
    RoleId
);
backend_id!(
    /// Backend code of a user account
    UserCode
);
backend_id!(BackupId);
backend_id!(AuditEntryId);

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_display() {
        let id = SessionId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(format!("{id:?}"), "SessionId(42)");
    }

    #[test]
    fn test_role_id_from_str() {
        let id: RoleId = " 3 ".parse().unwrap();
        assert_eq!(id, RoleId::new(3));
    }

    #[test]
    fn test_plan_item_id_from_str_invalid() {
        let err = "item-7".parse::<PlanItemId>().unwrap_err();
        assert_eq!(err.to_string(), "failed to parse PlanItemId from string");
    }

    #[test]
    fn zero_is_not_present() {
        assert!(!ConsultationId::new(0).is_present());
        assert!(ConsultationId::new(9).is_present());
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&BackupId::new(15)).unwrap();
        assert_eq!(json, "15");
        let back: BackupId = serde_json::from_str("15").unwrap();
        assert_eq!(back, BackupId::new(15));
    }
}
