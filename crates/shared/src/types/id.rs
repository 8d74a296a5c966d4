//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `ContractId` where a `RefundCaseId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(ContractId, "Unique identifier for a prepaid lesson contract.");
typed_id!(PaymentId, "Unique identifier for a payment record.");
typed_id!(ConsumptionId, "Unique identifier for a consumption record.");
typed_id!(RefundCaseId, "Unique identifier for a refund case.");
typed_id!(CashFlowEventId, "Unique identifier for a cash flow event.");
typed_id!(SettlementId, "Unique identifier for a daily settlement report.");
typed_id!(ForecastOverrideId, "Unique identifier for a forecast override.");
typed_id!(CustomerId, "Unique identifier for a customer (student account).");
typed_id!(PackageId, "Unique identifier for a course package.");
typed_id!(LocationId, "Unique identifier for a campus location.");
typed_id!(TeacherId, "Unique identifier for a teacher.");
typed_id!(OperatorId, "Unique identifier for the staff member performing an operation.");

impl LocationId {
    /// Location key used where "no location" must still be a concrete value,
    /// e.g. the ledger-wide forecast override row.
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Maps the nil key back to `None`.
    #[must_use]
    pub fn non_nil(self) -> Option<Self> {
        if self.0.is_nil() { None } else { Some(self) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_time_ordered() {
        let a = ContractId::new();
        let b = ContractId::new();
        assert_ne!(a, b);
        assert!(a.into_inner() <= b.into_inner());
    }

    #[test]
    fn test_parse_and_display() {
        let id = RefundCaseId::new();
        let parsed: RefundCaseId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<RefundCaseId>().is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let uuid = Uuid::now_v7();
        let json = serde_json::to_string(&PaymentId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
    }

    #[test]
    fn test_nil_location() {
        assert_eq!(LocationId::nil().non_nil(), None);
        let loc = LocationId::new();
        assert_eq!(loc.non_nil(), Some(loc));
    }
}
