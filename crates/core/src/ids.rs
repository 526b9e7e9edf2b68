//! Identifiers
//!
//! All identities are opaque strings. Generated ids carry a short prefix
//! (`CASE-`, `PAY-`, `ORD-`) so they are recognisable in logs and audit rows.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True if the identifier is empty or whitespace
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identity of a case (support ticket or sale listing)
    CaseId
);
string_id!(
    /// Identity of a payment attempt
    PaymentId
);
string_id!(
    /// Externally visible order reference quoted by the customer on transfer
    OrderRef
);
string_id!(
    /// Identity of a customer, operator, administrator or the system itself
    ActorId
);

fn short_uuid(len: usize) -> String {
    uuid::Uuid::new_v4().simple().to_string()[..len].to_uppercase()
}

impl CaseId {
    pub fn generate() -> Self {
        Self(format!("CASE-{}", short_uuid(12)))
    }
}

impl PaymentId {
    pub fn generate() -> Self {
        Self(format!("PAY-{}", short_uuid(12)))
    }
}

impl OrderRef {
    pub fn generate() -> Self {
        Self(format!("ORD-{}", short_uuid(10)))
    }
}

impl ActorId {
    /// Actor used for scheduler-driven operations (retention sweep)
    pub fn system() -> Self {
        Self("system".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_prefixes() {
        assert!(CaseId::generate().as_str().starts_with("CASE-"));
        assert!(PaymentId::generate().as_str().starts_with("PAY-"));
        assert!(OrderRef::generate().as_str().starts_with("ORD-"));
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(OrderRef::generate(), OrderRef::generate());
    }

    #[test]
    fn test_blank_detection() {
        assert!(ActorId::new("  ").is_blank());
        assert!(!ActorId::new("op-1").is_blank());
    }

    #[test]
    fn test_transparent_serde() {
        let id = CaseId::new("CASE-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"CASE-1\"");
    }
}
