//! Identifier and timestamp types shared across the tracker.
//!
//! The backend issues session and job ids as integers today, but the
//! client treats both as opaque strings so either JSON representation
//! decodes to the same value.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Accepts a JSON number or string and yields its textual form.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Int(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

macro_rules! define_opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into()))
            }
        }
    };
}

define_opaque_id! {
    /// Server-issued identifier for one client visit.
    SessionId
}

define_opaque_id! {
    /// Server-issued identifier for one submitted analysis job.
    JobId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_string_ids_decode_to_same_value() {
        let from_num: JobId = serde_json::from_str("42").unwrap();
        let from_str: JobId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(from_num, from_str);
        assert_eq!(from_num.as_str(), "42");
    }

    #[test]
    fn id_serializes_as_plain_string() {
        let id = SessionId::new("7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"7\"");
        assert_eq!(id.to_string(), "7");
    }

    #[test]
    fn non_scalar_id_is_rejected() {
        assert!(serde_json::from_str::<JobId>("{}").is_err());
    }
}
