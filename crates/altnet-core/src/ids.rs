use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! branded_id {
    ($name:ident, $prefix:expr) => {
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

branded_id!(RecordId, "rec");
branded_id!(ExplorationId, "expl");
branded_id!(NodeId, "node");
branded_id!(VisitId, "visit");

impl NodeId {
    /// Virtual trees reuse the record id as the node id.
    pub fn for_record(record_id: &RecordId) -> Self {
        Self(record_id.as_str().to_owned())
    }
}

impl ExplorationId {
    /// Synthetic lineage key for records that never received an exploration id.
    pub fn virtual_for_url(url: &str) -> Self {
        Self(format!("url:{url}"))
    }

    pub fn is_virtual(&self) -> bool {
        self.0.starts_with("url:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_has_prefix() {
        let id = RecordId::new();
        assert!(id.as_str().starts_with("rec_"), "got: {id}");
    }

    #[test]
    fn exploration_id_has_prefix() {
        let id = ExplorationId::new();
        assert!(id.as_str().starts_with("expl_"), "got: {id}");
        assert!(!id.is_virtual());
    }

    #[test]
    fn node_id_has_prefix() {
        let id = NodeId::new();
        assert!(id.as_str().starts_with("node_"), "got: {id}");
    }

    #[test]
    fn virtual_exploration_id() {
        let id = ExplorationId::virtual_for_url("wiki.alt/cats");
        assert_eq!(id.as_str(), "url:wiki.alt/cats");
        assert!(id.is_virtual());
    }

    #[test]
    fn node_id_for_record_reuses_value() {
        let rec = RecordId::from_raw("rec_123");
        assert_eq!(NodeId::for_record(&rec).as_str(), "rec_123");
    }

    #[test]
    fn display_and_from_str_roundtrip() {
        let id = ExplorationId::new();
        let parsed: ExplorationId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_is_transparent() {
        let id = RecordId::from_raw("rec_abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"rec_abc\"");
    }

    #[test]
    fn monotonic_ordering() {
        let ids: Vec<RecordId> = (0..100).map(|_| RecordId::new()).collect();
        for w in ids.windows(2) {
            assert!(w[0] < w[1], "not monotonic: {} >= {}", w[0], w[1]);
        }
    }
}
