//! Asset identities
//!
//! An identity is the stable token naming one asset kind inside a graph.
//! It doubles as the key under which a store persists the asset's state,
//! so it must stay stable across releases.

use serde::{Serialize, Serializer};
use std::fmt;

/// Unique token identifying an asset kind
///
/// Identities are compared by their token only. Two asset kinds registered
/// in the same graph must never share a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetIdentity(&'static str);

impl AssetIdentity {
    /// Create an identity from a static token
    pub const fn new(token: &'static str) -> Self {
        Self(token)
    }

    /// Get the raw token
    pub const fn as_str(&self) -> &'static str {
        self.0
    }

    /// File name used when this asset's state is persisted
    pub fn state_file_name(&self) -> String {
        format!("{}.state", self.0)
    }
}

impl fmt::Display for AssetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl AsRef<str> for AssetIdentity {
    fn as_ref(&self) -> &str {
        self.0
    }
}

impl Serialize for AssetIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const CLUSTER_ID: AssetIdentity = AssetIdentity::new("cluster-id");

    #[test]
    fn identity_display_and_state_file() {
        assert_eq!(CLUSTER_ID.to_string(), "cluster-id");
        assert_eq!(CLUSTER_ID.state_file_name(), "cluster-id.state");
    }

    #[test]
    fn identities_compare_by_token() {
        let mut set = HashSet::new();
        set.insert(CLUSTER_ID);
        set.insert(AssetIdentity::new("cluster-id"));
        set.insert(AssetIdentity::new("metadata"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn identity_serializes_as_string() {
        let json = serde_json::to_string(&CLUSTER_ID).unwrap();
        assert_eq!(json, "\"cluster-id\"");
    }
}
