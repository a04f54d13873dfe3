//! Resolved dependencies handed to an asset at generation time

use crate::asset::{downcast_ref, Asset, AssetKind};
use crate::error::ParentError;
use assetgraph_core::AssetIdentity;
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only view of the direct dependencies an asset declared
///
/// Only declared identities can be inserted or read; anything else is a
/// [`ParentError::Undeclared`].
#[derive(Clone)]
pub struct ParentSet {
    owner: AssetIdentity,
    declared: Vec<AssetIdentity>,
    entries: HashMap<AssetIdentity, Arc<dyn Asset>>,
}

impl ParentSet {
    /// Create an empty set for `owner` with its declared dependencies
    pub fn new(owner: AssetIdentity, declared: Vec<AssetIdentity>) -> Self {
        Self {
            owner,
            declared,
            entries: HashMap::new(),
        }
    }

    /// Add a resolved dependency
    pub fn insert(&mut self, asset: Arc<dyn Asset>) -> Result<(), ParentError> {
        let identity = asset.identity();
        self.check_declared(identity)?;
        self.entries.insert(identity, asset);
        Ok(())
    }

    /// Typed lookup of a declared dependency
    pub fn get<T: AssetKind>(&self) -> Result<&T, ParentError> {
        let asset = self.get_dyn(T::IDENTITY)?;
        downcast_ref::<T>(asset).ok_or(ParentError::TypeMismatch {
            identity: T::IDENTITY,
        })
    }

    /// Type-erased lookup of a declared dependency
    pub fn get_dyn(&self, identity: AssetIdentity) -> Result<&dyn Asset, ParentError> {
        self.check_declared(identity)?;
        self.entries
            .get(&identity)
            .map(|asset| &**asset)
            .ok_or(ParentError::Unresolved {
                owner: self.owner,
                requested: identity,
            })
    }

    pub fn contains(&self, identity: &AssetIdentity) -> bool {
        self.entries.contains_key(identity)
    }

    /// Asset these parents belong to
    pub fn owner(&self) -> AssetIdentity {
        self.owner
    }

    /// Declared dependencies, in declaration order
    pub fn identities(&self) -> &[AssetIdentity] {
        &self.declared
    }

    /// Number of resolved entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_declared(&self, identity: AssetIdentity) -> Result<(), ParentError> {
        if self.declared.contains(&identity) {
            Ok(())
        } else {
            Err(ParentError::Undeclared {
                owner: self.owner,
                requested: identity,
            })
        }
    }
}

impl std::fmt::Debug for ParentSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut resolved: Vec<_> = self.entries.keys().collect();
        resolved.sort();
        f.debug_struct("ParentSet")
            .field("owner", &self.owner)
            .field("declared", &self.declared)
            .field("resolved", &resolved)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetContext;

    #[derive(Debug, Default)]
    struct Region {
        name: String,
    }

    #[async_trait::async_trait]
    impl Asset for Region {
        fn identity(&self) -> AssetIdentity {
            Self::IDENTITY
        }

        fn name(&self) -> &str {
            "Region"
        }

        async fn generate(&mut self, _ctx: &AssetContext, _parents: &ParentSet) -> anyhow::Result<()> {
            self.name = "us-east1".to_string();
            Ok(())
        }
    }

    impl AssetKind for Region {
        const IDENTITY: AssetIdentity = AssetIdentity::new("region");
    }

    #[derive(Debug, Default)]
    struct Zone;

    #[async_trait::async_trait]
    impl Asset for Zone {
        fn identity(&self) -> AssetIdentity {
            Self::IDENTITY
        }

        fn name(&self) -> &str {
            "Zone"
        }

        async fn generate(&mut self, _ctx: &AssetContext, _parents: &ParentSet) -> anyhow::Result<()> {
            Ok(())
        }
    }

    impl AssetKind for Zone {
        const IDENTITY: AssetIdentity = AssetIdentity::new("zone");
    }

    const OWNER: AssetIdentity = AssetIdentity::new("machines");

    #[test]
    fn typed_lookup_of_declared_parent() {
        let mut parents = ParentSet::new(OWNER, vec![Region::IDENTITY]);
        parents
            .insert(Arc::new(Region {
                name: "europe-west4".to_string(),
            }))
            .unwrap();

        let region = parents.get::<Region>().unwrap();
        assert_eq!(region.name, "europe-west4");
        assert_eq!(parents.len(), 1);
        assert!(parents.contains(&Region::IDENTITY));
    }

    #[test]
    fn undeclared_parent_is_rejected() {
        let mut parents = ParentSet::new(OWNER, vec![Region::IDENTITY]);

        let err = parents.insert(Arc::new(Zone)).unwrap_err();
        assert_eq!(
            err,
            ParentError::Undeclared {
                owner: OWNER,
                requested: Zone::IDENTITY
            }
        );
        assert!(matches!(parents.get::<Zone>(), Err(ParentError::Undeclared { .. })));
    }

    #[test]
    fn declared_but_missing_parent() {
        let parents = ParentSet::new(OWNER, vec![Region::IDENTITY]);
        assert!(matches!(
            parents.get_dyn(Region::IDENTITY),
            Err(ParentError::Unresolved { .. })
        ));
    }
}
