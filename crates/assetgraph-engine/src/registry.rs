//! Registry of asset kinds known to an engine

use crate::asset::{Asset, AssetKind};
use crate::error::GraphError;
use assetgraph_core::AssetIdentity;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Creates a fresh, unresolved instance of an asset
pub type AssetFactory = Arc<dyn Fn() -> Box<dyn Asset> + Send + Sync>;

struct Entry {
    name: String,
    dependencies: Vec<AssetIdentity>,
    factory: AssetFactory,
}

/// Maps each identity to a factory for its asset kind
///
/// Every run instantiates its own assets, so nothing resolved in one run is
/// visible to the next except through the store.
#[derive(Default)]
pub struct AssetRegistry {
    entries: BTreeMap<AssetIdentity, Entry>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset kind by its default value
    pub fn register<T: AssetKind>(&mut self) -> Result<&mut Self, GraphError> {
        self.register_factory(|| Box::new(T::default()) as Box<dyn Asset>)
    }

    /// Register an asset kind through a factory
    ///
    /// The identity, name and dependencies are taken from one prototype
    /// instance created at registration time.
    pub fn register_factory<F>(&mut self, factory: F) -> Result<&mut Self, GraphError>
    where
        F: Fn() -> Box<dyn Asset> + Send + Sync + 'static,
    {
        let prototype = factory();
        let identity = prototype.identity();
        if self.entries.contains_key(&identity) {
            return Err(GraphError::DuplicateIdentity(identity));
        }

        self.entries.insert(
            identity,
            Entry {
                name: prototype.name().to_string(),
                dependencies: prototype.dependencies(),
                factory: Arc::new(factory),
            },
        );
        Ok(self)
    }

    /// Create a fresh instance of `identity`
    pub fn instantiate(&self, identity: AssetIdentity) -> Result<Box<dyn Asset>, GraphError> {
        self.entries
            .get(&identity)
            .map(|entry| (entry.factory)())
            .ok_or_else(|| GraphError::UnknownAsset(identity.to_string()))
    }

    pub fn contains(&self, identity: &AssetIdentity) -> bool {
        self.entries.contains_key(identity)
    }

    /// Registered identities, sorted
    pub fn identities(&self) -> Vec<AssetIdentity> {
        self.entries.keys().copied().collect()
    }

    pub fn name(&self, identity: &AssetIdentity) -> Option<&str> {
        self.entries.get(identity).map(|entry| entry.name.as_str())
    }

    /// Declared dependencies of a registered asset
    pub fn dependencies(&self, identity: &AssetIdentity) -> Option<&[AssetIdentity]> {
        self.entries
            .get(identity)
            .map(|entry| entry.dependencies.as_slice())
    }

    /// Look up an asset by identity token or human name (case-insensitive)
    pub fn find(&self, query: &str) -> Option<AssetIdentity> {
        let query = query.trim();
        self.entries
            .iter()
            .find(|(identity, entry)| {
                identity.as_str() == query || entry.name.eq_ignore_ascii_case(query)
            })
            .map(|(identity, _)| *identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for AssetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(identity, entry)| (identity, &entry.name)))
            .finish()
    }
}
