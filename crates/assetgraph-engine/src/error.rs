//! Errors raised while resolving or materializing a graph

use assetgraph_core::{AssetIdentity, ErrorKind};
use assetgraph_store::StoreError;

/// Errors that abort a graph run
///
/// "Not found" is never represented here: stores and assets report absence
/// as `Ok(None)` / `Ok(false)` and resolution falls through to generation.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The store could not read the persisted state of an asset
    #[error("failed to load persisted state of {asset}: {source}")]
    Io {
        asset: AssetIdentity,
        #[source]
        source: StoreError,
    },

    /// Persisted state exists but the asset could not restore itself from it
    #[error("failed to decode persisted state of {asset}: {reason}")]
    Decode { asset: AssetIdentity, reason: String },

    /// The file fetcher failed while an asset read its on-disk input
    #[error("failed to read input of {name}: {reason}")]
    Fetch {
        asset: AssetIdentity,
        name: String,
        reason: String,
    },

    /// The artifact sink could not persist the run
    #[error("failed to commit artifacts: {0}")]
    Commit(#[source] StoreError),

    #[error("dependency cycle detected: {}", format_path(path))]
    CycleDetected { path: Vec<AssetIdentity> },

    /// An asset's own logic failed, including its validation
    #[error("failed to generate {name}: {reason}")]
    Generation {
        asset: AssetIdentity,
        name: String,
        reason: String,
    },

    #[error("failed to encode state of {asset}: {reason}")]
    Encode { asset: AssetIdentity, reason: String },

    #[error("duplicate artifact {path}: produced by both {first} and {second}")]
    DuplicateArtifact {
        path: String,
        first: AssetIdentity,
        second: AssetIdentity,
    },

    #[error("resolution of {asset} was cancelled")]
    Cancelled { asset: AssetIdentity },

    #[error("unknown asset: {0}")]
    UnknownAsset(String),

    #[error("asset identity registered twice: {0}")]
    DuplicateIdentity(AssetIdentity),

    #[error("{asset} read its parents incorrectly: {source}")]
    Parent {
        asset: AssetIdentity,
        #[source]
        source: ParentError,
    },

    /// A dependency of `asset` failed; wraps one recursion level
    #[error("{name}: {source}")]
    Dependency {
        asset: AssetIdentity,
        name: String,
        #[source]
        source: Box<GraphError>,
    },
}

fn format_path(path: &[AssetIdentity]) -> String {
    path.iter()
        .map(AssetIdentity::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl GraphError {
    /// Wrap a dependency failure with the identity of the requesting asset
    pub fn dependency(asset: AssetIdentity, name: impl Into<String>, source: GraphError) -> Self {
        Self::Dependency {
            asset,
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Innermost error, below every `Dependency` wrapper
    pub fn root_cause(&self) -> &GraphError {
        let mut current = self;
        while let GraphError::Dependency { source, .. } = current {
            current = source;
        }
        current
    }

    /// Assets along the failing dependency chain, outermost first
    ///
    /// Ends with the asset the root cause is attributed to, when there is one.
    pub fn chain(&self) -> Vec<AssetIdentity> {
        let mut chain = Vec::new();
        let mut current = self;
        while let GraphError::Dependency { asset, source, .. } = current {
            chain.push(*asset);
            current = source;
        }
        if let Some(asset) = current.asset() {
            if chain.last() != Some(&asset) {
                chain.push(asset);
            }
        }
        chain
    }

    /// Asset this error is attributed to, if any
    pub fn asset(&self) -> Option<AssetIdentity> {
        match self {
            GraphError::Io { asset, .. }
            | GraphError::Decode { asset, .. }
            | GraphError::Fetch { asset, .. }
            | GraphError::Generation { asset, .. }
            | GraphError::Encode { asset, .. }
            | GraphError::Cancelled { asset }
            | GraphError::Parent { asset, .. }
            | GraphError::Dependency { asset, .. } => Some(*asset),
            GraphError::DuplicateArtifact { second, .. } => Some(*second),
            GraphError::DuplicateIdentity(asset) => Some(*asset),
            GraphError::CycleDetected { path } => path.first().copied(),
            GraphError::Commit(_) | GraphError::UnknownAsset(_) => None,
        }
    }

    /// Classify the root cause
    pub fn kind(&self) -> ErrorKind {
        match self.root_cause() {
            GraphError::Io { .. }
            | GraphError::Decode { .. }
            | GraphError::Fetch { .. }
            | GraphError::Commit(_) => ErrorKind::IoFailure,
            GraphError::CycleDetected { .. } => ErrorKind::CycleDetected,
            GraphError::Generation { .. } | GraphError::Encode { .. } | GraphError::Parent { .. } => {
                ErrorKind::GenerationFailure
            }
            GraphError::DuplicateArtifact { .. } => ErrorKind::DuplicateArtifact,
            GraphError::Cancelled { .. } => ErrorKind::Cancelled,
            GraphError::UnknownAsset(_) | GraphError::DuplicateIdentity(_) => ErrorKind::Configuration,
            GraphError::Dependency { .. } => ErrorKind::GenerationFailure,
        }
    }
}

/// Errors from reading a [`ParentSet`](crate::ParentSet)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParentError {
    #[error("{requested} is not a declared dependency of {owner}")]
    Undeclared {
        owner: AssetIdentity,
        requested: AssetIdentity,
    },

    #[error("{requested} is declared by {owner} but was not resolved")]
    Unresolved {
        owner: AssetIdentity,
        requested: AssetIdentity,
    },

    #[error("{identity} does not have the requested type")]
    TypeMismatch { identity: AssetIdentity },
}
