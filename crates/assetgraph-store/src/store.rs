//! Store and file fetcher traits

use assetgraph_core::{AssetIdentity, File};
use std::path::PathBuf;

/// Errors that can occur when reading or writing a store
///
/// Absence is never an error: lookups return `Ok(None)` for it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt data at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Injected failure: {0}")]
    Injected(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Everything a successful run persists, written all-or-nothing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitBatch {
    /// Output files, in resolution order
    pub files: Vec<File>,

    /// Persisted asset states keyed by identity
    pub states: Vec<(AssetIdentity, Vec<u8>)>,
}

impl CommitBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether the batch writes nothing
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.states.is_empty()
    }
}

/// Read access to user-provided files by logical path
#[async_trait::async_trait]
pub trait FileFetcher: Send + Sync {
    /// Fetch one file
    ///
    /// Returns `Ok(None)` when no file exists at `name`.
    async fn fetch_by_name(&self, name: &str) -> Result<Option<File>, StoreError>;

    /// Fetch every file whose logical path matches a glob pattern
    ///
    /// `*` matches within one path segment, `**` matches any number of
    /// segments. Results are sorted by path.
    async fn fetch_by_pattern(&self, pattern: &str) -> Result<Vec<File>, StoreError>;
}

/// Backing medium for persisted asset results
#[async_trait::async_trait]
pub trait Store: FileFetcher {
    /// Get the backend name (e.g., "Disk", "Memory")
    fn name(&self) -> &'static str;

    /// View this store as the file fetcher handed to assets
    fn as_fetcher(&self) -> &dyn FileFetcher;

    /// Load the persisted state of an asset
    ///
    /// `Ok(None)` means the store holds nothing for `identity`. Unreadable
    /// or corrupt data is an error, never a silent miss.
    async fn load(&self, identity: &AssetIdentity) -> Result<Option<Vec<u8>>, StoreError>;

    /// Persist a batch of files and states atomically
    async fn commit(&self, batch: CommitBatch) -> Result<(), StoreError>;

    /// Persist the state of a single asset
    async fn save(&self, identity: &AssetIdentity, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.commit(CommitBatch {
            files: Vec::new(),
            states: vec![(*identity, bytes)],
        })
        .await
    }
}
