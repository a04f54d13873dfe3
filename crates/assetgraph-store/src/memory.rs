//! In-memory store for testing
//!
//! This store keeps asset states and files in memory and never touches the
//! file system. It's useful for:
//! - Unit testing resolver and sink behaviour
//! - Simulating corrupt or unreadable persisted data
//! - Simulating slow backends and failed commits
//!
//! ## Usage
//!
//! ```rust,ignore
//! use assetgraph_store::{MemoryStore, Store};
//!
//! let store = MemoryStore::new();
//! store.add_state(CLUSTER_ID, b"{...}".to_vec()).await;
//!
//! let bytes = store.load(&CLUSTER_ID).await?;
//! ```
//!
//! ## Simulating Failures
//!
//! ```rust,ignore
//! // Loading this identity fails with an I/O-style error
//! store.add_load_error(CLUSTER_ID, "permission denied").await;
//!
//! // Every commit fails
//! let store = MemoryStore::new().with_commit_failure("disk full");
//! ```

use crate::pattern;
use crate::store::{CommitBatch, FileFetcher, Store, StoreError};
use assetgraph_core::{AssetIdentity, File};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Counters {
    loads: AtomicUsize,
    fetches: AtomicUsize,
    commits: AtomicUsize,
}

/// In-memory store
///
/// Clones share the same contents, so a test can hand one clone to the
/// engine and inspect another afterwards.
pub struct MemoryStore {
    /// Persisted asset states by identity
    states: Arc<RwLock<HashMap<AssetIdentity, Vec<u8>>>>,

    /// Files by logical path
    files: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,

    /// Errors returned by `load` for specific identities
    load_errors: Arc<RwLock<HashMap<AssetIdentity, String>>>,

    /// Errors returned by fetches for specific paths
    fetch_errors: Arc<RwLock<HashMap<String, String>>>,

    /// Make every commit fail with this message
    commit_failure: Option<String>,

    /// Simulate backend latency (milliseconds)
    latency_ms: u64,

    counters: Arc<Counters>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            files: Arc::new(RwLock::new(BTreeMap::new())),
            load_errors: Arc::new(RwLock::new(HashMap::new())),
            fetch_errors: Arc::new(RwLock::new(HashMap::new())),
            commit_failure: None,
            latency_ms: 0,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Add persisted state for an asset
    pub async fn add_state(&self, identity: AssetIdentity, bytes: Vec<u8>) {
        self.states.write().await.insert(identity, bytes);
    }

    /// Add a user-provided file
    pub async fn add_file(&self, file: File) {
        self.files.write().await.insert(file.path, file.data);
    }

    /// Make `load` fail for a specific identity
    pub async fn add_load_error(&self, identity: AssetIdentity, message: impl Into<String>) {
        self.load_errors.write().await.insert(identity, message.into());
    }

    /// Make fetches of a specific path fail
    pub async fn add_fetch_error(&self, path: impl Into<String>, message: impl Into<String>) {
        self.fetch_errors.write().await.insert(path.into(), message.into());
    }

    /// Configure every commit to fail
    pub fn with_commit_failure(mut self, message: impl Into<String>) -> Self {
        self.commit_failure = Some(message.into());
        self
    }

    /// Configure simulated latency for every operation
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Get the persisted state of an asset without counting a load
    pub async fn state(&self, identity: &AssetIdentity) -> Option<Vec<u8>> {
        self.states.read().await.get(identity).cloned()
    }

    /// Get a stored file without counting a fetch
    pub async fn file(&self, path: &str) -> Option<File> {
        self.files
            .read()
            .await
            .get(path)
            .map(|data| File::new(path, data.clone()))
    }

    /// All stored file paths, sorted
    pub async fn file_paths(&self) -> Vec<String> {
        self.files.read().await.keys().cloned().collect()
    }

    /// Number of persisted states
    pub async fn state_count(&self) -> usize {
        self.states.read().await.len()
    }

    /// Number of `load` calls served
    pub fn load_count(&self) -> usize {
        self.counters.loads.load(Ordering::SeqCst)
    }

    /// Number of fetch calls served
    pub fn fetch_count(&self) -> usize {
        self.counters.fetches.load(Ordering::SeqCst)
    }

    /// Number of successful commits
    pub fn commit_count(&self) -> usize {
        self.counters.commits.load(Ordering::SeqCst)
    }

    /// Remove all states and files
    pub async fn clear(&self) {
        self.states.write().await.clear();
        self.files.write().await.clear();
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }

    async fn fetch_error(&self, path: &str) -> Option<StoreError> {
        self.fetch_errors
            .read()
            .await
            .get(path)
            .map(|message| StoreError::Injected(message.clone()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            states: Arc::clone(&self.states),
            files: Arc::clone(&self.files),
            load_errors: Arc::clone(&self.load_errors),
            fetch_errors: Arc::clone(&self.fetch_errors),
            commit_failure: self.commit_failure.clone(),
            latency_ms: self.latency_ms,
            counters: Arc::clone(&self.counters),
        }
    }
}

#[async_trait::async_trait]
impl FileFetcher for MemoryStore {
    async fn fetch_by_name(&self, name: &str) -> Result<Option<File>, StoreError> {
        self.simulate_latency().await;
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.fetch_error(name).await {
            return Err(error);
        }

        Ok(self
            .files
            .read()
            .await
            .get(name)
            .map(|data| File::new(name, data.clone())))
    }

    async fn fetch_by_pattern(&self, glob: &str) -> Result<Vec<File>, StoreError> {
        self.simulate_latency().await;
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);

        let files = self.files.read().await;
        let mut matched = Vec::new();
        for (path, data) in files.iter().filter(|(path, _)| pattern::matches(glob, path)) {
            if let Some(error) = self.fetch_error(path).await {
                return Err(error);
            }
            matched.push(File::new(path.clone(), data.clone()));
        }
        Ok(matched)
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "Memory"
    }

    fn as_fetcher(&self) -> &dyn FileFetcher {
        self
    }

    async fn load(&self, identity: &AssetIdentity) -> Result<Option<Vec<u8>>, StoreError> {
        self.simulate_latency().await;
        self.counters.loads.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.load_errors.read().await.get(identity) {
            return Err(StoreError::Injected(message.clone()));
        }

        Ok(self.states.read().await.get(identity).cloned())
    }

    async fn commit(&self, batch: CommitBatch) -> Result<(), StoreError> {
        self.simulate_latency().await;

        if let Some(message) = &self.commit_failure {
            return Err(StoreError::Injected(message.clone()));
        }

        let mut staged = Vec::with_capacity(batch.files.len());
        for file in batch.files {
            let path = File::normalize_path(&file.path).map_err(StoreError::InvalidPath)?;
            staged.push((path, file.data));
        }

        // Both locks are held for the whole write so readers never observe half a commit.
        let mut states = self.states.write().await;
        let mut files = self.files.write().await;
        for (path, data) in staged {
            files.insert(path, data);
        }
        for (identity, bytes) in batch.states {
            states.insert(identity, bytes);
        }

        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Builder for creating a MemoryStore with predefined contents
///
/// # Example
///
/// ```rust,ignore
/// let store = MemoryStoreBuilder::new()
///     .with_state(CLUSTER_ID, br#"{"uuid":"..."}"#.to_vec())
///     .with_file(File::new("install-config.yaml", yaml))
///     .with_latency(5)
///     .build();
/// ```
pub struct MemoryStoreBuilder {
    states: HashMap<AssetIdentity, Vec<u8>>,
    files: BTreeMap<String, Vec<u8>>,
    load_errors: HashMap<AssetIdentity, String>,
    fetch_errors: HashMap<String, String>,
    commit_failure: Option<String>,
    latency_ms: u64,
}

impl MemoryStoreBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            files: BTreeMap::new(),
            load_errors: HashMap::new(),
            fetch_errors: HashMap::new(),
            commit_failure: None,
            latency_ms: 0,
        }
    }

    /// Add persisted state for an asset
    pub fn with_state(mut self, identity: AssetIdentity, bytes: impl Into<Vec<u8>>) -> Self {
        self.states.insert(identity, bytes.into());
        self
    }

    /// Add a user-provided file
    pub fn with_file(mut self, file: File) -> Self {
        self.files.insert(file.path, file.data);
        self
    }

    /// Make `load` fail for an identity
    pub fn with_load_error(mut self, identity: AssetIdentity, message: impl Into<String>) -> Self {
        self.load_errors.insert(identity, message.into());
        self
    }

    /// Make fetches of a path fail
    pub fn with_fetch_error(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.fetch_errors.insert(path.into(), message.into());
        self
    }

    /// Make every commit fail
    pub fn with_commit_failure(mut self, message: impl Into<String>) -> Self {
        self.commit_failure = Some(message.into());
        self
    }

    /// Configure latency
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Build the MemoryStore
    pub fn build(self) -> MemoryStore {
        MemoryStore {
            states: Arc::new(RwLock::new(self.states)),
            files: Arc::new(RwLock::new(self.files)),
            load_errors: Arc::new(RwLock::new(self.load_errors)),
            fetch_errors: Arc::new(RwLock::new(self.fetch_errors)),
            commit_failure: self.commit_failure,
            latency_ms: self.latency_ms,
            counters: Arc::new(Counters::default()),
        }
    }
}

impl Default for MemoryStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
