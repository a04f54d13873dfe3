//! Artifact sink
//!
//! Turns a successful [`Resolution`] into one [`CommitBatch`] and hands it
//! to the store. Nothing is written unless the whole graph resolved.

use crate::error::GraphError;
use crate::resolver::Resolution;
use assetgraph_core::{AssetIdentity, File};
use assetgraph_store::{CommitBatch, Store};
use std::collections::HashMap;
use tracing::{debug, info};

/// Materializes the output of a resolved graph
pub struct ArtifactSink<'a> {
    store: &'a dyn Store,
}

impl<'a> ArtifactSink<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Gather files and persisted states in resolution order
    ///
    /// Fails with `DuplicateArtifact` if two assets (or one asset twice)
    /// produce the same logical path once normalized.
    pub fn collect(&self, resolution: &Resolution) -> Result<CommitBatch, GraphError> {
        let mut owners: HashMap<String, AssetIdentity> = HashMap::new();
        let mut batch = CommitBatch::new();

        for asset in resolution.iter() {
            let identity = asset.identity();

            for file in asset.files() {
                let key = File::normalize_path(&file.path).unwrap_or_else(|_| file.path.clone());
                if let Some(first) = owners.get(&key) {
                    return Err(GraphError::DuplicateArtifact {
                        path: key,
                        first: *first,
                        second: identity,
                    });
                }
                owners.insert(key, identity);
                batch.files.push(file);
            }

            let state = asset.encode_state().map_err(|e| GraphError::Encode {
                asset: identity,
                reason: format!("{e:#}"),
            })?;
            if let Some(bytes) = state {
                batch.states.push((identity, bytes));
            }
        }

        debug!(
            files = batch.files.len(),
            states = batch.states.len(),
            "Collected artifacts"
        );
        Ok(batch)
    }

    /// Persist a collected batch, all-or-nothing
    pub async fn commit(&self, batch: CommitBatch) -> Result<(), GraphError> {
        let files = batch.files.len();
        self.store.commit(batch).await.map_err(GraphError::Commit)?;
        info!(files, store = self.store.name(), "Committed artifacts");
        Ok(())
    }
}
