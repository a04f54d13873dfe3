//! Top-level entry point: resolve, collect and commit

use crate::cancel::CancelSignal;
use crate::error::GraphError;
use crate::registry::AssetRegistry;
use crate::resolver::{Resolution, Resolver};
use crate::sink::ArtifactSink;
use assetgraph_core::{AssetIdentity, Config, FileEntry, NodeEntry, RunReport, Verbosity};
use assetgraph_store::Store;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Result of a successful run
#[derive(Debug)]
pub struct RunOutcome {
    /// Every resolved asset
    pub resolution: Resolution,

    /// Summary of what was resolved and written
    pub report: RunReport,
}

/// Resolves requested assets and materializes their output through a store
pub struct Engine {
    registry: AssetRegistry,
    store: Arc<dyn Store>,
    concurrent: bool,
    deadline: Option<Duration>,
    verbosity: Verbosity,
    cancel: Option<CancelSignal>,
}

impl Engine {
    pub fn new(registry: AssetRegistry, store: Arc<dyn Store>) -> Self {
        Self {
            registry,
            store,
            concurrent: false,
            deadline: None,
            verbosity: Verbosity::default(),
            cancel: None,
        }
    }

    /// Apply the `[run]` and `[logging]` settings of a config
    pub fn with_config(mut self, config: &Config) -> Self {
        self.concurrent = config.run.concurrent;
        self.deadline = config.run.deadline();
        self.verbosity = config.logging.validation;
        self
    }

    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Fail any run that takes longer than `deadline`
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Let the caller cancel runs from outside
    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Resolve `roots` only, without writing anything
    pub async fn resolve(&self, roots: &[AssetIdentity]) -> Result<Resolution, GraphError> {
        let mut cancel = match &self.cancel {
            Some(signal) => signal.child(),
            None => CancelSignal::new(),
        };
        if let Some(deadline) = self.deadline {
            cancel = cancel.with_timeout(deadline);
        }

        Resolver::new(&self.registry, self.store.as_ref())
            .concurrent(self.concurrent)
            .with_verbosity(self.verbosity)
            .with_cancel_signal(cancel)
            .resolve(roots)
            .await
    }

    /// Resolve `roots` and persist every produced file and state
    ///
    /// On error nothing has been written.
    pub async fn create(&self, roots: &[AssetIdentity]) -> Result<RunOutcome, GraphError> {
        info!(roots = ?roots.iter().map(AssetIdentity::as_str).collect::<Vec<_>>(), "Creating assets");

        let resolution = self.resolve(roots).await?;

        let sink = ArtifactSink::new(self.store.as_ref());
        let batch = sink.collect(&resolution)?;
        let report = build_report(&resolution);
        sink.commit(batch).await?;

        info!(
            generated = report.summary.generated,
            loaded = report.summary.loaded,
            files = report.summary.files_written,
            "Run complete"
        );
        Ok(RunOutcome { resolution, report })
    }

    /// Report describing a failed run
    pub fn failure_report(roots: &[AssetIdentity], error: &GraphError) -> RunReport {
        RunReport::failed(roots.to_vec(), error.kind(), error.to_string())
    }
}

fn build_report(resolution: &Resolution) -> RunReport {
    let mut report = RunReport::new(resolution.roots().to_vec());

    for asset in resolution.iter() {
        let identity = asset.identity();
        report.add_node(NodeEntry {
            identity,
            name: asset.name().to_string(),
            state: resolution.state(&identity),
            files: asset.files().iter().map(FileEntry::from).collect(),
        });
    }

    report
}
