//! Graph resolver
//!
//! Walks the dependency graph depth-first from a set of roots and resolves
//! every reachable asset at most once. For each asset, in order:
//!
//! 1. persisted state in the [`Store`] (the asset is *loaded*, its own
//!    dependencies are not visited);
//! 2. user-provided input read through the store's [`FileFetcher`](assetgraph_store::FileFetcher);
//! 3. generation, after every declared dependency has been resolved.
//!
//! The first failure anywhere aborts the run and nothing is returned.

use crate::asset::{downcast_ref, Asset, AssetContext, AssetKind};
use crate::cancel::CancelSignal;
use crate::dag::DependencyGraph;
use crate::error::{GraphError, ParentError};
use crate::memo::MemoTable;
use crate::parents::ParentSet;
use crate::registry::AssetRegistry;
use assetgraph_core::{AssetIdentity, ResolutionState, Verbosity};
use assetgraph_store::{Store, StoreError};
use futures::future::{try_join_all, BoxFuture, FutureExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves root assets against a registry and a store
pub struct Resolver<'a> {
    registry: &'a AssetRegistry,
    store: &'a dyn Store,
    concurrent: bool,
    verbosity: Verbosity,
    cancel: CancelSignal,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a AssetRegistry, store: &'a dyn Store) -> Self {
        Self {
            registry,
            store,
            concurrent: false,
            verbosity: Verbosity::default(),
            cancel: CancelSignal::new(),
        }
    }

    /// Resolve sibling dependencies concurrently
    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Verbosity handed to every asset through its [`AssetContext`]
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Observe an external cancellation signal
    ///
    /// A failure inside the run cancels a child of this signal, never the
    /// signal itself.
    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Resolve `roots` and everything they need
    pub async fn resolve(&self, roots: &[AssetIdentity]) -> Result<Resolution, GraphError> {
        for root in roots {
            if !self.registry.contains(root) {
                return Err(GraphError::UnknownAsset(root.to_string()));
            }
        }

        if self.concurrent {
            // Waiting on an in-flight identity is only deadlock-free on a DAG.
            let graph = DependencyGraph::reachable(self.registry, roots)?;
            if let Some(path) = graph.find_cycle() {
                return Err(GraphError::CycleDetected { path });
            }
        }

        let run = Run {
            registry: self.registry,
            store: self.store,
            concurrent: self.concurrent,
            verbosity: self.verbosity,
            cancel: self.cancel.child(),
            memo: MemoTable::new(),
        };

        debug!(
            roots = roots.len(),
            concurrent = self.concurrent,
            store = self.store.name(),
            "Resolving graph"
        );

        let result = if self.concurrent {
            try_join_all(roots.iter().map(|root| run.resolve_node(*root, Vec::new())))
                .await
                .map(|_| ())
        } else {
            let mut result = Ok(());
            for root in roots {
                if let Err(err) = run.resolve_node(*root, Vec::new()).await {
                    result = Err(err);
                    break;
                }
            }
            result
        };

        if let Err(err) = result {
            warn!(kind = %err.kind(), "Graph run aborted: {}", err);
            return Err(err);
        }

        let (assets, states, order) = run.memo.into_parts();
        Ok(Resolution {
            roots: roots.to_vec(),
            assets,
            states,
            order,
        })
    }
}

/// State of one `resolve` call
struct Run<'a> {
    registry: &'a AssetRegistry,
    store: &'a dyn Store,
    concurrent: bool,
    verbosity: Verbosity,
    cancel: CancelSignal,
    memo: MemoTable,
}

impl<'a> Run<'a> {
    /// Resolve one identity reached through `chain`
    ///
    /// `chain` holds the identities whose resolution is waiting on this one.
    fn resolve_node<'s>(
        &'s self,
        identity: AssetIdentity,
        chain: Vec<AssetIdentity>,
    ) -> BoxFuture<'s, Result<Arc<dyn Asset>, GraphError>> {
        async move {
            if let Some(start) = chain.iter().position(|id| *id == identity) {
                let mut path = chain[start..].to_vec();
                path.push(identity);
                return Err(GraphError::CycleDetected { path });
            }

            let slot = self.memo.slot(identity);
            if let Some(asset) = slot.get() {
                return Ok(Arc::clone(asset));
            }

            let asset = slot
                .get_or_try_init(|| self.resolve_once(identity, chain))
                .await?;
            Ok(Arc::clone(asset))
        }
        .boxed()
    }

    /// Runs inside the identity's slot, so at most once per successful run
    async fn resolve_once(
        &self,
        identity: AssetIdentity,
        chain: Vec<AssetIdentity>,
    ) -> Result<Arc<dyn Asset>, GraphError> {
        let result = self.materialize(identity, chain).await;
        if result.is_err() {
            self.memo.set_state(identity, ResolutionState::Failed);
            // Stop in-flight siblings and keep waiters from retrying.
            self.cancel.cancel();
        }
        result
    }

    async fn materialize(
        &self,
        identity: AssetIdentity,
        chain: Vec<AssetIdentity>,
    ) -> Result<Arc<dyn Asset>, GraphError> {
        if self.cancel.is_cancelled() {
            return Err(GraphError::Cancelled { asset: identity });
        }

        self.memo.set_state(identity, ResolutionState::InProgress);
        let mut asset = self.registry.instantiate(identity)?;
        let name = asset.name().to_string();
        let ctx = AssetContext::new(identity, self.verbosity, self.cancel.clone());

        // 1. Persisted state from a previous run
        let persisted = self
            .guarded(identity, self.store.load(&identity))
            .await?
            .map_err(|source| GraphError::Io {
                asset: identity,
                source,
            })?;
        if let Some(bytes) = persisted {
            asset.decode_state(&ctx, &bytes).map_err(|e| GraphError::Decode {
                asset: identity,
                reason: format!("{e:#}"),
            })?;
            info!(asset = %identity, "Loaded {} from the store", name);
            return Ok(self.memo.complete(identity, ResolutionState::Loaded, asset));
        }

        // 2. User-provided input
        let found = self
            .guarded(identity, asset.load(&ctx, self.store.as_fetcher()))
            .await?
            .map_err(|e| input_error(identity, &name, e))?;
        if found {
            info!(asset = %identity, "Loaded {} from user input", name);
            return Ok(self.memo.complete(identity, ResolutionState::Loaded, asset));
        }

        // 3. Generate from resolved dependencies
        let declared = asset.dependencies();
        let mut next_chain = chain;
        next_chain.push(identity);

        let resolved = if self.concurrent {
            try_join_all(
                declared
                    .iter()
                    .map(|dep| self.resolve_node(*dep, next_chain.clone())),
            )
            .await
        } else {
            let mut resolved = Vec::with_capacity(declared.len());
            let mut failure = None;
            for dep in &declared {
                match self.resolve_node(*dep, next_chain.clone()).await {
                    Ok(parent) => resolved.push(parent),
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
            match failure {
                Some(err) => Err(err),
                None => Ok(resolved),
            }
        }
        .map_err(|source| GraphError::dependency(identity, &name, source))?;

        let mut parents = ParentSet::new(identity, declared);
        for parent in resolved {
            parents.insert(parent).map_err(|source| GraphError::Parent {
                asset: identity,
                source,
            })?;
        }

        debug!(asset = %identity, parents = parents.len(), "Generating {}", name);
        self.guarded(identity, asset.generate(&ctx, &parents))
            .await?
            .map_err(|e| generation_error(identity, &name, e))?;

        info!(asset = %identity, "Generated {}", name);
        Ok(self.memo.complete(identity, ResolutionState::Generated, asset))
    }

    /// Race `work` against the run's cancellation signal
    async fn guarded<F>(&self, identity: AssetIdentity, work: F) -> Result<F::Output, GraphError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(GraphError::Cancelled { asset: identity }),
            output = work => Ok(output),
        }
    }
}

/// Classify a failed `Asset::load`: fetcher failures are I/O, the rest is
/// the asset's own validation
fn input_error(identity: AssetIdentity, name: &str, error: anyhow::Error) -> GraphError {
    let reason = format!("{error:#}");
    if error.chain().any(|cause| cause.is::<StoreError>()) {
        GraphError::Fetch {
            asset: identity,
            name: name.to_string(),
            reason,
        }
    } else {
        GraphError::Generation {
            asset: identity,
            name: name.to_string(),
            reason,
        }
    }
}

fn generation_error(identity: AssetIdentity, name: &str, error: anyhow::Error) -> GraphError {
    match error.downcast::<ParentError>() {
        Ok(source) => GraphError::Parent {
            asset: identity,
            source,
        },
        Err(error) => GraphError::Generation {
            asset: identity,
            name: name.to_string(),
            reason: format!("{error:#}"),
        },
    }
}

/// Every asset resolved by one successful run
pub struct Resolution {
    roots: Vec<AssetIdentity>,
    assets: HashMap<AssetIdentity, Arc<dyn Asset>>,
    states: HashMap<AssetIdentity, ResolutionState>,
    order: Vec<AssetIdentity>,
}

impl Resolution {
    /// Typed access to a resolved asset
    pub fn get<T: AssetKind>(&self) -> Option<&T> {
        self.assets
            .get(&T::IDENTITY)
            .and_then(|asset| downcast_ref::<T>(&**asset))
    }

    pub fn get_dyn(&self, identity: &AssetIdentity) -> Option<&Arc<dyn Asset>> {
        self.assets.get(identity)
    }

    /// Terminal state of an identity; `Unvisited` if it was never reached
    pub fn state(&self, identity: &AssetIdentity) -> ResolutionState {
        self.states.get(identity).copied().unwrap_or_default()
    }

    /// Identities in completion order, dependencies before dependents
    pub fn order(&self) -> &[AssetIdentity] {
        &self.order
    }

    pub fn roots(&self) -> &[AssetIdentity] {
        &self.roots
    }

    /// Resolved assets in completion order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Asset>> + '_ {
        self.order.iter().filter_map(|identity| self.assets.get(identity))
    }

    /// Identities produced by generation, in completion order
    pub fn generated(&self) -> Vec<AssetIdentity> {
        self.in_state(ResolutionState::Generated)
    }

    /// Identities restored from the store or user input, in completion order
    pub fn loaded(&self) -> Vec<AssetIdentity> {
        self.in_state(ResolutionState::Loaded)
    }

    fn in_state(&self, state: ResolutionState) -> Vec<AssetIdentity> {
        self.order
            .iter()
            .copied()
            .filter(|identity| self.state(identity) == state)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("roots", &self.roots)
            .field("order", &self.order)
            .finish()
    }
}
