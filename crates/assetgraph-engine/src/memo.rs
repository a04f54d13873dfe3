//! Per-run memo table

use crate::asset::Asset;
use assetgraph_core::{AssetIdentity, ResolutionState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;
use tracing::debug;

/// Result cell of one identity; initialized by exactly one resolution
pub(crate) type Slot = Arc<OnceCell<Arc<dyn Asset>>>;

/// Resolved assets and their states, scoped to a single run
///
/// Locks are never held across an await point.
#[derive(Default)]
pub(crate) struct MemoTable {
    slots: Mutex<HashMap<AssetIdentity, Slot>>,
    states: Mutex<HashMap<AssetIdentity, ResolutionState>>,
    order: Mutex<Vec<AssetIdentity>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Get or create the slot for `identity`
    pub(crate) fn slot(&self, identity: AssetIdentity) -> Slot {
        Arc::clone(lock(&self.slots).entry(identity).or_default())
    }

    #[cfg(test)]
    pub(crate) fn state(&self, identity: &AssetIdentity) -> ResolutionState {
        lock(&self.states).get(identity).copied().unwrap_or_default()
    }

    pub(crate) fn set_state(&self, identity: AssetIdentity, state: ResolutionState) {
        let previous = lock(&self.states).insert(identity, state).unwrap_or_default();
        debug!(asset = %identity, from = %previous, to = %state, "state transition");
    }

    /// Record a successful resolution and return the shared result
    pub(crate) fn complete(
        &self,
        identity: AssetIdentity,
        state: ResolutionState,
        asset: Box<dyn Asset>,
    ) -> Arc<dyn Asset> {
        self.set_state(identity, state);
        lock(&self.order).push(identity);
        Arc::from(asset)
    }

    /// Consume the table into resolved assets, states and completion order
    pub(crate) fn into_parts(
        self,
    ) -> (
        HashMap<AssetIdentity, Arc<dyn Asset>>,
        HashMap<AssetIdentity, ResolutionState>,
        Vec<AssetIdentity>,
    ) {
        let slots = self.slots.into_inner().unwrap_or_else(|p| p.into_inner());
        let assets = slots
            .into_iter()
            .filter_map(|(identity, slot)| slot.get().map(|asset| (identity, Arc::clone(asset))))
            .collect();
        let states = self.states.into_inner().unwrap_or_else(|p| p.into_inner());
        let order = self.order.into_inner().unwrap_or_else(|p| p.into_inner());
        (assets, states, order)
    }
}
