//! The asset capability
//!
//! An asset is one artifact-producing unit of work. The engine treats every
//! producer through this trait alone: it never branches on which concrete
//! producer it is holding.

use crate::cancel::CancelSignal;
use crate::parents::ParentSet;
use assetgraph_core::{AssetIdentity, File, Verbosity};
use assetgraph_store::FileFetcher;
use std::any::Any;

/// Upcast to `Any` for typed parent lookups
///
/// Implemented for every sized `'static` type; never implement it by hand.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A named unit of work that produces a cacheable artifact
///
/// Validation belongs inside [`Asset::generate`] and [`Asset::load`]: a
/// failed check is returned as an ordinary error.
#[async_trait::async_trait]
pub trait Asset: AsAny {
    /// Stable identity of this asset kind
    fn identity(&self) -> AssetIdentity;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Direct dependencies, in the order they should be resolved
    fn dependencies(&self) -> Vec<AssetIdentity> {
        Vec::new()
    }

    /// Produce this asset from its resolved dependencies
    async fn generate(&mut self, ctx: &AssetContext, parents: &ParentSet) -> anyhow::Result<()>;

    /// Read user-provided input for this asset
    ///
    /// Returns `Ok(false)` when there is nothing on disk, which makes the
    /// engine fall through to [`Asset::generate`].
    async fn load(&mut self, _ctx: &AssetContext, _fetcher: &dyn FileFetcher) -> anyhow::Result<bool> {
        Ok(false)
    }

    /// Output files, relative to the output directory
    fn files(&self) -> Vec<File> {
        Vec::new()
    }

    /// Serialize the state persisted between runs
    ///
    /// `None` means this asset keeps nothing in the store.
    fn encode_state(&self) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    /// Restore from bytes previously returned by [`Asset::encode_state`]
    fn decode_state(&mut self, _ctx: &AssetContext, _bytes: &[u8]) -> anyhow::Result<()> {
        Ok(())
    }
}

/// An asset kind with a compile-time identity
///
/// Needed for typed lookups ([`ParentSet::get`]) and registration
/// ([`AssetRegistry::register`](crate::AssetRegistry::register)).
pub trait AssetKind: Asset + Default {
    const IDENTITY: AssetIdentity;
}

/// Downcast a type-erased asset
pub fn downcast_ref<T: AssetKind>(asset: &dyn Asset) -> Option<&T> {
    // Dispatch through the vtable; `asset.as_any()` could pick the blanket
    // impl for the reference type instead.
    <dyn Asset as AsAny>::as_any(asset).downcast_ref::<T>()
}

/// Everything an asset may consult while loading or generating, besides
/// its parents
#[derive(Debug, Clone)]
pub struct AssetContext {
    identity: AssetIdentity,
    verbosity: Verbosity,
    cancel: CancelSignal,
}

impl AssetContext {
    pub fn new(identity: AssetIdentity, verbosity: Verbosity, cancel: CancelSignal) -> Self {
        Self {
            identity,
            verbosity,
            cancel,
        }
    }

    /// Identity of the asset being resolved
    pub fn identity(&self) -> AssetIdentity {
        self.identity
    }

    /// Verbosity for validation output
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// The run's cancellation signal
    pub fn cancel(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
