//! Persisted results of previous graph runs
//!
//! A store answers two questions for the resolver: "do you hold the
//! persisted state of this asset?" and "do you hold this user-provided
//! file?". Both answers distinguish *not found* (`Ok(None)`) from a real
//! failure (`Err`). Writes happen only through [`Store::commit`], which the
//! artifact sink calls once per successful run.
//!
//! ## Backends
//!
//! - [`DiskStore`] - an output directory on the local file system
//! - [`MemoryStore`] - in-memory store with failure injection, for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use assetgraph_store::{DiskStore, Store, CommitBatch};
//!
//! let store = DiskStore::new("./cluster");
//! if let Some(bytes) = store.load(&CLUSTER_ID).await? {
//!     // restore from bytes
//! }
//! ```

pub mod store;
pub mod pattern;
pub mod disk;
pub mod memory;

pub use store::{CommitBatch, FileFetcher, Store, StoreError};
pub use disk::DiskStore;
pub use memory::{MemoryStore, MemoryStoreBuilder};
