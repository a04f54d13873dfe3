//! assetgraph engine
//!
//! Resolves a directed acyclic graph of assets:
//! - each asset runs at most once per run
//! - persisted results are reused before anything is regenerated
//! - dependencies are injected through a [`ParentSet`]
//! - the first failure aborts the run and nothing is written
//!
//! ```rust,ignore
//! let engine = Engine::new(registry, Arc::new(DiskStore::new("./cluster")));
//! let outcome = engine.create(&[Metadata::IDENTITY]).await?;
//! println!("{}", outcome.report.to_json()?);
//! ```

pub mod asset;
pub mod cancel;
pub mod dag;
pub mod engine;
pub mod error;
mod memo;
pub mod parents;
pub mod registry;
pub mod resolver;
pub mod sink;

pub use asset::{downcast_ref, AsAny, Asset, AssetContext, AssetKind};
pub use cancel::CancelSignal;
pub use dag::DependencyGraph;
pub use engine::{Engine, RunOutcome};
pub use error::{GraphError, ParentError};
pub use parents::ParentSet;
pub use registry::{AssetFactory, AssetRegistry};
pub use resolver::{Resolution, Resolver};
pub use sink::ArtifactSink;
