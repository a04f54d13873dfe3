//! assetgraph core
//!
//! Core domain model shared by the store, the engine and the producers.
//! Asset identities and report fields are part of the persisted layout:
//! never rename an identity token once it has shipped.

pub mod identity;
pub mod file;
pub mod state;
pub mod error;
pub mod config;
pub mod report;

pub use identity::AssetIdentity;
pub use file::File;
pub use state::ResolutionState;
pub use error::ErrorKind;
pub use config::{Config, ConfigError, LogConfig, OutputConfig, RunConfig, Verbosity};
pub use report::{FileEntry, NodeEntry, ReportSummary, ReportVersion, RunReport};
