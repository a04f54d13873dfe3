//! Error classification shared by the engine, the report and the CLI
//!
//! The engine's error type lives next to the resolver; this module only
//! holds the stable classification attached to reports and exit paths.

use serde::{Deserialize, Serialize};

/// Root-cause classification of a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Store or file fetcher I/O, or undecodable persisted data
    IoFailure,

    /// The dependency relation is not acyclic
    CycleDetected,

    /// An asset's own logic (including its validation) failed
    GenerationFailure,

    /// Two assets claimed the same output path
    DuplicateArtifact,

    /// The run's cancellation signal or deadline fired
    Cancelled,

    /// Registry wiring mistake, such as an unknown or duplicate identity
    Configuration,
}

impl ErrorKind {
    /// Stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IoFailure => "IO_FAILURE",
            Self::CycleDetected => "CYCLE_DETECTED",
            Self::GenerationFailure => "GENERATION_FAILURE",
            Self::DuplicateArtifact => "DUPLICATE_ARTIFACT",
            Self::Cancelled => "CANCELLED",
            Self::Configuration => "CONFIGURATION",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
