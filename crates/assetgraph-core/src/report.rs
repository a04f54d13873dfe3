//! Run report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};
use crate::error::ErrorKind;
use crate::file::File;
use crate::identity::AssetIdentity;
use crate::state::ResolutionState;

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Summary statistics for a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    /// Number of assets resolved
    pub total: usize,

    /// Assets restored from the store
    pub loaded: usize,

    /// Assets produced by generation
    pub generated: usize,

    /// Files written by the artifact sink
    pub files_written: usize,
}

/// One materialized file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Logical path relative to the output directory
    pub path: String,

    /// Hex SHA-256 of the payload
    pub sha256: String,

    /// Payload size in bytes
    pub size: usize,
}

impl From<&File> for FileEntry {
    fn from(file: &File) -> Self {
        Self {
            path: file.path.clone(),
            sha256: file.sha256(),
            size: file.len(),
        }
    }
}

/// One resolved asset, in resolution order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeEntry {
    /// Asset identity
    pub identity: AssetIdentity,

    /// Human-readable asset name
    pub name: String,

    /// Terminal state reached in this run
    pub state: ResolutionState,

    /// Files contributed by this asset
    pub files: Vec<FileEntry>,
}

/// Run report (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Requested root assets
    pub roots: Vec<AssetIdentity>,

    /// Summary statistics
    pub summary: ReportSummary,

    /// Resolved assets, dependencies before dependents
    pub nodes: Vec<NodeEntry>,

    /// Classification of the failure, if the run failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    /// Top-level error message, if the run failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    /// Create an empty report for the given roots
    pub fn new(roots: Vec<AssetIdentity>) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            roots,
            summary: ReportSummary::default(),
            nodes: Vec::new(),
            error_kind: None,
            error: None,
        }
    }

    /// Create a report for a failed run
    pub fn failed(roots: Vec<AssetIdentity>, kind: ErrorKind, message: impl Into<String>) -> Self {
        let mut report = Self::new(roots);
        report.error_kind = Some(kind);
        report.error = Some(message.into());
        report
    }

    /// Add a resolved node to the report
    pub fn add_node(&mut self, node: NodeEntry) {
        match node.state {
            ResolutionState::Loaded => self.summary.loaded += 1,
            ResolutionState::Generated => self.summary.generated += 1,
            _ => {}
        }

        self.summary.total += 1;
        self.summary.files_written += node.files.len();
        self.nodes.push(node);
    }

    /// Check if the run failed
    pub fn has_errors(&self) -> bool {
        self.error.is_some()
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}
