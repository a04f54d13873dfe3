//! Per-node resolution state

use serde::{Deserialize, Serialize};

/// Lifecycle of one asset within a single graph run
///
/// Every node starts `Unvisited`, becomes `InProgress` when its resolution
/// begins and ends in `Loaded`, `Generated` or `Failed`. Nothing moves past
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    /// Not yet requested in this run
    Unvisited,

    /// On the active resolution path
    InProgress,

    /// Restored from the store, generation skipped
    Loaded,

    /// Produced by the asset's generation step
    Generated,

    /// Load or generation failed; the run is aborting
    Failed,
}

impl ResolutionState {
    /// Loaded or generated
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Loaded | Self::Generated)
    }

    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Loaded | Self::Generated | Self::Failed)
    }
}

impl Default for ResolutionState {
    fn default() -> Self {
        Self::Unvisited
    }
}

impl std::fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unvisited => write!(f, "unvisited"),
            Self::InProgress => write!(f, "in progress"),
            Self::Loaded => write!(f, "loaded"),
            Self::Generated => write!(f, "generated"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!ResolutionState::Unvisited.is_terminal());
        assert!(!ResolutionState::InProgress.is_terminal());
        assert!(ResolutionState::Loaded.is_resolved());
        assert!(ResolutionState::Generated.is_resolved());
        assert!(ResolutionState::Failed.is_terminal());
        assert!(!ResolutionState::Failed.is_resolved());
    }

    #[test]
    fn state_serialization() {
        let json = serde_json::to_string(&ResolutionState::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
