//! Cluster installation assets
//!
//! This crate provides the concrete assets resolved by the engine:
//! - InstallConfig, the user-supplied `install-config.yaml`
//! - ClusterId, Bootstrap and Metadata, ending in `metadata.json`
//! - MasterMachines, the GCP control plane machine manifests
//! - AgentHosts and NmStateConfig for agent-based installs

pub mod validation;
mod persist;
pub mod types;
pub mod install_config;
pub mod cluster_id;
pub mod bootstrap;
pub mod metadata;
pub mod machines;
pub mod agent;
pub mod nmstate;

pub use validation::FieldErrors;
pub use types::{InstallConfigSpec, MachinePool, ObjectMeta, Platform, Publish};
pub use install_config::{InstallConfig, INSTALL_CONFIG_FILENAME};
pub use cluster_id::ClusterId;
pub use bootstrap::Bootstrap;
pub use metadata::{load_metadata, ClusterMetadata, Metadata, METADATA_FILENAME};
pub use machines::{Machine, MasterMachines};
pub use agent::{AgentHosts, Host, HostInterface, AGENT_CONFIG_FILENAME};
pub use nmstate::{NmStateConfig, NMSTATE_CONFIG_FILENAME};

use assetgraph_engine::{AssetRegistry, GraphError};

/// Registry holding every asset in this crate
pub fn default_registry() -> Result<AssetRegistry, GraphError> {
    let mut registry = AssetRegistry::new();
    registry
        .register::<InstallConfig>()?
        .register::<ClusterId>()?
        .register::<Bootstrap>()?
        .register::<Metadata>()?
        .register::<MasterMachines>()?
        .register::<AgentHosts>()?
        .register::<NmStateConfig>()?;
    Ok(registry)
}
