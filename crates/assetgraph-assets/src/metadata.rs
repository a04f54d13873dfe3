//! Cluster metadata, the information needed to destroy a cluster

use crate::bootstrap::Bootstrap;
use crate::cluster_id::ClusterId;
use crate::install_config::InstallConfig;
use crate::persist;
use crate::types::{GCP, NONE};
use anyhow::Context;
use assetgraph_core::{AssetIdentity, File};
use assetgraph_engine::{Asset, AssetContext, AssetKind, ParentSet};
use serde::{Deserialize, Serialize};

/// Output file, relative to the output directory
pub const METADATA_FILENAME: &str = "metadata.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpMetadata {
    pub region: String,

    #[serde(rename = "projectID")]
    pub project_id: String,
}

/// Contents of `metadata.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetadata {
    pub cluster_name: String,

    #[serde(rename = "clusterID")]
    pub cluster_id: String,

    #[serde(rename = "infraID")]
    pub infra_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp: Option<GcpMetadata>,
}

/// Writes `metadata.json`
///
/// Never loaded from the output directory: a stale or hand-edited file must
/// not survive into a new run.
#[derive(Debug, Default)]
pub struct Metadata {
    metadata: Option<ClusterMetadata>,
    file: Option<File>,
}

impl Metadata {
    pub fn metadata(&self) -> Option<&ClusterMetadata> {
        self.metadata.as_ref()
    }

    fn set(&mut self, metadata: ClusterMetadata) -> anyhow::Result<()> {
        let data = serde_json::to_vec(&metadata).context("failed to marshal cluster metadata")?;
        self.file = Some(File::new(METADATA_FILENAME, data));
        self.metadata = Some(metadata);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Asset for Metadata {
    fn identity(&self) -> AssetIdentity {
        Self::IDENTITY
    }

    fn name(&self) -> &str {
        "Metadata"
    }

    fn dependencies(&self) -> Vec<AssetIdentity> {
        vec![ClusterId::IDENTITY, InstallConfig::IDENTITY, Bootstrap::IDENTITY]
    }

    async fn generate(&mut self, _ctx: &AssetContext, parents: &ParentSet) -> anyhow::Result<()> {
        let cluster_id = parents.get::<ClusterId>()?;
        let config = parents.get::<InstallConfig>()?.config()?;

        let gcp = match config.platform.name() {
            Some(GCP) => config.platform.gcp.as_ref().map(|gcp| GcpMetadata {
                region: gcp.region.clone(),
                project_id: gcp.project_id.clone(),
            }),
            Some(NONE) => None,
            _ => anyhow::bail!("no known platform"),
        };

        self.set(ClusterMetadata {
            cluster_name: config.cluster_name().to_string(),
            cluster_id: cluster_id.uuid.clone(),
            infra_id: cluster_id.infra_id.clone(),
            gcp,
        })
    }

    fn files(&self) -> Vec<File> {
        self.file.iter().cloned().collect()
    }

    fn encode_state(&self) -> anyhow::Result<Option<Vec<u8>>> {
        match &self.metadata {
            Some(metadata) => persist::encode(metadata),
            None => Ok(None),
        }
    }

    fn decode_state(&mut self, _ctx: &AssetContext, bytes: &[u8]) -> anyhow::Result<()> {
        self.set(persist::decode(bytes)?)
    }
}

impl AssetKind for Metadata {
    const IDENTITY: AssetIdentity = AssetIdentity::new("metadata");
}

/// Read `metadata.json` from an output directory
pub fn load_metadata(dir: &std::path::Path) -> anyhow::Result<ClusterMetadata> {
    let path = dir.join(METADATA_FILENAME);
    let raw = std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse cluster metadata from {}", path.display()))
}
