//! Cluster identifiers

use crate::install_config::InstallConfig;
use crate::persist;
use assetgraph_core::AssetIdentity;
use assetgraph_engine::{Asset, AssetContext, AssetKind, ParentSet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest infra ID accepted by cloud resource names
const MAX_INFRA_ID_LEN: usize = 27;

/// Length of the random suffix appended to the cluster name
const RANDOM_SUFFIX_LEN: usize = 5;

/// Unique identifiers of one cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterId {
    /// Globally unique cluster ID
    #[serde(rename = "clusterID")]
    pub uuid: String,

    /// Short ID used to name and tag cloud resources
    #[serde(rename = "infraID")]
    pub infra_id: String,
}

impl ClusterId {
    fn check_resolved(&self) -> anyhow::Result<()> {
        if self.uuid.is_empty() || self.infra_id.is_empty() {
            return Err(persist::unresolved("Cluster ID"));
        }
        Ok(())
    }
}

/// Derive an infra ID from a cluster name
///
/// The name is lowercased, every run of characters outside `[a-z0-9]` becomes
/// one `-`, and the result is cut so that `<base>-<suffix>` fits in
/// [`MAX_INFRA_ID_LEN`] characters.
pub fn infra_id(cluster_name: &str, suffix: &str) -> String {
    let max_base = MAX_INFRA_ID_LEN - RANDOM_SUFFIX_LEN - 1;

    let mut base = String::with_capacity(cluster_name.len());
    for c in cluster_name.chars().map(|c| c.to_ascii_lowercase()) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            base.push(c);
        } else if !base.ends_with('-') {
            base.push('-');
        }
    }

    base.truncate(max_base);
    let base = base.trim_matches('-');
    format!("{base}-{suffix}")
}

fn random_suffix() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(RANDOM_SUFFIX_LEN)
        .collect()
}

#[async_trait::async_trait]
impl Asset for ClusterId {
    fn identity(&self) -> AssetIdentity {
        Self::IDENTITY
    }

    fn name(&self) -> &str {
        "Cluster ID"
    }

    fn dependencies(&self) -> Vec<AssetIdentity> {
        vec![InstallConfig::IDENTITY]
    }

    async fn generate(&mut self, _ctx: &AssetContext, parents: &ParentSet) -> anyhow::Result<()> {
        let install_config = parents.get::<InstallConfig>()?.config()?;

        self.uuid = Uuid::new_v4().to_string();
        self.infra_id = infra_id(install_config.cluster_name(), &random_suffix());
        Ok(())
    }

    fn encode_state(&self) -> anyhow::Result<Option<Vec<u8>>> {
        self.check_resolved()?;
        persist::encode(self)
    }

    fn decode_state(&mut self, _ctx: &AssetContext, bytes: &[u8]) -> anyhow::Result<()> {
        *self = persist::decode(bytes)?;
        self.check_resolved()
    }
}

impl AssetKind for ClusterId {
    const IDENTITY: AssetIdentity = AssetIdentity::new("cluster-id");
}
