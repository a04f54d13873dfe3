//! Bootstrap ignition summary

use crate::cluster_id::ClusterId;
use crate::install_config::InstallConfig;
use crate::persist;
use assetgraph_core::AssetIdentity;
use assetgraph_engine::{Asset, AssetContext, AssetKind, ParentSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Ignition spec version rendered for the bootstrap machine
pub const IGNITION_VERSION: &str = "3.2.0";

/// What the bootstrap machine is configured with
///
/// Only the summary is kept; the full ignition config is rendered from it
/// on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bootstrap {
    pub infra_id: String,
    pub api_url: String,
    pub api_int_url: String,

    /// SHA-256 of the rendered ignition config
    pub ignition_sha256: String,
}

impl Bootstrap {
    /// Render the bootstrap ignition config as JSON
    pub fn render_ignition(&self) -> serde_json::Value {
        serde_json::json!({
            "ignition": { "version": IGNITION_VERSION },
            "storage": {
                "files": [{
                    "path": "/etc/kubernetes/kubeconfig-api",
                    "contents": { "source": format!("data:,{}", self.api_int_url) },
                    "mode": 420,
                }],
            },
            "systemd": {
                "units": [{ "name": "bootkube.service", "enabled": true }],
            },
        })
    }
}

#[async_trait::async_trait]
impl Asset for Bootstrap {
    fn identity(&self) -> AssetIdentity {
        Self::IDENTITY
    }

    fn name(&self) -> &str {
        "Bootstrap Ignition Config"
    }

    fn dependencies(&self) -> Vec<AssetIdentity> {
        vec![InstallConfig::IDENTITY, ClusterId::IDENTITY]
    }

    async fn generate(&mut self, _ctx: &AssetContext, parents: &ParentSet) -> anyhow::Result<()> {
        let config = parents.get::<InstallConfig>()?.config()?;
        let cluster_id = parents.get::<ClusterId>()?;

        let domain = format!("{}.{}", config.cluster_name(), config.base_domain);
        self.infra_id = cluster_id.infra_id.clone();
        self.api_url = format!("https://api.{domain}:6443");
        self.api_int_url = format!("https://api-int.{domain}:6443");

        let ignition = serde_json::to_vec(&self.render_ignition())?;
        self.ignition_sha256 = hex::encode(Sha256::digest(&ignition));
        Ok(())
    }

    fn encode_state(&self) -> anyhow::Result<Option<Vec<u8>>> {
        persist::encode(self)
    }

    fn decode_state(&mut self, _ctx: &AssetContext, bytes: &[u8]) -> anyhow::Result<()> {
        *self = persist::decode(bytes)?;
        Ok(())
    }
}

impl AssetKind for Bootstrap {
    const IDENTITY: AssetIdentity = AssetIdentity::new("bootstrap");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InstallConfigSpec;
    use assetgraph_core::Verbosity;
    use assetgraph_engine::CancelSignal;
    use std::sync::Arc;

    #[tokio::test]
    async fn generate_builds_api_urls() {
        let mut parents = ParentSet::new(Bootstrap::IDENTITY, Bootstrap::default().dependencies());
        parents
            .insert(Arc::new(InstallConfig::new(InstallConfigSpec::with_defaults())))
            .unwrap();
        parents
            .insert(Arc::new(ClusterId {
                uuid: "9a1f0e2c-0000-4000-8000-000000000000".to_string(),
                infra_id: "ostest-x7k2p".to_string(),
            }))
            .unwrap();
        let ctx = AssetContext::new(Bootstrap::IDENTITY, Verbosity::default(), CancelSignal::new());

        let mut asset = Bootstrap::default();
        asset.generate(&ctx, &parents).await.unwrap();

        assert_eq!(asset.api_url, "https://api.ostest.example.com:6443");
        assert_eq!(asset.api_int_url, "https://api-int.ostest.example.com:6443");
        assert_eq!(asset.infra_id, "ostest-x7k2p");
        assert_eq!(asset.ignition_sha256.len(), 64);
    }
}
