//! Install configuration asset

use crate::persist;
use crate::types::InstallConfigSpec;
use anyhow::Context;
use assetgraph_core::AssetIdentity;
use assetgraph_engine::{Asset, AssetContext, AssetKind, ParentSet};
use assetgraph_store::FileFetcher;
use tracing::debug;

/// User-provided configuration file
pub const INSTALL_CONFIG_FILENAME: &str = "install-config.yaml";

/// The validated cluster configuration
///
/// Read from `install-config.yaml` when the user provides one, otherwise
/// generated from built-in defaults.
#[derive(Debug, Default)]
pub struct InstallConfig {
    config: Option<InstallConfigSpec>,
}

impl InstallConfig {
    pub fn new(config: InstallConfigSpec) -> Self {
        Self {
            config: Some(config),
        }
    }

    /// The resolved configuration
    pub fn config(&self) -> anyhow::Result<&InstallConfigSpec> {
        self.config
            .as_ref()
            .ok_or_else(|| persist::unresolved(self.name()))
    }

    fn finish(&mut self, config: InstallConfigSpec) -> anyhow::Result<()> {
        config.validate().context("invalid install config")?;
        self.config = Some(config);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Asset for InstallConfig {
    fn identity(&self) -> AssetIdentity {
        Self::IDENTITY
    }

    fn name(&self) -> &str {
        "Install Config"
    }

    async fn generate(&mut self, _ctx: &AssetContext, _parents: &ParentSet) -> anyhow::Result<()> {
        debug!("No {} provided, using defaults", INSTALL_CONFIG_FILENAME);
        self.finish(InstallConfigSpec::with_defaults())
    }

    async fn load(&mut self, _ctx: &AssetContext, fetcher: &dyn FileFetcher) -> anyhow::Result<bool> {
        let Some(file) = fetcher.fetch_by_name(INSTALL_CONFIG_FILENAME).await? else {
            return Ok(false);
        };

        let config: InstallConfigSpec = serde_yaml::from_slice(&file.data)
            .with_context(|| format!("failed to parse {INSTALL_CONFIG_FILENAME}"))?;
        self.finish(config)?;
        Ok(true)
    }

    fn encode_state(&self) -> anyhow::Result<Option<Vec<u8>>> {
        persist::encode(self.config()?)
    }

    fn decode_state(&mut self, _ctx: &AssetContext, bytes: &[u8]) -> anyhow::Result<()> {
        let config = persist::decode(bytes)?;
        self.finish(config)
    }
}

impl AssetKind for InstallConfig {
    const IDENTITY: AssetIdentity = AssetIdentity::new("install-config");
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetgraph_core::{File, Verbosity};
    use assetgraph_engine::CancelSignal;
    use assetgraph_store::MemoryStore;

    fn ctx() -> AssetContext {
        AssetContext::new(InstallConfig::IDENTITY, Verbosity::default(), CancelSignal::new())
    }

    #[tokio::test]
    async fn load_returns_false_without_file() {
        let store = MemoryStore::new();
        let mut asset = InstallConfig::default();

        assert!(!asset.load(&ctx(), &store).await.unwrap());
        assert!(asset.config().is_err());
    }

    #[tokio::test]
    async fn load_parses_and_validates() {
        let store = MemoryStore::new();
        store
            .add_file(File::new(
                INSTALL_CONFIG_FILENAME,
                "metadata:\n  name: lab\nbaseDomain: lab.local\nplatform:\n  none: {}\n",
            ))
            .await;

        let mut asset = InstallConfig::default();
        assert!(asset.load(&ctx(), &store).await.unwrap());
        assert_eq!(asset.config().unwrap().cluster_name(), "lab");
    }

    #[tokio::test]
    async fn load_rejects_invalid_config() {
        let store = MemoryStore::new();
        store
            .add_file(File::new(INSTALL_CONFIG_FILENAME, "metadata:\n  name: ''\n"))
            .await;

        let err = InstallConfig::default().load(&ctx(), &store).await.unwrap_err();
        assert!(format!("{err:#}").contains("invalid install config"));
    }

    #[test]
    fn state_round_trips() {
        let asset = InstallConfig::new(InstallConfigSpec::with_defaults());
        let bytes = asset.encode_state().unwrap().unwrap();

        let mut restored = InstallConfig::default();
        restored.decode_state(&ctx(), &bytes).unwrap();
        assert_eq!(restored.config().unwrap(), asset.config().unwrap());
    }
}
