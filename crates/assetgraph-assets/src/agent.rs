//! Agent-based install host definitions

use crate::validation::FieldErrors;
use anyhow::Context;
use assetgraph_core::AssetIdentity;
use assetgraph_engine::{Asset, AssetContext, AssetKind, ParentSet};
use assetgraph_store::FileFetcher;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// User-provided agent configuration
pub const AGENT_CONFIG_FILENAME: &str = "agent-config.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInterface {
    pub name: String,
    #[serde(default)]
    pub mac_address: String,
}

/// One host of an agent-based install
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// `master`, `worker`, or empty to let the installer decide
    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub interfaces: Vec<HostInterface>,

    /// Raw NMState network configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_config: Option<serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct AgentConfigFile {
    #[serde(default)]
    hosts: Vec<Host>,
}

/// Hosts declared in `agent-config.yaml`, empty when there is no such file
#[derive(Debug, Default)]
pub struct AgentHosts {
    pub hosts: Vec<Host>,
}

impl AgentHosts {
    pub fn new(hosts: Vec<Host>) -> Self {
        Self { hosts }
    }

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        let mut hostnames = HashSet::new();
        let mut macs = HashSet::new();

        for (i, host) in self.hosts.iter().enumerate() {
            let path = format!("hosts[{i}]");

            if !matches!(host.role.as_str(), "" | "master" | "worker") {
                errors.invalid(&format!("{path}.role"), &host.role, "host role must be master or worker");
            }
            if let Some(hostname) = &host.hostname {
                if !hostnames.insert(hostname.as_str()) {
                    errors.invalid(&format!("{path}.hostname"), hostname, "hostname is already set to another host");
                }
            }
            if host.interfaces.is_empty() {
                errors.required(&format!("{path}.interfaces"), "at least one interface must be defined for each node");
            }
            for (j, interface) in host.interfaces.iter().enumerate() {
                let field = format!("{path}.interfaces[{j}].macAddress");
                if interface.mac_address.is_empty() {
                    errors.required(&field, "each interface must have a MAC address defined");
                } else if !macs.insert(interface.mac_address.to_ascii_lowercase()) {
                    errors.invalid(&field, &interface.mac_address, "duplicate MAC address found");
                }
            }
        }

        errors.into_result()
    }
}

#[async_trait::async_trait]
impl Asset for AgentHosts {
    fn identity(&self) -> AssetIdentity {
        Self::IDENTITY
    }

    fn name(&self) -> &str {
        "Agent Hosts"
    }

    async fn generate(&mut self, _ctx: &AssetContext, _parents: &ParentSet) -> anyhow::Result<()> {
        self.hosts.clear();
        Ok(())
    }

    async fn load(&mut self, _ctx: &AssetContext, fetcher: &dyn FileFetcher) -> anyhow::Result<bool> {
        let Some(file) = fetcher.fetch_by_name(AGENT_CONFIG_FILENAME).await? else {
            return Ok(false);
        };

        let config: AgentConfigFile = serde_yaml::from_slice(&file.data)
            .with_context(|| format!("failed to parse {AGENT_CONFIG_FILENAME}"))?;
        self.hosts = config.hosts;
        self.validate().context("invalid Hosts configuration")?;
        Ok(true)
    }

    fn encode_state(&self) -> anyhow::Result<Option<Vec<u8>>> {
        // YAML, since raw network configs are not guaranteed to be JSON-compatible
        let yaml = serde_yaml::to_string(&self.hosts).context("failed to serialize agent hosts")?;
        Ok(Some(yaml.into_bytes()))
    }

    fn decode_state(&mut self, _ctx: &AssetContext, bytes: &[u8]) -> anyhow::Result<()> {
        self.hosts = serde_yaml::from_slice(bytes).context("failed to parse agent hosts")?;
        Ok(())
    }
}

impl AssetKind for AgentHosts {
    const IDENTITY: AssetIdentity = AssetIdentity::new("agent-hosts");
}
