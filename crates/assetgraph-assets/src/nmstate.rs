//! NMStateConfig manifests for agent-based installs

use crate::agent::{AgentHosts, Host};
use crate::install_config::InstallConfig;
use crate::persist;
use crate::types::{InstallConfigSpec, ObjectMeta};
use crate::validation::FieldErrors;
use anyhow::Context;
use assetgraph_core::{AssetIdentity, File, Verbosity};
use assetgraph_engine::{Asset, AssetContext, AssetKind, ParentSet};
use assetgraph_store::FileFetcher;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Output file, relative to the output directory
pub const NMSTATE_CONFIG_FILENAME: &str = "cluster-manifests/nmstateconfig.yaml";

const NMSTATE_API_VERSION: &str = "agent-install.openshift.io/v1beta1";
const INFRA_ENV_LABEL: &str = "infraenvs.agent-install.openshift.io";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NmStateInterface {
    pub name: String,
    pub mac_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NmStateConfigSpec {
    /// Raw NMState network configuration
    #[serde(default)]
    pub config: serde_yaml::Value,

    #[serde(default)]
    pub interfaces: Vec<NmStateInterface>,
}

/// One NMStateConfig document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NmStateConfigDoc {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: NmStateConfigSpec,
}

/// Static network configuration of one host
#[derive(Debug, Clone, PartialEq)]
pub struct StaticNetworkConfig {
    /// MAC address to logical NIC name
    pub mac_interface_map: BTreeMap<String, String>,
    pub network_yaml: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedFile {
    data: String,
}

/// Multi-document `nmstateconfig.yaml`, one document per host with a
/// network configuration
#[derive(Debug, Default)]
pub struct NmStateConfig {
    pub configs: Vec<NmStateConfigDoc>,
    pub static_network: Vec<StaticNetworkConfig>,
    file: Option<File>,
}

impl NmStateConfig {
    /// Parse, index and validate the contents of `nmstateconfig.yaml`
    fn restore(&mut self, data: &[u8], verbosity: Verbosity) -> anyhow::Result<()> {
        let configs: Vec<NmStateConfigDoc> = parse_documents(data)
            .with_context(|| format!("could not decode YAML for {NMSTATE_CONFIG_FILENAME}"))?;

        self.static_network = configs
            .iter()
            .map(|config| static_network_config(config, verbosity))
            .collect::<anyhow::Result<_>>()?;
        self.configs = configs;
        self.file = Some(File::new(NMSTATE_CONFIG_FILENAME, data.to_vec()));
        self.finish(verbosity)
    }

    fn finish(&self, verbosity: Verbosity) -> anyhow::Result<()> {
        if verbosity.allows(Verbosity::Info) {
            info!(hosts = self.static_network.len(), "Validating static network configuration");
        }
        validate_static_network(&self.static_network).context("staticNetwork configuration is not valid")?;
        self.validate_labels().context("invalid NMStateConfig configuration")?;
        Ok(())
    }

    fn validate_labels(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        for config in &self.configs {
            if config.metadata.labels.is_empty() {
                errors.required(
                    "ObjectMeta.Labels",
                    format!("{} does not have any label set", config.metadata.name),
                );
            }
        }
        errors.into_result()
    }
}

/// Decode every document of a multi-document YAML stream
///
/// Empty documents, such as the one after a trailing `---`, are skipped.
pub fn parse_documents<T: DeserializeOwned>(data: &[u8]) -> anyhow::Result<Vec<T>> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_slice(data) {
        let value = Option::<T>::deserialize(document).context("error reading multiple YAMLs")?;
        documents.extend(value);
    }
    Ok(documents)
}

fn static_network_config(config: &NmStateConfigDoc, verbosity: Verbosity) -> anyhow::Result<StaticNetworkConfig> {
    let mut mac_interface_map = BTreeMap::new();
    for interface in &config.spec.interfaces {
        if verbosity.allows(Verbosity::Debug) {
            debug!(
                name = %interface.name,
                mac_address = %interface.mac_address,
                "adding MAC interface map to host static network config"
            );
        }
        mac_interface_map.insert(interface.mac_address.clone(), interface.name.clone());
    }

    let network_yaml = serde_yaml::to_string(&config.spec.config)
        .context("failed to marshal network configuration")?;
    Ok(StaticNetworkConfig {
        mac_interface_map,
        network_yaml,
    })
}

/// Structural checks on each host's network configuration
///
/// Every configuration must declare named interfaces, and every NIC named in
/// the MAC map must be one of them.
fn validate_static_network(configs: &[StaticNetworkConfig]) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    for (i, config) in configs.iter().enumerate() {
        let path = format!("staticNetwork[{i}]");
        let network: serde_yaml::Value = match serde_yaml::from_str(&config.network_yaml) {
            Ok(network) => network,
            Err(e) => {
                errors.invalid(&path, "networkYaml", e);
                continue;
            }
        };

        let interfaces: Vec<&str> = network
            .get("interfaces")
            .and_then(serde_yaml::Value::as_sequence)
            .map(|seq| {
                seq.iter()
                    .filter_map(|interface| interface.get("name").and_then(serde_yaml::Value::as_str))
                    .collect()
            })
            .unwrap_or_default();

        if interfaces.is_empty() {
            errors.required(&format!("{path}.interfaces"), "no named interfaces in network configuration");
            continue;
        }
        for nic in config.mac_interface_map.values() {
            if !interfaces.contains(&nic.as_str()) {
                errors.invalid(&format!("{path}.interfaces"), nic, "interface is not defined in network configuration");
            }
        }
    }

    errors.into_result()
}

/// Check declared hosts against the configured replicas
///
/// Hosts without a role fill the control plane first. Too many hosts is an
/// error; too few is only a warning.
pub fn validate_host_count(config: &InstallConfigSpec, hosts: &[Host], verbosity: Verbosity) -> anyhow::Result<()> {
    let (required_masters, required_workers) = config.replica_counts();

    let mut masters = hosts.iter().filter(|h| h.role == "master").count() as i64;
    let mut workers = hosts.iter().filter(|h| h.role == "worker").count() as i64;
    for _ in hosts.iter().filter(|h| h.role.is_empty()) {
        if masters < required_masters {
            masters += 1;
        } else {
            workers += 1;
        }
    }

    let warnings = verbosity.allows(Verbosity::Warn);
    if masters != 0 && masters < required_masters && warnings {
        warn!(
            "not enough master hosts defined ({}) to support all the configured ControlPlane replicas ({})",
            masters, required_masters
        );
    }
    if masters > required_masters {
        anyhow::bail!(
            "the number of master hosts defined ({}) exceeds the configured ControlPlane replicas ({})",
            masters,
            required_masters
        );
    }

    if workers != 0 && workers < required_workers && warnings {
        warn!(
            "not enough worker hosts defined ({}) to support all the configured Compute replicas ({})",
            workers, required_workers
        );
    }
    if workers > required_workers {
        anyhow::bail!(
            "the number of worker hosts defined ({}) exceeds the configured Compute replicas ({})",
            workers,
            required_workers
        );
    }

    Ok(())
}

#[async_trait::async_trait]
impl Asset for NmStateConfig {
    fn identity(&self) -> AssetIdentity {
        Self::IDENTITY
    }

    fn name(&self) -> &str {
        "NMState Config"
    }

    fn dependencies(&self) -> Vec<AssetIdentity> {
        vec![AgentHosts::IDENTITY, InstallConfig::IDENTITY]
    }

    async fn generate(&mut self, ctx: &AssetContext, parents: &ParentSet) -> anyhow::Result<()> {
        let hosts = &parents.get::<AgentHosts>()?.hosts;
        let config = parents.get::<InstallConfig>()?.config()?;

        if hosts.is_empty() {
            return Ok(());
        }
        validate_host_count(config, hosts, ctx.verbosity())?;

        let cluster_name = config.cluster_name();
        let mut data = String::new();
        for (i, host) in hosts.iter().enumerate() {
            let Some(network) = &host.network_config else {
                continue;
            };

            let doc = NmStateConfigDoc {
                api_version: NMSTATE_API_VERSION.to_string(),
                kind: "NMStateConfig".to_string(),
                metadata: ObjectMeta {
                    name: format!("{cluster_name}-{i}"),
                    namespace: Some(cluster_name.to_string()),
                    labels: BTreeMap::from([(INFRA_ENV_LABEL.to_string(), cluster_name.to_string())]),
                },
                spec: NmStateConfigSpec {
                    config: network.clone(),
                    interfaces: host
                        .interfaces
                        .iter()
                        .map(|interface| NmStateInterface {
                            name: interface.name.clone(),
                            mac_address: interface.mac_address.clone(),
                        })
                        .collect(),
                },
            };

            // One document per host, never a YAML list
            data.push_str(
                &serde_yaml::to_string(&doc).context("failed to marshal agent installer NMStateConfig")?,
            );
            data.push_str("---\n");
        }

        if data.is_empty() {
            return Ok(());
        }
        self.restore(data.as_bytes(), ctx.verbosity())
    }

    async fn load(&mut self, ctx: &AssetContext, fetcher: &dyn FileFetcher) -> anyhow::Result<bool> {
        let Some(file) = fetcher
            .fetch_by_name(NMSTATE_CONFIG_FILENAME)
            .await
            .with_context(|| format!("failed to load file {NMSTATE_CONFIG_FILENAME}"))?
        else {
            return Ok(false);
        };

        self.restore(&file.data, ctx.verbosity())?;
        Ok(true)
    }

    fn files(&self) -> Vec<File> {
        self.file.iter().cloned().collect()
    }

    fn encode_state(&self) -> anyhow::Result<Option<Vec<u8>>> {
        match &self.file {
            Some(file) => persist::encode(&PersistedFile {
                data: String::from_utf8(file.data.clone()).context("nmstateconfig.yaml is not UTF-8")?,
            }),
            None => Ok(None),
        }
    }

    fn decode_state(&mut self, ctx: &AssetContext, bytes: &[u8]) -> anyhow::Result<()> {
        let persisted: PersistedFile = persist::decode(bytes)?;
        self.restore(persisted.data.as_bytes(), ctx.verbosity())
    }
}

impl AssetKind for NmStateConfig {
    const IDENTITY: AssetIdentity = AssetIdentity::new("nmstate-config");
}
