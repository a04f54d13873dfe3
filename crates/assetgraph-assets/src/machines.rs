//! GCP control plane machine manifests

use crate::cluster_id::ClusterId;
use crate::install_config::InstallConfig;
use crate::persist;
use crate::types::{GcpMachinePool, GcpPlatform, InstallConfigSpec, MachinePool, ObjectMeta, Publish};
use anyhow::Context;
use assetgraph_core::{AssetIdentity, File};
use assetgraph_engine::{Asset, AssetContext, AssetKind, ParentSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Manifest directory, relative to the output directory
pub const OPENSHIFT_MANIFEST_DIR: &str = "openshift";

/// Image used when neither the pool nor the platform names one
pub const DEFAULT_OS_IMAGE: &str = "projects/rhcos-cloud/global/images/rhcos-latest";

const MACHINE_API_VERSION: &str = "machine.openshift.io/v1beta1";
const MACHINE_NAMESPACE: &str = "openshift-machine-api";
const MASTER_ROLE: &str = "master";
const MASTER_USER_DATA: &str = "master-user-data";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalObjectReference {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpDisk {
    pub auto_delete: bool,
    pub boot: bool,
    #[serde(rename = "sizeGb")]
    pub size_gb: i64,
    #[serde(rename = "type")]
    pub disk_type: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpNetworkInterface {
    pub network: String,
    #[serde(rename = "projectID", default, skip_serializing_if = "String::is_empty")]
    pub project_id: String,
    pub subnetwork: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcpServiceAccount {
    pub email: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpMachineProviderSpec {
    pub api_version: String,
    pub kind: String,
    pub user_data_secret: LocalObjectReference,
    pub credentials_secret: LocalObjectReference,
    pub disks: Vec<GcpDisk>,
    pub network_interfaces: Vec<GcpNetworkInterface>,
    pub service_accounts: Vec<GcpServiceAccount>,
    pub tags: Vec<String>,
    pub machine_type: String,
    pub region: String,
    pub zone: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_pools: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub value: GcpMachineProviderSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    pub provider_spec: ProviderSpec,
}

/// One Machine object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: MachineSpec,
}

/// Build the machines of a GCP machine pool
///
/// Replicas are spread over the pool's zones round-robin. A pool without
/// replicas gets one machine.
pub fn gcp_machines(
    infra_id: &str,
    config: &InstallConfigSpec,
    pool: &MachinePool,
    role: &str,
    user_data_secret: &str,
) -> anyhow::Result<Vec<Machine>> {
    let platform = config
        .platform
        .gcp
        .as_ref()
        .with_context(|| format!("non-GCP configuration: {:?}", config.platform.name().unwrap_or("unknown")))?;
    let mpool = config
        .gcp_pool(pool)
        .with_context(|| format!("non-GCP machine-pool: {:?}", pool.name))?;
    if mpool.zones.is_empty() {
        anyhow::bail!("machine pool {:?} has no zones", pool.name);
    }

    let total = pool.replicas.unwrap_or(1);
    let mut machines = Vec::new();
    for idx in 0..total {
        let zone = &mpool.zones[idx as usize % mpool.zones.len()];
        let provider = provider_spec(infra_id, platform, &mpool, zone, role, user_data_secret)
            .context("failed to create provider")?;

        let labels = BTreeMap::from([
            ("machine.openshift.io/cluster-api-cluster".to_string(), infra_id.to_string()),
            ("machine.openshift.io/cluster-api-machine-role".to_string(), role.to_string()),
            ("machine.openshift.io/cluster-api-machine-type".to_string(), role.to_string()),
        ]);

        machines.push(Machine {
            api_version: MACHINE_API_VERSION.to_string(),
            kind: "Machine".to_string(),
            metadata: ObjectMeta {
                name: format!("{infra_id}-{}-{idx}", pool.name),
                namespace: Some(MACHINE_NAMESPACE.to_string()),
                labels,
            },
            spec: MachineSpec {
                provider_spec: ProviderSpec { value: provider },
            },
        });
    }

    Ok(machines)
}

fn provider_spec(
    infra_id: &str,
    platform: &GcpPlatform,
    mpool: &GcpMachinePool,
    zone: &str,
    role: &str,
    user_data_secret: &str,
) -> anyhow::Result<GcpMachineProviderSpec> {
    let image = if !platform.licenses.is_empty() {
        format!("{infra_id}-rhcos-image")
    } else if let Some(image) = &mpool.os_image {
        format!("projects/{}/global/images/{}", image.project, image.name)
    } else {
        DEFAULT_OS_IMAGE.to_string()
    };
    let (network, subnetwork) = networks(platform, infra_id, role)?;
    let role_initial = role.chars().next().context("machine role is empty")?;

    let mut tags = mpool.tags.clone();
    tags.push(format!("{infra_id}-{role}"));

    Ok(GcpMachineProviderSpec {
        api_version: MACHINE_API_VERSION.to_string(),
        kind: "GCPMachineProviderSpec".to_string(),
        user_data_secret: LocalObjectReference {
            name: user_data_secret.to_string(),
        },
        credentials_secret: LocalObjectReference {
            name: "gcp-cloud-credentials".to_string(),
        },
        disks: vec![GcpDisk {
            auto_delete: true,
            boot: true,
            size_gb: mpool.os_disk.disk_size_gb,
            disk_type: mpool.os_disk.disk_type.clone(),
            image,
        }],
        network_interfaces: vec![GcpNetworkInterface {
            network,
            project_id: platform.network_project_id.clone().unwrap_or_default(),
            subnetwork,
        }],
        service_accounts: vec![GcpServiceAccount {
            email: format!(
                "{infra_id}-{role_initial}@{}.iam.gserviceaccount.com",
                platform.project_id
            ),
            scopes: vec!["https://www.googleapis.com/auth/cloud-platform".to_string()],
        }],
        tags,
        machine_type: mpool.instance_type.clone().unwrap_or_default(),
        region: platform.region.clone(),
        zone: zone.to_string(),
        project_id: platform.project_id.clone(),
        target_pools: Vec::new(),
    })
}

/// Network and subnetwork for a role
///
/// Without a user-provided network the installer-created names are used.
fn networks(platform: &GcpPlatform, infra_id: &str, role: &str) -> anyhow::Result<(String, String)> {
    let Some(network) = &platform.network else {
        return Ok((format!("{infra_id}-network"), format!("{infra_id}-{role}-subnet")));
    };

    let subnet = match role {
        "worker" => &platform.compute_subnet,
        "master" => &platform.control_plane_subnet,
        other => anyhow::bail!("unrecognized machine role {other}"),
    };
    Ok((network.clone(), subnet.clone().unwrap_or_default()))
}

/// Attach the API load balancer target pool to control plane machines
pub fn config_masters(machines: &mut [Machine], infra_id: &str, publish: Publish) {
    let target_pools = match publish {
        Publish::External => vec![format!("{infra_id}-api")],
        Publish::Internal => Vec::new(),
    };

    for machine in machines {
        machine.spec.provider_spec.value.target_pools = target_pools.clone();
    }
}

/// Control plane Machine manifests, one file per replica
#[derive(Debug, Default)]
pub struct MasterMachines {
    machines: Vec<Machine>,
    files: Vec<File>,
}

impl MasterMachines {
    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    fn set(&mut self, machines: Vec<Machine>) -> anyhow::Result<()> {
        self.files = machines
            .iter()
            .enumerate()
            .map(|(i, machine)| -> anyhow::Result<File> {
                let data = serde_yaml::to_string(machine)
                    .with_context(|| format!("marshal master {i}"))?;
                Ok(File::new(
                    format!("{OPENSHIFT_MANIFEST_DIR}/99_openshift-cluster-api_master-machines-{i}.yaml"),
                    data,
                ))
            })
            .collect::<anyhow::Result<_>>()?;
        self.machines = machines;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Asset for MasterMachines {
    fn identity(&self) -> AssetIdentity {
        Self::IDENTITY
    }

    fn name(&self) -> &str {
        "Master Machines"
    }

    fn dependencies(&self) -> Vec<AssetIdentity> {
        vec![ClusterId::IDENTITY, InstallConfig::IDENTITY]
    }

    async fn generate(&mut self, _ctx: &AssetContext, parents: &ParentSet) -> anyhow::Result<()> {
        let cluster_id = parents.get::<ClusterId>()?;
        let config = parents.get::<InstallConfig>()?.config()?;

        let mut machines = gcp_machines(
            &cluster_id.infra_id,
            config,
            &config.control_plane,
            MASTER_ROLE,
            MASTER_USER_DATA,
        )
        .context("failed to create master machine objects")?;
        config_masters(&mut machines, &cluster_id.infra_id, config.publish);

        self.set(machines)
    }

    fn files(&self) -> Vec<File> {
        self.files.clone()
    }

    fn encode_state(&self) -> anyhow::Result<Option<Vec<u8>>> {
        persist::encode(&self.machines)
    }

    fn decode_state(&mut self, _ctx: &AssetContext, bytes: &[u8]) -> anyhow::Result<()> {
        self.set(persist::decode(bytes)?)
    }
}

impl AssetKind for MasterMachines {
    const IDENTITY: AssetIdentity = AssetIdentity::new("master-machines");
}
