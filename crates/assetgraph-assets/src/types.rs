//! Install configuration and manifest types
//!
//! Field names follow the on-disk YAML (`install-config.yaml`), so these
//! types serialize with camelCase keys.

use crate::validation::FieldErrors;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const GCP: &str = "gcp";
pub const NONE: &str = "none";

/// Kubernetes object metadata, reduced to what the manifests use
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// How the cluster's endpoints are published
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Publish {
    #[default]
    External,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsDisk {
    #[serde(default = "default_disk_size", rename = "diskSizeGB")]
    pub disk_size_gb: i64,

    #[serde(default = "default_disk_type")]
    pub disk_type: String,
}

fn default_disk_size() -> i64 {
    128
}

fn default_disk_type() -> String {
    "pd-ssd".to_string()
}

impl Default for OsDisk {
    fn default() -> Self {
        Self {
            disk_size_gb: default_disk_size(),
            disk_type: default_disk_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsImage {
    pub project: String,
    pub name: String,
}

/// GCP settings of one machine pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpMachinePool {
    #[serde(default)]
    pub zones: Vec<String>,

    #[serde(default, rename = "type")]
    pub instance_type: Option<String>,

    #[serde(default)]
    pub os_disk: OsDisk,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_image: Option<OsImage>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachinePoolPlatform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp: Option<GcpMachinePool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachinePool {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i64>,

    #[serde(default)]
    pub platform: MachinePoolPlatform,
}

/// Cluster-wide GCP settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpPlatform {
    #[serde(rename = "projectID")]
    pub project_id: String,

    pub region: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_subnet: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_subnet: Option<String>,

    #[serde(default, rename = "networkProjectID", skip_serializing_if = "Option::is_none")]
    pub network_project_id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_machine_platform: Option<GcpMachinePool>,
}

/// Exactly one platform is expected to be set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp: Option<GcpPlatform>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub none: Option<BTreeMap<String, String>>,
}

impl Platform {
    /// Platform name, or `None` if no known platform is set
    pub fn name(&self) -> Option<&'static str> {
        if self.gcp.is_some() {
            Some(GCP)
        } else if self.none.is_some() {
            Some(NONE)
        } else {
            None
        }
    }
}

/// Parsed `install-config.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallConfigSpec {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    pub metadata: ObjectMeta,

    #[serde(default)]
    pub base_domain: String,

    #[serde(default)]
    pub platform: Platform,

    #[serde(default)]
    pub control_plane: MachinePool,

    #[serde(default)]
    pub compute: Vec<MachinePool>,

    #[serde(default)]
    pub publish: Publish,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_mode: Option<String>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

/// Replicas assumed when a pool leaves them unset
pub const DEFAULT_REPLICAS: i64 = 3;

impl InstallConfigSpec {
    /// Configuration used when the user provides none
    pub fn with_defaults() -> Self {
        let zones = ["us-central1-a", "us-central1-b", "us-central1-c"]
            .map(String::from)
            .to_vec();
        let pool = |name: &str| MachinePool {
            name: name.to_string(),
            replicas: Some(DEFAULT_REPLICAS),
            platform: MachinePoolPlatform::default(),
        };

        Self {
            api_version: default_api_version(),
            metadata: ObjectMeta {
                name: "ostest".to_string(),
                ..ObjectMeta::default()
            },
            base_domain: "example.com".to_string(),
            platform: Platform {
                gcp: Some(GcpPlatform {
                    project_id: "openshift-dev".to_string(),
                    region: "us-central1".to_string(),
                    default_machine_platform: Some(GcpMachinePool {
                        zones,
                        instance_type: Some("n2-standard-4".to_string()),
                        ..GcpMachinePool::default()
                    }),
                    ..GcpPlatform::default()
                }),
                none: None,
            },
            control_plane: pool("master"),
            compute: vec![pool("worker")],
            publish: Publish::External,
            credentials_mode: None,
        }
    }

    pub fn cluster_name(&self) -> &str {
        &self.metadata.name
    }

    /// Required control plane and compute replicas
    pub fn replica_counts(&self) -> (i64, i64) {
        let masters = self.control_plane.replicas.unwrap_or(DEFAULT_REPLICAS);
        let workers = self
            .compute
            .iter()
            .map(|pool| pool.replicas.unwrap_or(DEFAULT_REPLICAS))
            .sum();
        (masters, workers)
    }

    /// GCP settings of a pool, falling back to the platform defaults
    pub fn gcp_pool(&self, pool: &MachinePool) -> Option<GcpMachinePool> {
        let defaults = self
            .platform
            .gcp
            .as_ref()
            .and_then(|gcp| gcp.default_machine_platform.clone());

        match (pool.platform.gcp.clone(), defaults) {
            (Some(mut own), Some(defaults)) => {
                if own.zones.is_empty() {
                    own.zones = defaults.zones;
                }
                if own.instance_type.is_none() {
                    own.instance_type = defaults.instance_type;
                }
                if own.os_image.is_none() {
                    own.os_image = defaults.os_image;
                }
                Some(own)
            }
            (own, defaults) => own.or(defaults),
        }
    }

    /// Check the structural invariants of the configuration
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.metadata.name.trim().is_empty() {
            errors.required("metadata.name", "cluster name must be set");
        }
        if self.base_domain.trim().is_empty() {
            errors.required("baseDomain", "base domain must be set");
        }

        match self.platform.name() {
            None => errors.required("platform", "exactly one platform must be configured"),
            Some(GCP) => self.validate_gcp(&mut errors),
            Some(_) => {}
        }

        if let Some(replicas) = self.control_plane.replicas {
            if replicas < 1 {
                errors.invalid("controlPlane.replicas", replicas, "must be at least 1");
            }
        }
        for (i, pool) in self.compute.iter().enumerate() {
            if let Some(replicas) = pool.replicas.filter(|r| *r < 0) {
                errors.invalid(&format!("compute[{i}].replicas"), replicas, "must not be negative");
            }
        }

        errors.into_result()
    }

    fn validate_gcp(&self, errors: &mut FieldErrors) {
        let Some(gcp) = &self.platform.gcp else {
            return;
        };

        if gcp.project_id.trim().is_empty() {
            errors.required("platform.gcp.projectID", "GCP project must be set");
        }
        if gcp.region.trim().is_empty() {
            errors.required("platform.gcp.region", "GCP region must be set");
        }
        let zones = self
            .gcp_pool(&self.control_plane)
            .map(|pool| pool.zones)
            .unwrap_or_default();
        if zones.is_empty() {
            errors.required("controlPlane.platform.gcp.zones", "at least one zone is needed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
apiVersion: v1
metadata:
  name: prod
baseDomain: example.org
platform:
  gcp:
    projectID: acme-prod
    region: europe-west4
    defaultMachinePlatform:
      zones: [europe-west4-a, europe-west4-b]
controlPlane:
  name: master
  replicas: 3
  platform:
    gcp:
      type: n2-standard-8
compute:
- name: worker
  replicas: 2
publish: Internal
"#;

    #[test]
    fn parse_install_config_yaml() {
        let config: InstallConfigSpec = serde_yaml::from_str(SAMPLE).unwrap();

        assert_eq!(config.cluster_name(), "prod");
        assert_eq!(config.platform.name(), Some(GCP));
        assert_eq!(config.publish, Publish::Internal);
        assert_eq!(config.replica_counts(), (3, 2));
        config.validate().unwrap();
    }

    #[test]
    fn pool_inherits_platform_defaults() {
        let config: InstallConfigSpec = serde_yaml::from_str(SAMPLE).unwrap();

        let pool = config.gcp_pool(&config.control_plane).unwrap();
        assert_eq!(pool.zones, vec!["europe-west4-a", "europe-west4-b"]);
        assert_eq!(pool.instance_type.as_deref(), Some("n2-standard-8"));
        assert_eq!(pool.os_disk.disk_size_gb, 128);
    }

    #[test]
    fn defaults_are_valid() {
        InstallConfigSpec::with_defaults().validate().unwrap();
    }

    #[test]
    fn validation_collects_every_problem() {
        let mut config = InstallConfigSpec::with_defaults();
        config.metadata.name = String::new();
        config.base_domain = " ".to_string();
        config.control_plane.replicas = Some(0);

        let err = config.validate().unwrap_err();
        assert_eq!(err.len(), 3);
        assert!(err.to_string().contains("metadata.name"));
    }

    #[test]
    fn missing_platform_is_invalid() {
        let mut config = InstallConfigSpec::with_defaults();
        config.platform = Platform::default();

        assert!(config.validate().unwrap_err().to_string().contains("platform"));
    }
}
