use serde::{Serialize, Deserialize};

use crate::services::openstack::Inventory;

fn default_max_limit() -> usize {
  1000
}

fn default_max_clusters_per_project() -> i64 {
  20
}

fn default_allowed_network_drivers() -> Vec<String> {
  vec![String::from("all")]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
  /// Upper bound of the `limit` parameter of listings
  #[serde(default = "default_max_limit")]
  pub(crate) max_limit: usize,
  /// Host used in links instead of the one of the request
  #[serde(default)]
  pub(crate) host_url: Option<String>,
}

impl Default for ApiSection {
  fn default() -> Self {
    ApiSection {
      max_limit: default_max_limit(),
      host_url: None,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotasSection {
  /// Quota applied to projects without an explicit one
  #[serde(default = "default_max_clusters_per_project")]
  pub(crate) max_clusters_per_project: i64,
}

impl Default for QuotasSection {
  fn default() -> Self {
    QuotasSection {
      max_clusters_per_project: default_max_clusters_per_project(),
    }
  }
}

/// Allowed network drivers per coe, `all` disables the filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterTemplateSection {
  #[serde(default = "default_allowed_network_drivers")]
  pub(crate) kubernetes_allowed_network_drivers: Vec<String>,
  #[serde(default = "default_allowed_network_drivers")]
  pub(crate) swarm_allowed_network_drivers: Vec<String>,
  #[serde(default = "default_allowed_network_drivers")]
  pub(crate) mesos_allowed_network_drivers: Vec<String>,
}

impl Default for ClusterTemplateSection {
  fn default() -> Self {
    ClusterTemplateSection {
      kubernetes_allowed_network_drivers: default_allowed_network_drivers(),
      swarm_allowed_network_drivers: default_allowed_network_drivers(),
      mesos_allowed_network_drivers: default_allowed_network_drivers(),
    }
  }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DriversSection {
  #[serde(default)]
  pub(crate) disabled_drivers: Vec<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TrustSection {
  #[serde(default)]
  pub(crate) trustee_domain_id: Option<String>,
}

#[derive(Default, Debug, Clone)]
pub struct DaemonConfig {
  pub(crate) hosts: Vec<String>,
  pub(crate) config_dir: String,
  pub(crate) policy_file: Option<String>,
  pub(crate) api: ApiSection,
  pub(crate) quotas: QuotasSection,
  pub(crate) cluster_template: ClusterTemplateSection,
  pub(crate) drivers: DriversSection,
  pub(crate) trust: TrustSection,
  pub(crate) inventory: Inventory,
}

#[derive(Default, Serialize, Deserialize)]
pub struct DaemonConfigFile {
  pub(crate) hosts: Option<Vec<String>>,
  pub(crate) policy_file: Option<String>,
  #[serde(default)]
  pub(crate) api: ApiSection,
  #[serde(default)]
  pub(crate) quotas: QuotasSection,
  #[serde(default)]
  pub(crate) cluster_template: ClusterTemplateSection,
  #[serde(default)]
  pub(crate) drivers: DriversSection,
  #[serde(default)]
  pub(crate) trust: TrustSection,
  #[serde(default)]
  pub(crate) inventory: Inventory,
}
