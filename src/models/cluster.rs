use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde_with::rust::double_option;

use crate::errors::MagnumError;

use super::link::Link;
use super::nodegroup::NodeGroupItem;
use super::types::*;
use super::{to_dict, ApiResource};

/// Cluster item
/// this structure is a stored row, node counts live in its nodegroups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterItem {
  pub(crate) id: i64,
  pub(crate) uuid: String,
  pub(crate) project_id: String,
  pub(crate) user_id: String,
  pub(crate) name: Option<String>,
  pub(crate) cluster_template_id: String,
  pub(crate) keypair: Option<String>,
  pub(crate) docker_volume_size: Option<i64>,
  #[serde(default)]
  pub(crate) labels: Labels,
  pub(crate) master_flavor_id: Option<String>,
  pub(crate) flavor_id: Option<String>,
  pub(crate) create_timeout: Option<i64>,
  pub(crate) stack_id: Option<String>,
  pub(crate) status: Option<Status>,
  pub(crate) status_reason: Option<String>,
  pub(crate) health_status: Option<HealthStatus>,
  pub(crate) health_status_reason: Option<BTreeMap<String, String>>,
  pub(crate) discovery_url: Option<String>,
  pub(crate) api_address: Option<String>,
  pub(crate) coe_version: Option<String>,
  pub(crate) container_version: Option<String>,
  pub(crate) master_lb_enabled: Option<bool>,
  pub(crate) floating_ip_enabled: Option<bool>,
  pub(crate) fixed_network: Option<String>,
  pub(crate) fixed_subnet: Option<String>,
  pub(crate) ca_cert_ref: Option<String>,
  pub(crate) magnum_cert_ref: Option<String>,
  pub(crate) etcd_ca_cert_ref: Option<String>,
  pub(crate) front_proxy_ca_cert_ref: Option<String>,
  pub(crate) trust_id: Option<String>,
  pub(crate) trustee_username: Option<String>,
  pub(crate) trustee_password: Option<String>,
  pub(crate) trustee_user_id: Option<String>,
  pub(crate) created_at: DateTime<Utc>,
  pub(crate) updated_at: Option<DateTime<Utc>>,
}

/// Node counts and addresses of a cluster computed from its nodegroups
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterNodes {
  pub(crate) node_count: i64,
  pub(crate) master_count: i64,
  pub(crate) node_addresses: Vec<String>,
  pub(crate) master_addresses: Vec<String>,
}

impl ClusterNodes {
  pub fn from_nodegroups(nodegroups: &[NodeGroupItem]) -> Self {
    nodegroups.iter().fold(ClusterNodes::default(), |mut acc, ng| {
      if ng.is_master() {
        acc.master_count += ng.node_count;
        acc.master_addresses.extend(ng.node_addresses.iter().cloned());
      } else {
        acc.node_count += ng.node_count;
        acc.node_addresses.extend(ng.node_addresses.iter().cloned());
      }
      acc
    })
  }
}

/// Wire representation of a cluster
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) uuid: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) name: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) cluster_template_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) keypair: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) docker_volume_size: Option<Option<i64>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) labels: Option<Option<Labels>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) master_flavor_id: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) flavor_id: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) create_timeout: Option<Option<i64>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) node_count: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) master_count: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) stack_id: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) status: Option<Option<Status>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) status_reason: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) health_status: Option<Option<HealthStatus>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) health_status_reason: Option<Option<BTreeMap<String, String>>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) discovery_url: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) api_address: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) node_addresses: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) master_addresses: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) coe_version: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) container_version: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) faults: Option<BTreeMap<String, String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) master_lb_enabled: Option<Option<bool>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) floating_ip_enabled: Option<Option<bool>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) fixed_network: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) fixed_subnet: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) merge_labels: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) project_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) user_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) created_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) updated_at: Option<Option<DateTime<Utc>>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) links: Option<Vec<Link>>,
}

pub const CLUSTER_SUMMARY: &[&str] = &[
  "uuid",
  "name",
  "cluster_template_id",
  "keypair",
  "docker_volume_size",
  "labels",
  "node_count",
  "status",
  "master_flavor_id",
  "flavor_id",
  "create_timeout",
  "master_count",
  "stack_id",
  "health_status",
  "links",
];

pub const CLUSTER_PATCH_RULES: PatchRules = PatchRules {
  internal_attrs: &[
    "cluster_template_id",
    "api_address",
    "node_addresses",
    "master_addresses",
    "stack_id",
    "ca_cert_ref",
    "magnum_cert_ref",
    "trust_id",
    "trustee_username",
    "trustee_password",
    "trustee_user_id",
    "etcd_ca_cert_ref",
    "front_proxy_ca_cert_ref",
  ],
  non_removable_attrs: &["node_count", "master_count"],
};

/// Attributes a patch may change once the cluster exists
pub const CLUSTER_UPDATE_ALLOWED_PROPERTIES: &[&str] =
  &["node_count", "health_status", "health_status_reason"];

/// Attributes changed by a health report only
pub const CLUSTER_HEALTH_PROPERTIES: &[&str] =
  &["health_status", "health_status_reason"];

impl ApiResource for Cluster {
  const FIELDS: &'static [&'static str] = &[
    "uuid",
    "name",
    "cluster_template_id",
    "keypair",
    "docker_volume_size",
    "labels",
    "master_flavor_id",
    "flavor_id",
    "create_timeout",
    "node_count",
    "master_count",
    "stack_id",
    "status",
    "status_reason",
    "health_status",
    "health_status_reason",
    "discovery_url",
    "api_address",
    "node_addresses",
    "master_addresses",
    "coe_version",
    "container_version",
    "faults",
    "master_lb_enabled",
    "floating_ip_enabled",
    "fixed_network",
    "fixed_subnet",
    "merge_labels",
    "project_id",
    "user_id",
    "created_at",
    "updated_at",
  ];

  fn validate(&self) -> Result<(), MagnumError> {
    if let Some(name) = flatten(&self.name) {
      validate_name(name)?;
    }
    if let Some(template_id) = &self.cluster_template_id {
      validate_length("cluster_template_id", template_id, 1, 255)?;
    }
    validate_opt_length("keypair", &self.keypair, 1, 255)?;
    validate_opt_length("master_flavor_id", &self.master_flavor_id, 1, 255)?;
    validate_opt_length("flavor_id", &self.flavor_id, 1, 255)?;
    validate_opt_length("discovery_url", &self.discovery_url, 0, 255)?;
    validate_opt_length("fixed_network", &self.fixed_network, 0, 255)?;
    validate_opt_length("fixed_subnet", &self.fixed_subnet, 0, 255)?;
    validate_opt_min("docker_volume_size", &self.docker_volume_size, 1)?;
    validate_opt_min("create_timeout", &self.create_timeout, 0)?;
    if let Some(node_count) = self.node_count {
      validate_min("node_count", node_count, 0)?;
    }
    if let Some(master_count) = self.master_count {
      validate_min("master_count", master_count, 1)?;
    }
    Ok(())
  }
}

impl Cluster {
  /// Wire form of a row, counts and addresses come from `nodegroups`
  pub fn convert(
    item: &ClusterItem,
    nodegroups: &[NodeGroupItem],
    host_url: &str,
  ) -> Result<Self, MagnumError> {
    let mut dict = to_dict(item)?;
    let nodes = to_dict(&ClusterNodes::from_nodegroups(nodegroups))?;
    dict.extend(nodes);
    let mut cluster = Self::from_dict(&dict)?;
    cluster.links = Some(Link::pair(host_url, "clusters", &item.uuid));
    Ok(cluster)
  }

  /// Labels set on the cluster, empty when unset or null
  pub fn labels(&self) -> Labels {
    self.labels.clone().flatten().unwrap_or_default()
  }

  #[cfg(test)]
  pub fn sample() -> serde_json::Value {
    serde_json::json!({
      "name": "example",
      "cluster_template_id": "example",
      "node_count": 2,
      "master_count": 1,
      "docker_volume_size": 1,
      "create_timeout": 15,
      "labels": {},
    })
  }
}

/// Async create and update responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterId {
  pub(crate) uuid: String,
}

/// Body of a resize action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterResizeRequest {
  pub(crate) node_count: i64,
  #[serde(default)]
  pub(crate) nodes_to_remove: Vec<String>,
  pub(crate) nodegroup: Option<String>,
}

fn default_max_batch_size() -> i64 {
  1
}

/// Body of an upgrade action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterUpgradeRequest {
  pub(crate) cluster_template: String,
  #[serde(default = "default_max_batch_size")]
  pub(crate) max_batch_size: i64,
  pub(crate) nodegroup: Option<String>,
}

/// Fault of a failed stack resource keyed by resource name
pub type Faults = BTreeMap<String, String>;
