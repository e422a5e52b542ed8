//! Legacy names of clusters and templates
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};
use serde_with::rust::double_option;

use crate::errors::MagnumError;

use super::cluster::Cluster;
use super::cluster_template::ClusterTemplate;
use super::link::Link;
use super::types::*;
use super::ApiResource;

/// Bay wire names and the cluster attributes they stand for
pub const BAY_RENAMES: &[(&str, &str)] = &[
  ("baymodel_id", "cluster_template_id"),
  ("bay_create_timeout", "create_timeout"),
  ("bay_faults", "faults"),
];

/// A baymodel is a cluster template served under another collection
pub type BayModel = ClusterTemplate;

/// Cluster attribute behind a bay attribute
pub fn bay_field_to_cluster(field: &str) -> &str {
  BAY_RENAMES
    .iter()
    .find(|(bay, _)| *bay == field)
    .map(|(_, cluster)| *cluster)
    .unwrap_or(field)
}

fn cluster_field_to_bay(field: &str) -> &str {
  BAY_RENAMES
    .iter()
    .find(|(_, cluster)| *cluster == field)
    .map(|(bay, _)| *bay)
    .unwrap_or(field)
}

fn rename_keys<F>(dict: Map<String, Value>, rename: F) -> Map<String, Value>
where
  F: Fn(&str) -> &str,
{
  dict
    .into_iter()
    .map(|(key, value)| (rename(&key).to_owned(), value))
    .collect()
}

/// Wire representation of a bay
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bay {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) uuid: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) name: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) baymodel_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) keypair: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) node_count: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) master_count: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) docker_volume_size: Option<Option<i64>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) labels: Option<Option<Labels>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) master_flavor_id: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) flavor_id: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) bay_create_timeout: Option<Option<i64>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) stack_id: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) status: Option<Option<Status>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) status_reason: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) discovery_url: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) api_address: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) coe_version: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) container_version: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) node_addresses: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) master_addresses: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) bay_faults: Option<BTreeMap<String, String>>,
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

pub const BAY_SUMMARY: &[&str] = &[
  "uuid",
  "name",
  "baymodel_id",
  "node_count",
  "status",
  "bay_create_timeout",
  "master_count",
  "stack_id",
  "links",
];

pub const BAY_PATCH_RULES: PatchRules = PatchRules {
  internal_attrs: &[
    "baymodel_id",
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

impl ApiResource for Bay {
  const FIELDS: &'static [&'static str] = &[
    "uuid",
    "name",
    "baymodel_id",
    "keypair",
    "node_count",
    "master_count",
    "docker_volume_size",
    "labels",
    "master_flavor_id",
    "flavor_id",
    "bay_create_timeout",
    "stack_id",
    "status",
    "status_reason",
    "discovery_url",
    "api_address",
    "coe_version",
    "container_version",
    "node_addresses",
    "master_addresses",
    "bay_faults",
    "project_id",
    "user_id",
    "created_at",
    "updated_at",
  ];

  fn validate(&self) -> Result<(), MagnumError> {
    if let Some(name) = flatten(&self.name) {
      validate_name(name)?;
    }
    if let Some(baymodel_id) = &self.baymodel_id {
      validate_length("baymodel_id", baymodel_id, 1, 255)?;
    }
    validate_opt_min("bay_create_timeout", &self.bay_create_timeout, 0)?;
    validate_opt_min("docker_volume_size", &self.docker_volume_size, 1)?;
    if let Some(node_count) = self.node_count {
      validate_min("node_count", node_count, 0)?;
    }
    if let Some(master_count) = self.master_count {
      validate_min("master_count", master_count, 1)?;
    }
    Ok(())
  }
}

impl Bay {
  /// Rename the attributes of a cluster, links point to `bays`
  pub fn from_cluster(cluster: &Cluster, host_url: &str) -> Result<Self, MagnumError> {
    let mut dict = cluster.as_dict()?;
    dict.remove("links");
    let mut bay = Self::from_dict(&rename_keys(dict, cluster_field_to_bay))?;
    if let Some(uuid) = &cluster.uuid {
      bay.links = Some(Link::pair(host_url, "bays", uuid));
    }
    Ok(bay)
  }

  /// Cluster attributes of this bay
  pub fn to_cluster_dict(&self) -> Result<Map<String, Value>, MagnumError> {
    let mut dict = self.as_dict()?;
    dict.remove("links");
    Ok(rename_keys(dict, bay_field_to_cluster))
  }

  pub fn to_cluster(&self) -> Result<Cluster, MagnumError> {
    Cluster::from_dict(&self.to_cluster_dict()?)
  }
}

#[cfg(test)]
mod test_bay {
  use serde_json::json;

  use super::*;

  #[test]
  fn rename_table() {
    assert_eq!(bay_field_to_cluster("baymodel_id"), "cluster_template_id");
    assert_eq!(bay_field_to_cluster("bay_faults"), "faults");
    assert_eq!(bay_field_to_cluster("node_count"), "node_count");
  }

  #[test]
  fn cluster_to_bay_and_back() {
    let cluster = Cluster::from_dict(
      json!({
        "uuid": "5d12f6fd-a196-4bf0-ae4c-1f639a523a52",
        "name": "b1",
        "cluster_template_id": "t1",
        "create_timeout": 30,
        "node_count": 2,
        "master_count": 1,
        "faults": {},
      })
      .as_object()
      .unwrap(),
    )
    .unwrap();
    let bay = Bay::from_cluster(&cluster, "http://h").unwrap();
    let dict = bay.as_dict().unwrap();
    assert_eq!(dict.get("baymodel_id"), Some(&json!("t1")));
    assert_eq!(dict.get("bay_create_timeout"), Some(&json!(30)));
    assert!(dict.contains_key("bay_faults"));
    assert!(!dict.contains_key("cluster_template_id"));
    assert!(bay.links.as_ref().unwrap()[0].href.contains("/v1/bays/"));

    let back = bay.to_cluster().unwrap();
    assert_eq!(back.cluster_template_id.as_deref(), Some("t1"));
    assert_eq!(back.create_timeout, Some(Some(30)));
    assert_eq!(back.node_count, Some(2));
  }
}
