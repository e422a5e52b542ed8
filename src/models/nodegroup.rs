use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde_with::rust::double_option;

use crate::errors::MagnumError;

use super::link::Link;
use super::types::*;
use super::ApiResource;

pub const MASTER_ROLE: &str = "master";
pub const WORKER_ROLE: &str = "worker";

/// Nodegroup item
/// this structure is a stored row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeGroupItem {
  pub(crate) id: i64,
  pub(crate) uuid: String,
  pub(crate) name: String,
  pub(crate) cluster_id: String,
  pub(crate) project_id: String,
  pub(crate) flavor_id: Option<String>,
  pub(crate) image_id: Option<String>,
  pub(crate) docker_volume_size: Option<i64>,
  #[serde(default)]
  pub(crate) labels: Labels,
  #[serde(default)]
  pub(crate) node_addresses: Vec<String>,
  pub(crate) node_count: i64,
  pub(crate) role: String,
  pub(crate) min_node_count: i64,
  pub(crate) max_node_count: Option<i64>,
  pub(crate) is_default: bool,
  pub(crate) stack_id: Option<String>,
  pub(crate) status: Option<Status>,
  pub(crate) status_reason: Option<String>,
  pub(crate) version: Option<String>,
  pub(crate) created_at: DateTime<Utc>,
  pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl NodeGroupItem {
  pub fn is_master(&self) -> bool {
    self.role == MASTER_ROLE
  }

  #[cfg(test)]
  pub fn sample(cluster_id: &str) -> Self {
    NodeGroupItem {
      id: 1,
      uuid: uuid::Uuid::new_v4().to_string(),
      name: String::from("default-worker"),
      cluster_id: cluster_id.to_owned(),
      project_id: String::from("p1"),
      flavor_id: Some(String::from("m1.small")),
      image_id: Some(String::from("Fedora-k8s")),
      docker_volume_size: None,
      labels: Labels::new(),
      node_addresses: Vec::new(),
      node_count: 1,
      role: String::from(WORKER_ROLE),
      min_node_count: 0,
      max_node_count: None,
      is_default: true,
      stack_id: None,
      status: None,
      status_reason: None,
      version: None,
      created_at: Utc::now(),
      updated_at: None,
    }
  }
}

/// Wire representation of a nodegroup
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGroup {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) id: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) uuid: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) cluster_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) project_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) flavor_id: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) image_id: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) docker_volume_size: Option<Option<i64>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) labels: Option<Labels>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) node_addresses: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) node_count: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) role: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) min_node_count: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) max_node_count: Option<Option<i64>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) is_default: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) stack_id: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) status: Option<Option<Status>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) status_reason: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) version: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) merge_labels: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) created_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) updated_at: Option<Option<DateTime<Utc>>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) links: Option<Vec<Link>>,
}

pub const NODEGROUP_SUMMARY: &[&str] = &[
  "uuid",
  "name",
  "flavor_id",
  "node_count",
  "role",
  "is_default",
  "image_id",
  "status",
  "stack_id",
  "links",
];

pub const NODEGROUP_PATCH_RULES: PatchRules = PatchRules {
  internal_attrs: &[
    "node_addresses",
    "image_id",
    "role",
    "docker_volume_size",
    "labels",
    "flavor_id",
    "cluster_id",
    "is_default",
    "stack_id",
    "status",
    "version",
  ],
  non_removable_attrs: &["node_count", "name"],
};

/// Attributes a nodegroup patch may change
pub const NODEGROUP_UPDATE_ALLOWED_PROPERTIES: &[&str] =
  &["min_node_count", "max_node_count", "node_count"];

impl ApiResource for NodeGroup {
  const FIELDS: &'static [&'static str] = &[
    "id",
    "uuid",
    "name",
    "cluster_id",
    "project_id",
    "flavor_id",
    "image_id",
    "docker_volume_size",
    "labels",
    "node_addresses",
    "node_count",
    "role",
    "min_node_count",
    "max_node_count",
    "is_default",
    "stack_id",
    "status",
    "status_reason",
    "version",
    "merge_labels",
    "created_at",
    "updated_at",
  ];

  fn validate(&self) -> Result<(), MagnumError> {
    if let Some(name) = &self.name {
      validate_length("name", name, 1, 255)?;
    }
    if let Some(role) = &self.role {
      validate_length("role", role, 1, 255)?;
    }
    validate_opt_length("flavor_id", &self.flavor_id, 1, 255)?;
    validate_opt_length("image_id", &self.image_id, 1, 255)?;
    validate_opt_min("docker_volume_size", &self.docker_volume_size, 1)?;
    // zero sized groups are checked against the api version by the caller
    if let Some(node_count) = self.node_count {
      validate_min("node_count", node_count, 0)?;
    }
    if let Some(min) = self.min_node_count {
      validate_min("min_node_count", min, 0)?;
    }
    validate_opt_min("max_node_count", &self.max_node_count, 1)?;
    Ok(())
  }
}

impl NodeGroup {
  pub fn convert(
    item: &NodeGroupItem,
    cluster_ident: &str,
    host_url: &str,
  ) -> Result<Self, MagnumError> {
    let mut nodegroup = Self::from_item(item)?;
    let args = format!("{}/nodegroups/{}", cluster_ident, item.uuid);
    nodegroup.links = Some(Link::pair(host_url, "clusters", &args));
    Ok(nodegroup)
  }

  /// Check `min_node_count <= node_count <= max_node_count`
  pub fn validate_counts(&self) -> Result<(), MagnumError> {
    let node_count = self.node_count.unwrap_or(1);
    let min = self.min_node_count.unwrap_or(0);
    if node_count < min {
      return Err(MagnumError::invalid(format!(
        "node_count {} is lower than min_node_count {}",
        node_count, min
      )));
    }
    if let Some(max) = flatten(&self.max_node_count) {
      if *max < min {
        return Err(MagnumError::invalid(format!(
          "min_node_count {} is greater than max_node_count {}",
          min, max
        )));
      }
      if node_count > *max {
        return Err(MagnumError::invalid(format!(
          "node_count {} is greater than max_node_count {}",
          node_count, max
        )));
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod test_nodegroup {
  use serde_json::json;

  use super::*;

  #[test]
  fn counts() {
    let ng = NodeGroup::from_dict(
      json!({ "node_count": 2, "min_node_count": 1, "max_node_count": 3 })
        .as_object()
        .unwrap(),
    )
    .unwrap();
    assert!(ng.validate_counts().is_ok());
    let ng = NodeGroup::from_dict(
      json!({ "node_count": 5, "max_node_count": 3 }).as_object().unwrap(),
    )
    .unwrap();
    assert!(ng.validate_counts().is_err());
    let ng = NodeGroup::from_dict(
      json!({ "node_count": 1, "min_node_count": 2 }).as_object().unwrap(),
    )
    .unwrap();
    assert!(ng.validate_counts().is_err());
  }

  #[test]
  fn links_are_nested_under_the_cluster() {
    let item = NodeGroupItem::sample("c1");
    let ng = NodeGroup::convert(&item, "c1", "http://h").unwrap();
    let links = ng.links.unwrap();
    assert_eq!(
      links[0].href,
      format!("http://h/v1/clusters/c1/nodegroups/{}", item.uuid)
    );
  }
}
