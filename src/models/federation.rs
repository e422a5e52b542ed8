use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde_with::rust::double_option;

use crate::errors::MagnumError;

use super::link::Link;
use super::types::*;
use super::ApiResource;

/// Federation item
/// this structure is a stored row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationItem {
  pub(crate) id: i64,
  pub(crate) uuid: String,
  pub(crate) project_id: String,
  pub(crate) name: Option<String>,
  pub(crate) hostcluster_id: String,
  #[serde(default)]
  pub(crate) member_ids: Vec<String>,
  pub(crate) status: Option<Status>,
  pub(crate) status_reason: Option<String>,
  #[serde(default)]
  pub(crate) properties: BTreeMap<String, String>,
  pub(crate) created_at: DateTime<Utc>,
  pub(crate) updated_at: Option<DateTime<Utc>>,
}

/// Wire representation of a federation
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Federation {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) uuid: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) name: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) hostcluster_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) member_ids: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) status: Option<Option<Status>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) status_reason: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) properties: Option<BTreeMap<String, String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) project_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) created_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) updated_at: Option<Option<DateTime<Utc>>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) links: Option<Vec<Link>>,
}

pub const FEDERATION_SUMMARY: &[&str] = &[
  "uuid",
  "name",
  "hostcluster_id",
  "member_ids",
  "status",
  "properties",
  "links",
];

pub const FEDERATION_PATCH_RULES: PatchRules = PatchRules {
  internal_attrs: &["hostcluster_id"],
  non_removable_attrs: &["member_ids", "properties"],
};

/// Attributes a federation patch may change
pub const FEDERATION_UPDATE_ALLOWED_PROPERTIES: &[&str] = &["member_ids"];

/// Path of the membership attribute
pub const MEMBER_IDS_PATH: &str = "/member_ids";

impl ApiResource for Federation {
  const FIELDS: &'static [&'static str] = &[
    "uuid",
    "name",
    "hostcluster_id",
    "member_ids",
    "status",
    "status_reason",
    "properties",
    "project_id",
    "created_at",
    "updated_at",
  ];

  fn validate(&self) -> Result<(), MagnumError> {
    if let Some(name) = flatten(&self.name) {
      validate_name(name)?;
    }
    if let Some(host) = &self.hostcluster_id {
      validate_length("hostcluster_id", host, 1, 255)?;
    }
    Ok(())
  }
}

impl Federation {
  pub fn convert(item: &FederationItem, host_url: &str) -> Result<Self, MagnumError> {
    let mut federation = Self::from_item(item)?;
    federation.links = Some(Link::pair(host_url, "federations", &item.uuid));
    Ok(federation)
  }

  #[cfg(test)]
  pub fn sample() -> serde_json::Value {
    serde_json::json!({
      "name": "example",
      "hostcluster_id": "host",
      "member_ids": [],
      "properties": { "dns-zone": "example.com." },
    })
  }
}

/// Async create and update responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationId {
  pub(crate) uuid: String,
}

#[cfg(test)]
mod test_federation {
  use super::*;

  #[test]
  fn sample_is_valid() {
    let federation =
      Federation::from_dict(Federation::sample().as_object().unwrap()).unwrap();
    assert_eq!(federation.member_ids, Some(vec![]));
    assert_eq!(
      federation.properties.unwrap().get("dns-zone").map(String::as_str),
      Some("example.com.")
    );
  }
}
