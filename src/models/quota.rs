use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::errors::MagnumError;

use super::types::*;
use super::ApiResource;

/// Quota item
/// this structure is a stored row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaItem {
  pub(crate) id: i64,
  pub(crate) project_id: String,
  pub(crate) resource: QuotaResource,
  pub(crate) hard_limit: i64,
  pub(crate) created_at: DateTime<Utc>,
  pub(crate) updated_at: Option<DateTime<Utc>>,
}

/// Wire representation of a quota
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quota {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) id: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) project_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) resource: Option<QuotaResource>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) hard_limit: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) created_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl ApiResource for Quota {
  const FIELDS: &'static [&'static str] = &[
    "id",
    "project_id",
    "resource",
    "hard_limit",
    "created_at",
    "updated_at",
  ];

  fn validate(&self) -> Result<(), MagnumError> {
    if let Some(project_id) = &self.project_id {
      validate_length("project_id", project_id, 1, 255)?;
    }
    if let Some(hard_limit) = self.hard_limit {
      validate_min("hard_limit", hard_limit, 0)?;
    }
    Ok(())
  }
}

impl Quota {
  /// Quota of a project without an explicit row
  pub fn synthesized(project_id: &str, resource: QuotaResource, hard_limit: i64) -> Self {
    Quota {
      project_id: Some(project_id.to_owned()),
      resource: Some(resource),
      hard_limit: Some(hard_limit),
      ..Default::default()
    }
  }
}

/// Query string of quota lookups
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct QuotaQuery {
  pub(crate) all_tenants: Option<String>,
  pub(crate) marker: Option<String>,
  pub(crate) limit: Option<i64>,
  pub(crate) sort_key: Option<String>,
  pub(crate) sort_dir: Option<String>,
}

#[cfg(test)]
mod test_quota {
  use serde_json::json;

  use super::*;

  #[test]
  fn constraints() {
    let dict = json!({ "project_id": "p1", "resource": "Cluster", "hard_limit": -1 });
    assert!(Quota::from_dict(dict.as_object().unwrap()).is_err());
    let dict = json!({ "project_id": "p1", "resource": "Node", "hard_limit": 1 });
    assert!(Quota::from_dict(dict.as_object().unwrap()).is_err());
    let dict = json!({ "project_id": "p1", "resource": "Cluster" });
    let quota = Quota::from_dict(dict.as_object().unwrap()).unwrap();
    assert_eq!(quota.hard_limit, None);
  }
}
