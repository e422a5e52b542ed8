//! Scalar api types and their validation rules
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, Deserialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::MagnumError;

/// Pattern of cluster and federation names
pub const NAME_PATTERN: &str = "^[a-zA-Z][a-zA-Z0-9_.-]*$";
/// First segment of a json patch path
pub const PATCH_PATH_PATTERN: &str = r"^/[\w-]+(/.*)?$";

lazy_static! {
  static ref NAME_RE: Regex = Regex::new(NAME_PATTERN).expect("valid name pattern");
  static ref PATCH_PATH_RE: Regex =
    Regex::new(PATCH_PATH_PATTERN).expect("valid patch path pattern");
}

/// Container orchestration engine of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Coe {
  Kubernetes,
  Swarm,
  SwarmMode,
  Mesos,
  Dcos,
}

impl fmt::Display for Coe {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Coe::Kubernetes => "kubernetes",
      Coe::Swarm => "swarm",
      Coe::SwarmMode => "swarm-mode",
      Coe::Mesos => "mesos",
      Coe::Dcos => "dcos",
    };
    write!(f, "{}", name)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
  Vm,
  Bm,
}

impl Default for ServerType {
  fn default() -> Self {
    ServerType::Vm
  }
}

impl fmt::Display for ServerType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ServerType::Vm => write!(f, "vm"),
      ServerType::Bm => write!(f, "bm"),
    }
  }
}

/// Status of clusters, nodegroups and federations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
  CreateInProgress,
  CreateFailed,
  CreateComplete,
  UpdateInProgress,
  UpdateFailed,
  UpdateComplete,
  DeleteInProgress,
  DeleteFailed,
  DeleteComplete,
  ResumeComplete,
  ResumeFailed,
  RestoreComplete,
  RollbackInProgress,
  RollbackFailed,
  RollbackComplete,
  SnapshotComplete,
  CheckComplete,
  AdoptComplete,
}

impl Status {
  pub fn is_failed(&self) -> bool {
    matches!(
      self,
      Status::CreateFailed
        | Status::UpdateFailed
        | Status::DeleteFailed
        | Status::ResumeFailed
        | Status::RollbackFailed
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
  Healthy,
  Unhealthy,
  Unknown,
}

/// Resources a quota can limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaResource {
  Cluster,
}

impl Default for QuotaResource {
  fn default() -> Self {
    QuotaResource::Cluster
  }
}

impl fmt::Display for QuotaResource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Cluster")
  }
}

/// Label value, a union of scalar types.
///
/// Variants are tried in order, the first one accepting the value wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MultiType {
  Bool(bool),
  Int(i64),
  Float(f64),
  Text(String),
}

impl MultiType {
  /// Textual form used by label validators
  pub fn as_text(&self) -> String {
    match self {
      MultiType::Bool(b) => b.to_string(),
      MultiType::Int(i) => i.to_string(),
      MultiType::Float(f) => f.to_string(),
      MultiType::Text(s) => s.to_owned(),
    }
  }
}

pub type Labels = BTreeMap<String, MultiType>;

/// Whether `value` is a canonical uuid
pub fn is_uuid_like(value: &str) -> bool {
  Uuid::parse_str(value)
    .map(|uuid| {
      uuid.hyphenated().to_string() == value.to_lowercase()
        || uuid.simple().to_string() == value.to_lowercase()
    })
    .unwrap_or(false)
}

pub fn validate_uuid(field: &str, value: &str) -> Result<(), MagnumError> {
  if !is_uuid_like(value) {
    return Err(MagnumError::invalid(format!(
      "Expected a uuid but received {} for {}.",
      value, field
    )));
  }
  Ok(())
}

/// Length bounds of a text field, counted in characters
pub fn validate_length(
  field: &str,
  value: &str,
  min: usize,
  max: usize,
) -> Result<(), MagnumError> {
  let len = value.chars().count();
  if len < min || len > max {
    return Err(MagnumError::invalid(format!(
      "Invalid input for field {}: length of {} must be between {} and {}.",
      field, value, min, max
    )));
  }
  Ok(())
}

pub fn validate_min<T>(field: &str, value: T, min: T) -> Result<(), MagnumError>
where
  T: PartialOrd + fmt::Display,
{
  if value < min {
    return Err(MagnumError::invalid(format!(
      "Invalid input for field {}: value {} must be greater than or equal to {}.",
      field, value, min
    )));
  }
  Ok(())
}

pub fn validate_range<T>(
  field: &str,
  value: T,
  min: T,
  max: T,
) -> Result<(), MagnumError>
where
  T: PartialOrd + fmt::Display,
{
  if value < min || value > max {
    return Err(MagnumError::invalid(format!(
      "Invalid input for field {}: value {} must be between {} and {}.",
      field, value, min, max
    )));
  }
  Ok(())
}

pub fn validate_pattern(field: &str, value: &str, re: &Regex) -> Result<(), MagnumError> {
  if !re.is_match(value) {
    return Err(MagnumError::invalid(format!(
      "Invalid input for field {}: {} does not match {}.",
      field,
      value,
      re.as_str()
    )));
  }
  Ok(())
}

/// Cluster and federation names: 1..=242 characters starting with a letter
pub fn validate_name(value: &str) -> Result<(), MagnumError> {
  validate_length("name", value, 1, 242)?;
  validate_pattern("name", value, &NAME_RE)
}

/// Comma separated list of ip addresses
pub fn validate_dns_list(field: &str, value: &str) -> Result<(), MagnumError> {
  for entry in value.split(',') {
    if entry.trim().parse::<IpAddr>().is_err() {
      return Err(MagnumError::invalid(format!(
        "Invalid input for field {}: {} is not a valid dns nameserver.",
        field, entry
      )));
    }
  }
  Ok(())
}

/// Six colon separated octets
pub fn validate_mac_address(value: &str) -> Result<String, MagnumError> {
  let octets = value.split(':').collect::<Vec<&str>>();
  let valid = octets.len() == 6
    && octets
      .iter()
      .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
  if !valid {
    return Err(MagnumError::invalid(format!(
      "Expected a MAC address but received {}.",
      value
    )));
  }
  Ok(value.to_lowercase())
}

/// Unwrap a nullable attribute, absent and null both give `None`
pub fn flatten<T>(value: &Option<Option<T>>) -> Option<&T> {
  value.as_ref().and_then(|v| v.as_ref())
}

/// [`validate_length`] on a nullable text attribute
pub fn validate_opt_length(
  field: &str,
  value: &Option<Option<String>>,
  min: usize,
  max: usize,
) -> Result<(), MagnumError> {
  match flatten(value) {
    Some(value) => validate_length(field, value, min, max),
    None => Ok(()),
  }
}

/// [`validate_min`] on a nullable integer attribute
pub fn validate_opt_min(
  field: &str,
  value: &Option<Option<i64>>,
  min: i64,
) -> Result<(), MagnumError> {
  match flatten(value) {
    Some(value) => validate_min(field, *value, min),
    None => Ok(()),
  }
}

/// Lenient boolean parsing used for query parameters
pub fn parse_bool(field: &str, value: &str) -> Result<bool, MagnumError> {
  match value.trim().to_lowercase().as_str() {
    "1" | "t" | "true" | "on" | "y" | "yes" => Ok(true),
    "0" | "f" | "false" | "off" | "n" | "no" => Ok(false),
    _ => Err(MagnumError::invalid(format!(
      "Invalid input for field {}: {} is not a boolean.",
      field, value
    ))),
  }
}

/// Attributes no patch may touch whatever the resource
pub const INTERNAL_ATTRS: &[&str] = &[
  "created_at",
  "id",
  "links",
  "updated_at",
  "uuid",
  "project_id",
  "user_id",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
  Add,
  Replace,
  Remove,
}

/// A present `value` is kept even when null
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  Value::deserialize(deserializer).map(Some)
}

/// One operation of a json patch document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPatch {
  pub(crate) path: String,
  pub(crate) op: PatchOp,
  #[serde(
    default,
    deserialize_with = "present_value",
    skip_serializing_if = "Option::is_none"
  )]
  pub(crate) value: Option<Value>,
}

/// Per resource patch restrictions
#[derive(Debug, Clone, Copy)]
pub struct PatchRules {
  /// Attributes that may never be added, replaced or removed
  pub(crate) internal_attrs: &'static [&'static str],
  /// Attributes that may not be removed, mandatory ones included
  pub(crate) non_removable_attrs: &'static [&'static str],
}

impl JsonPatch {
  pub fn new(op: PatchOp, path: &str, value: Option<Value>) -> Self {
    JsonPatch {
      path: path.to_owned(),
      op,
      value,
    }
  }

  /// Name of the top level attribute the operation touches
  pub fn root(&self) -> &str {
    self
      .path
      .trim_start_matches('/')
      .split('/')
      .next()
      .unwrap_or_default()
  }

  /// Depth of the path, `/labels` is 1 and `/labels/foo` is 2
  pub fn depth(&self) -> usize {
    self.path.matches('/').count()
  }

  pub fn validate(&self, rules: &PatchRules) -> Result<(), MagnumError> {
    validate_pattern("path", &self.path, &PATCH_PATH_RE)?;
    let root = self.root();
    if INTERNAL_ATTRS.contains(&root) || rules.internal_attrs.contains(&root) {
      return Err(MagnumError::invalid(format!(
        "'/{}' is an internal attribute and can not be updated",
        root
      )));
    }
    if self.op == PatchOp::Remove
      && self.depth() == 1
      && rules.non_removable_attrs.contains(&root)
    {
      return Err(MagnumError::invalid(format!(
        "'/{}' is a mandatory attribute and can not be removed",
        root
      )));
    }
    if self.op != PatchOp::Remove && self.value.is_none() {
      return Err(MagnumError::invalid(
        "'add' and 'replace' operations need a value",
      ));
    }
    Ok(())
  }
}
