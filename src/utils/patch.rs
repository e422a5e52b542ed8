//! Json patch engine
//!
//! Operations are checked against the resource rules, applied on the dict
//! projection of the resource and the result is coerced back into the
//! resource type.
use std::collections::HashSet;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::MagnumError;
use crate::models::{to_dict, ApiResource, JsonPatch, PatchOp, PatchRules};

/// Paths whose string values hold a serialized mapping
const DICT_PATHS: &[&str] = &["/labels", "/health_status_reason"];

/// Result of a patch: the new resource and the attributes that changed
#[derive(Debug, Clone)]
pub struct Patched<T> {
  pub(crate) resource: T,
  pub(crate) delta: HashSet<String>,
}

/// Parse `value` as a mapping, single quotes are accepted
fn parse_dict_value(path: &str, value: &str) -> Result<Value, MagnumError> {
  let parsed = serde_json::from_str::<Value>(value)
    .or_else(|_| serde_json::from_str::<Value>(&value.replace('\'', "\"")));
  match parsed {
    Ok(parsed @ Value::Object(_)) => Ok(parsed),
    _ => Err(MagnumError::invalid(format!(
      "Invalid value for {}, expected a mapping: {}",
      path, value
    ))),
  }
}

fn normalize(op: &JsonPatch) -> Result<Value, MagnumError> {
  let mut op = op.clone();
  if op.op != PatchOp::Remove && DICT_PATHS.contains(&op.path.as_str()) {
    if let Some(Value::String(raw)) = &op.value {
      op.value = Some(parse_dict_value(&op.path, raw)?);
    }
  }
  serde_json::to_value(&op).map_err(MagnumError::internal)
}

/// Root level `add` is only allowed on attributes that exist and are null
fn check_root_add(
  doc: &Map<String, Value>,
  op: &JsonPatch,
) -> Result<(), MagnumError> {
  if op.op != PatchOp::Add || op.depth() != 1 {
    return Ok(());
  }
  match doc.get(op.root()) {
    None => Err(MagnumError::invalid(format!(
      "Adding a new attribute ({}) to the root of the resource is not allowed.",
      op.path
    ))),
    Some(Value::Null) => Ok(()),
    Some(_) => Err(MagnumError::invalid(format!(
      "The attribute {} has existed, please use 'replace' operation instead.",
      op.path
    ))),
  }
}

/// Apply `patch` on the dict projection of a document
pub fn apply_jsonpatch(
  doc: &Map<String, Value>,
  patch: &[JsonPatch],
) -> Result<Map<String, Value>, MagnumError> {
  for op in patch {
    check_root_add(doc, op)?;
  }
  let ops = patch
    .iter()
    .map(normalize)
    .collect::<Result<Vec<Value>, MagnumError>>()?;
  let ops: json_patch::Patch = serde_json::from_value(Value::Array(ops))
    .map_err(|err| MagnumError::invalid(format!("Invalid patch: {}", err)))?;
  let mut patched = Value::Object(doc.clone());
  json_patch::patch(&mut patched, &ops).map_err(|err| {
    MagnumError::invalid(format!("Couldn't apply patch. Reason: {}", err))
  })?;
  match patched {
    Value::Object(map) => Ok(map),
    other => Err(MagnumError::invalid(format!(
      "Patch must produce an object, got {}",
      other
    ))),
  }
}

/// Validate and apply `patch` on `resource`.
///
/// Removed attributes are reset to null. The delta holds every exposed
/// attribute whose value changed.
pub fn patch_resource<T: ApiResource>(
  resource: &T,
  patch: &[JsonPatch],
  rules: &PatchRules,
) -> Result<Patched<T>, MagnumError> {
  if patch.is_empty() {
    return Err(MagnumError::invalid("Patch document is empty"));
  }
  for op in patch {
    op.validate(rules)?;
  }
  let mut doc = resource.as_dict()?;
  doc.remove("links");
  let mut patched = apply_jsonpatch(&doc, patch)?;
  for field in T::FIELDS {
    if doc.contains_key(*field) && !patched.contains_key(*field) {
      patched.insert((*field).to_owned(), Value::Null);
    }
  }
  let new_resource = T::from_dict(&patched)?;
  let new_doc = new_resource.as_dict()?;
  let delta = T::FIELDS
    .iter()
    .filter(|field| doc.get(**field) != new_doc.get(**field))
    .map(|field| (*field).to_owned())
    .collect::<HashSet<String>>();
  Ok(Patched {
    resource: new_resource,
    delta,
  })
}

/// Write the attributes of a patched resource on a stored row.
///
/// Only attributes the row knows are copied, a null value resets it.
pub fn merge_into_item<I, R>(item: &I, resource: &R) -> Result<I, MagnumError>
where
  I: Serialize + DeserializeOwned,
  R: ApiResource,
{
  let mut dict = to_dict(item)?;
  let patched = resource.as_dict()?;
  for field in R::FIELDS {
    if !dict.contains_key(*field) {
      continue;
    }
    match patched.get(*field) {
      None | Some(Value::Null) => {
        dict.remove(*field);
      }
      Some(value) => {
        dict.insert((*field).to_owned(), value.clone());
      }
    }
  }
  serde_json::from_value(Value::Object(dict))
    .map_err(|err| MagnumError::invalid(format!("Invalid patch: {}", err)))
}
