use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::MagnumError;

pub mod types;
pub use types::*;

mod link;
pub use link::*;

mod collection;
pub use collection::*;

mod config;
pub use config::*;

mod cluster_template;
pub use cluster_template::*;

mod cluster;
pub use cluster::*;

mod bay;
pub use bay::*;

mod nodegroup;
pub use nodegroup::*;

mod federation;
pub use federation::*;

mod certificate;
pub use certificate::*;

mod quota;
pub use quota::*;

mod x509keypair;
pub use x509keypair::*;

mod stats;
pub use stats::*;

/// Plain dict form of any serializable value
pub fn to_dict<T: Serialize>(value: &T) -> Result<Map<String, Value>, MagnumError> {
  match serde_json::to_value(value).map_err(MagnumError::internal)? {
    Value::Object(map) => Ok(map),
    other => Err(MagnumError::internal(format!(
      "expected an object got {}",
      other
    ))),
  }
}

/// Wire representation of a resource.
///
/// Attributes are optional: an attribute that was never set is absent from
/// [`ApiResource::as_dict`], nullable attributes distinguish an explicit
/// null from absence.
pub trait ApiResource: Serialize + DeserializeOwned + Sized {
  /// Attributes exposed by the resource, links excluded
  const FIELDS: &'static [&'static str];

  /// Field constraints, checked by [`ApiResource::from_dict`]
  fn validate(&self) -> Result<(), MagnumError> {
    Ok(())
  }

  /// Build from a plain dict, keys that aren't exposed are skipped
  fn from_dict(dict: &Map<String, Value>) -> Result<Self, MagnumError> {
    let exposed = dict
      .iter()
      .filter(|(key, _)| Self::FIELDS.contains(&key.as_str()))
      .map(|(key, value)| (key.to_owned(), value.clone()))
      .collect::<Map<String, Value>>();
    let resource: Self = serde_json::from_value(Value::Object(exposed))
      .map_err(|err| MagnumError::invalid(format!("Invalid input: {}", err)))?;
    resource.validate()?;
    Ok(resource)
  }

  /// Wire form of a stored row
  fn from_item<I: Serialize>(item: &I) -> Result<Self, MagnumError> {
    Self::from_dict(&to_dict(item)?)
  }

  /// Set attributes only
  fn as_dict(&self) -> Result<Map<String, Value>, MagnumError> {
    to_dict(self)
  }

  /// Unset every attribute but `keep`, used for summary listings
  fn unset_fields_except(&mut self, keep: &[&str]) -> Result<(), MagnumError> {
    let mut dict = self.as_dict()?;
    dict.retain(|key, _| keep.contains(&key.as_str()));
    *self =
      serde_json::from_value(Value::Object(dict)).map_err(MagnumError::internal)?;
    Ok(())
  }
}
