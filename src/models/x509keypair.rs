use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde_with::rust::double_option;

use crate::errors::MagnumError;

use super::link::Link;
use super::types::*;
use super::ApiResource;

/// X509 key pair item
/// this structure is a stored row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct X509KeyPairItem {
  pub(crate) id: i64,
  pub(crate) uuid: String,
  pub(crate) project_id: String,
  pub(crate) user_id: String,
  pub(crate) name: Option<String>,
  pub(crate) certificate: String,
  pub(crate) private_key: String,
  pub(crate) intermediates: Option<String>,
  pub(crate) private_key_passphrase: Option<String>,
  pub(crate) created_at: DateTime<Utc>,
  pub(crate) updated_at: Option<DateTime<Utc>>,
}

/// Wire representation of a key pair
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct X509KeyPair {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) uuid: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) name: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) certificate: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) private_key: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) intermediates: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) private_key_passphrase: Option<Option<String>>,
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

pub const X509KEYPAIR_SUMMARY: &[&str] = &["uuid", "name", "links"];

impl ApiResource for X509KeyPair {
  const FIELDS: &'static [&'static str] = &[
    "uuid",
    "name",
    "certificate",
    "private_key",
    "intermediates",
    "private_key_passphrase",
    "project_id",
    "user_id",
    "created_at",
    "updated_at",
  ];

  fn validate(&self) -> Result<(), MagnumError> {
    validate_opt_length("name", &self.name, 1, 255)?;
    if let Some(certificate) = &self.certificate {
      validate_length("certificate", certificate, 1, usize::MAX)?;
    }
    if let Some(private_key) = &self.private_key {
      validate_length("private_key", private_key, 1, usize::MAX)?;
    }
    Ok(())
  }
}

impl X509KeyPair {
  pub fn convert(item: &X509KeyPairItem, host_url: &str) -> Result<Self, MagnumError> {
    let mut keypair = Self::from_item(item)?;
    keypair.links = Some(Link::pair(host_url, "x509keypairs", &item.uuid));
    Ok(keypair)
  }
}
