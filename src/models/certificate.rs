use serde::{Serialize, Deserialize};

use crate::errors::MagnumError;

use super::link::Link;
use super::types::*;
use super::ApiResource;

/// CA certificate kinds a cluster carries
pub const CA_CERT_TYPES: &[&str] = &["kubernetes", "etcd", "front_proxy"];

/// Wire representation of a certificate, a signing request or a CA
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) cluster_uuid: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) csr: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) pem: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) ca_cert_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) links: Option<Vec<Link>>,
}

impl ApiResource for Certificate {
  const FIELDS: &'static [&'static str] =
    &["cluster_uuid", "csr", "pem", "ca_cert_type"];

  fn validate(&self) -> Result<(), MagnumError> {
    if let Some(csr) = &self.csr {
      validate_length("csr", csr, 1, usize::MAX)?;
    }
    if let Some(ca_cert_type) = &self.ca_cert_type {
      if !CA_CERT_TYPES.contains(&ca_cert_type.as_str()) {
        return Err(MagnumError::invalid(format!(
          "Invalid ca_cert_type {}, expected one of {}",
          ca_cert_type,
          CA_CERT_TYPES.join(", ")
        )));
      }
    }
    Ok(())
  }
}

impl Certificate {
  pub fn new(
    cluster_uuid: &str,
    pem: String,
    csr: Option<String>,
    ca_cert_type: Option<String>,
    host_url: &str,
  ) -> Self {
    Certificate {
      cluster_uuid: Some(cluster_uuid.to_owned()),
      csr,
      pem: Some(pem),
      ca_cert_type,
      links: Some(Link::pair(host_url, "certificates", cluster_uuid)),
    }
  }
}

#[cfg(test)]
mod test_certificate {
  use serde_json::json;

  use super::*;

  #[test]
  fn ca_cert_type_is_checked() {
    let dict = json!({ "cluster_uuid": "c1", "ca_cert_type": "etcd" });
    assert!(Certificate::from_dict(dict.as_object().unwrap()).is_ok());
    let dict = json!({ "cluster_uuid": "c1", "ca_cert_type": "ssh" });
    assert!(Certificate::from_dict(dict.as_object().unwrap()).is_err());
  }

  #[test]
  fn links_use_the_cluster_uuid() {
    let cert = Certificate::new("c1", "PEM".into(), None, None, "http://h");
    assert_eq!(cert.links.unwrap()[0].href, "http://h/v1/certificates/c1");
  }
}
