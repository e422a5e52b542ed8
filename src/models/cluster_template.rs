use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde_with::rust::double_option;

use crate::errors::MagnumError;

use super::link::Link;
use super::types::*;
use super::ApiResource;

/// Cluster template partial
/// this structure is the body of a create request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterTemplatePartial {
  pub(crate) name: Option<String>,
  pub(crate) coe: Coe,
  pub(crate) image_id: String,
  pub(crate) flavor_id: Option<String>,
  pub(crate) master_flavor_id: Option<String>,
  pub(crate) dns_nameserver: Option<String>,
  pub(crate) keypair_id: Option<String>,
  pub(crate) external_network_id: Option<String>,
  pub(crate) fixed_network: Option<String>,
  pub(crate) fixed_subnet: Option<String>,
  pub(crate) network_driver: Option<String>,
  pub(crate) volume_driver: Option<String>,
  pub(crate) apiserver_port: Option<i64>,
  pub(crate) docker_volume_size: Option<i64>,
  pub(crate) docker_storage_driver: Option<String>,
  pub(crate) cluster_distro: Option<String>,
  pub(crate) http_proxy: Option<String>,
  pub(crate) https_proxy: Option<String>,
  pub(crate) no_proxy: Option<String>,
  pub(crate) registry_enabled: bool,
  pub(crate) labels: Labels,
  pub(crate) tls_disabled: bool,
  pub(crate) public: bool,
  pub(crate) hidden: bool,
  pub(crate) server_type: ServerType,
  pub(crate) insecure_registry: Option<String>,
  pub(crate) master_lb_enabled: Option<bool>,
  pub(crate) floating_ip_enabled: Option<bool>,
  pub(crate) tags: Option<String>,
  pub(crate) driver: Option<String>,
}

/// Cluster template item
/// this structure is a stored row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterTemplateItem {
  pub(crate) id: i64,
  pub(crate) uuid: String,
  pub(crate) project_id: String,
  pub(crate) user_id: String,
  pub(crate) name: Option<String>,
  pub(crate) coe: Coe,
  pub(crate) image_id: String,
  pub(crate) flavor_id: Option<String>,
  pub(crate) master_flavor_id: Option<String>,
  pub(crate) dns_nameserver: Option<String>,
  pub(crate) keypair_id: Option<String>,
  pub(crate) external_network_id: Option<String>,
  pub(crate) fixed_network: Option<String>,
  pub(crate) fixed_subnet: Option<String>,
  pub(crate) network_driver: Option<String>,
  pub(crate) volume_driver: Option<String>,
  pub(crate) apiserver_port: Option<i64>,
  pub(crate) docker_volume_size: Option<i64>,
  pub(crate) docker_storage_driver: Option<String>,
  pub(crate) cluster_distro: Option<String>,
  pub(crate) http_proxy: Option<String>,
  pub(crate) https_proxy: Option<String>,
  pub(crate) no_proxy: Option<String>,
  pub(crate) registry_enabled: bool,
  #[serde(default)]
  pub(crate) labels: Labels,
  pub(crate) tls_disabled: bool,
  pub(crate) public: bool,
  pub(crate) hidden: bool,
  pub(crate) server_type: ServerType,
  pub(crate) insecure_registry: Option<String>,
  pub(crate) master_lb_enabled: Option<bool>,
  pub(crate) floating_ip_enabled: Option<bool>,
  pub(crate) tags: Option<String>,
  pub(crate) driver: Option<String>,
  pub(crate) created_at: DateTime<Utc>,
  pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl ClusterTemplateItem {
  pub fn master_lb_enabled(&self) -> bool {
    self.master_lb_enabled.unwrap_or(false)
  }
}

/// Wire representation of a cluster template.
///
/// Nullable attributes are `Option<Option<_>>`: the outer option tells
/// whether the attribute is set at all.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterTemplate {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) uuid: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) name: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) coe: Option<Coe>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) image_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) flavor_id: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) master_flavor_id: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) dns_nameserver: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) keypair_id: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) external_network_id: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) fixed_network: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) fixed_subnet: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) network_driver: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) volume_driver: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) apiserver_port: Option<Option<i64>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) docker_volume_size: Option<Option<i64>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) docker_storage_driver: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) cluster_distro: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) http_proxy: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) https_proxy: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) no_proxy: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) registry_enabled: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) labels: Option<Labels>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) tls_disabled: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) public: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) hidden: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) server_type: Option<ServerType>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) insecure_registry: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) master_lb_enabled: Option<Option<bool>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) floating_ip_enabled: Option<Option<bool>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) project_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) user_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) tags: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) driver: Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) created_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
  pub(crate) updated_at: Option<Option<DateTime<Utc>>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub(crate) links: Option<Vec<Link>>,
}

/// Attributes kept by template listings
pub const CLUSTER_TEMPLATE_SUMMARY: &[&str] =
  &["uuid", "name", "tags", "hidden", "links"];

/// Attributes a template in use by a cluster may still change
pub const CLUSTER_TEMPLATE_UPDATE_ALLOWED_WHEN_IN_USE: &[&str] =
  &["name", "public", "hidden"];

pub const CLUSTER_TEMPLATE_PATCH_RULES: PatchRules = PatchRules {
  internal_attrs: &["driver"],
  non_removable_attrs: &[
    "coe",
    "image_id",
    "external_network_id",
    "server_type",
    "tls_disabled",
    "public",
    "registry_enabled",
    "cluster_distro",
    "network_driver",
    "hidden",
  ],
};

impl ApiResource for ClusterTemplate {
  const FIELDS: &'static [&'static str] = &[
    "uuid",
    "name",
    "coe",
    "image_id",
    "flavor_id",
    "master_flavor_id",
    "dns_nameserver",
    "keypair_id",
    "external_network_id",
    "fixed_network",
    "fixed_subnet",
    "network_driver",
    "volume_driver",
    "apiserver_port",
    "docker_volume_size",
    "docker_storage_driver",
    "cluster_distro",
    "http_proxy",
    "https_proxy",
    "no_proxy",
    "registry_enabled",
    "labels",
    "tls_disabled",
    "public",
    "hidden",
    "server_type",
    "insecure_registry",
    "master_lb_enabled",
    "floating_ip_enabled",
    "project_id",
    "user_id",
    "tags",
    "driver",
    "created_at",
    "updated_at",
  ];

  fn validate(&self) -> Result<(), MagnumError> {
    validate_opt_length("name", &self.name, 1, 255)?;
    if let Some(image_id) = &self.image_id {
      validate_length("image_id", image_id, 1, 255)?;
    }
    for (field, value) in [
      ("flavor_id", &self.flavor_id),
      ("master_flavor_id", &self.master_flavor_id),
      ("keypair_id", &self.keypair_id),
      ("external_network_id", &self.external_network_id),
      ("fixed_network", &self.fixed_network),
      ("fixed_subnet", &self.fixed_subnet),
      ("network_driver", &self.network_driver),
      ("volume_driver", &self.volume_driver),
      ("docker_storage_driver", &self.docker_storage_driver),
      ("cluster_distro", &self.cluster_distro),
      ("insecure_registry", &self.insecure_registry),
    ] {
      validate_opt_length(field, value, 1, 255)?;
    }
    for (field, value) in [
      ("http_proxy", &self.http_proxy),
      ("https_proxy", &self.https_proxy),
      ("no_proxy", &self.no_proxy),
    ] {
      validate_opt_length(field, value, 0, 255)?;
    }
    if let Some(dns) = flatten(&self.dns_nameserver) {
      validate_dns_list("dns_nameserver", dns)?;
    }
    if let Some(port) = flatten(&self.apiserver_port) {
      validate_range("apiserver_port", *port, 1024, 65535)?;
    }
    validate_opt_min("docker_volume_size", &self.docker_volume_size, 1)?;
    Ok(())
  }
}

impl ClusterTemplate {
  /// Wire form of a row with its links under `resource`
  pub fn convert(
    item: &ClusterTemplateItem,
    host_url: &str,
    resource: &str,
  ) -> Result<Self, MagnumError> {
    let mut template = Self::from_item(item)?;
    template.links = Some(Link::pair(host_url, resource, &item.uuid));
    Ok(template)
  }

  /// Create body, `coe` and `image_id` are mandatory
  pub fn into_partial(self) -> Result<ClusterTemplatePartial, MagnumError> {
    let coe = self
      .coe
      .ok_or_else(|| MagnumError::invalid("Mandatory field missing: coe"))?;
    let image_id = self
      .image_id
      .ok_or_else(|| MagnumError::invalid("Mandatory field missing: image_id"))?;
    Ok(ClusterTemplatePartial {
      name: self.name.flatten(),
      coe,
      image_id,
      flavor_id: self.flavor_id.flatten(),
      master_flavor_id: self.master_flavor_id.flatten(),
      dns_nameserver: self.dns_nameserver.flatten(),
      keypair_id: self.keypair_id.flatten(),
      external_network_id: self.external_network_id.flatten(),
      fixed_network: self.fixed_network.flatten(),
      fixed_subnet: self.fixed_subnet.flatten(),
      network_driver: self.network_driver.flatten(),
      volume_driver: self.volume_driver.flatten(),
      apiserver_port: self.apiserver_port.flatten(),
      docker_volume_size: self.docker_volume_size.flatten(),
      docker_storage_driver: self.docker_storage_driver.flatten(),
      cluster_distro: self.cluster_distro.flatten(),
      http_proxy: self.http_proxy.flatten(),
      https_proxy: self.https_proxy.flatten(),
      no_proxy: self.no_proxy.flatten(),
      registry_enabled: self.registry_enabled.unwrap_or(false),
      labels: self.labels.unwrap_or_default(),
      tls_disabled: self.tls_disabled.unwrap_or(false),
      public: self.public.unwrap_or(false),
      hidden: self.hidden.unwrap_or(false),
      server_type: self.server_type.unwrap_or_default(),
      insecure_registry: self.insecure_registry.flatten(),
      master_lb_enabled: Some(self.master_lb_enabled.flatten().unwrap_or(false)),
      floating_ip_enabled: Some(
        self.floating_ip_enabled.flatten().unwrap_or(true),
      ),
      tags: self.tags.flatten(),
      driver: None,
    })
  }

  /// Example body used by the documentation and the tests
  #[cfg(test)]
  pub fn sample() -> serde_json::Value {
    serde_json::json!({
      "name": "example",
      "coe": "kubernetes",
      "image_id": "Fedora-k8s",
      "keypair_id": "k1",
      "external_network_id": "public",
      "flavor_id": "m1.small",
      "master_flavor_id": "m1.small",
      "dns_nameserver": "8.8.1.1",
      "docker_volume_size": 25,
      "network_driver": "flannel",
      "labels": { "key1": "val1" },
    })
  }
}
