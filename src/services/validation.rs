//! Validation of attributes against the cloud inventory
//!
//! Attributes of templates and clusters that reference cloud objects are
//! checked through a dispatch table keyed by attribute name.
use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::context::RequestContext;
use crate::errors::MagnumError;
use crate::models::{is_uuid_like, ClusterTemplateSection, Coe, Labels};

use super::openstack::{Image, OpenStackClients};

const SUPPORTED_ISOLATION: &[&str] = &[
  "filesystem/posix",
  "filesystem/linux",
  "filesystem/shared",
  "posix/cpu",
  "posix/mem",
  "posix/disk",
  "cgroups/cpu",
  "cgroups/mem",
  "docker/runtime",
  "namespaces/pid",
];

const SUPPORTED_IMAGE_PROVIDERS: &[&str] = &["docker", "appc"];

/// Validators of resources referenced by templates and clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OsResource {
  Image,
  Flavor,
  Keypair,
  ExternalNetwork,
  FixedNetwork,
  Labels,
}

const VALIDATORS: &[(&str, OsResource)] = &[
  ("image_id", OsResource::Image),
  ("flavor_id", OsResource::Flavor),
  ("master_flavor_id", OsResource::Flavor),
  ("keypair_id", OsResource::Keypair),
  ("external_network_id", OsResource::ExternalNetwork),
  ("fixed_network", OsResource::FixedNetwork),
  ("labels", OsResource::Labels),
];

type LabelValidator = fn(&Labels) -> Result<(), MagnumError>;

const LABEL_VALIDATORS: &[(&str, LabelValidator)] = &[
  ("mesos_slave_isolation", validate_labels_isolation),
  ("mesos_slave_image_providers", validate_labels_image_providers),
  (
    "mesos_slave_executor_env_variables",
    validate_labels_executor_env_variables,
  ),
];

fn comma_list(labels: &Labels, key: &str) -> Vec<String> {
  labels
    .get(key)
    .map(|value| {
      value
        .as_text()
        .split(',')
        .map(|entry| entry.trim().to_owned())
        .filter(|entry| !entry.is_empty())
        .collect()
    })
    .unwrap_or_default()
}

fn validate_labels_isolation(labels: &Labels) -> Result<(), MagnumError> {
  let unsupported = comma_list(labels, "mesos_slave_isolation")
    .into_iter()
    .filter(|entry| !SUPPORTED_ISOLATION.contains(&entry.as_str()))
    .collect::<Vec<String>>();
  if !unsupported.is_empty() {
    return Err(MagnumError::invalid(format!(
      "property 'labels/mesos_slave_isolation' with value '{}' is not \
       supported, supported values are: {}",
      unsupported.join(","),
      SUPPORTED_ISOLATION.join(", ")
    )));
  }
  Ok(())
}

fn validate_labels_image_providers(labels: &Labels) -> Result<(), MagnumError> {
  let providers = comma_list(labels, "mesos_slave_image_providers");
  let unsupported = providers
    .iter()
    .filter(|entry| !SUPPORTED_IMAGE_PROVIDERS.contains(&entry.as_str()))
    .cloned()
    .collect::<Vec<String>>();
  if !unsupported.is_empty() {
    return Err(MagnumError::invalid(format!(
      "property 'labels/mesos_slave_image_providers' with value '{}' is \
       not supported, supported values are: {}",
      unsupported.join(","),
      SUPPORTED_IMAGE_PROVIDERS.join(", ")
    )));
  }
  if providers.iter().any(|p| p == "docker") {
    let isolation = comma_list(labels, "mesos_slave_isolation");
    if !isolation.iter().any(|i| i == "docker/runtime") {
      return Err(MagnumError::invalid(
        "Docker runtime isolator has to be specified if 'docker' is included \
         in 'mesos_slave_image_providers'. Please add 'docker/runtime' to \
         'mesos_slave_isolation' labels flags",
      ));
    }
  }
  Ok(())
}

fn validate_labels_executor_env_variables(
  labels: &Labels,
) -> Result<(), MagnumError> {
  if let Some(value) = labels.get("mesos_slave_executor_env_variables") {
    let text = value.as_text();
    if !text.is_empty() && serde_json::from_str::<Value>(&text).is_err() {
      return Err(MagnumError::invalid(
        "Json format error for 'mesos_slave_executor_env_variables'",
      ));
    }
  }
  Ok(())
}

/// Run every label validator whose label is present
pub fn validate_labels(labels: &Labels) -> Result<(), MagnumError> {
  for (label, validator) in LABEL_VALIDATORS {
    if labels.contains_key(*label) {
      validator(labels)?;
    }
  }
  Ok(())
}

/// Find an image by id or name, it must carry `os_distro`
pub async fn validate_image(
  clients: &dyn OpenStackClients,
  ctx: &RequestContext,
  image: &str,
) -> Result<Image, MagnumError> {
  let found = match clients.get_image(ctx, image).await {
    Ok(found) => found,
    Err(MagnumError::NotFound(_)) if !is_uuid_like(image) => {
      let mut matches = clients
        .list_images(ctx)
        .await?
        .into_iter()
        .filter(|candidate| candidate.name == image)
        .collect::<Vec<Image>>();
      match matches.len() {
        0 => return Err(MagnumError::not_found("Image", image)),
        1 => matches.remove(0),
        _ => {
          return Err(MagnumError::Conflict(format!(
            "Multiple images exist with same name {}. Please use the image \
             id instead.",
            image
          )))
        }
      }
    }
    Err(err) => return Err(err),
  };
  match found.os_distro.as_deref() {
    Some(os_distro) if !os_distro.is_empty() => Ok(found),
    _ => Err(MagnumError::invalid(format!(
      "Image {} doesn't contain os_distro field.",
      image
    ))),
  }
}

/// A null flavor is accepted, otherwise it must match an id or a name
pub async fn validate_flavor(
  clients: &dyn OpenStackClients,
  ctx: &RequestContext,
  flavor: Option<&str>,
) -> Result<(), MagnumError> {
  let flavor = match flavor {
    None => return Ok(()),
    Some(flavor) => flavor,
  };
  let flavors = clients.list_flavors(ctx).await?;
  if flavors.iter().any(|f| f.id == flavor || f.name == flavor) {
    return Ok(());
  }
  Err(MagnumError::not_found("Flavor", flavor))
}

pub async fn validate_keypair(
  clients: &dyn OpenStackClients,
  ctx: &RequestContext,
  keypair: &str,
) -> Result<(), MagnumError> {
  clients.get_keypair(ctx, keypair).await?;
  Ok(())
}

pub async fn validate_external_network(
  clients: &dyn OpenStackClients,
  ctx: &RequestContext,
  network: &str,
) -> Result<(), MagnumError> {
  let matches = clients
    .list_networks(ctx)
    .await?
    .into_iter()
    .filter(|n| n.id == network || n.name == network)
    .count();
  match matches {
    0 => Err(MagnumError::not_found("External network", network)),
    1 => Ok(()),
    _ => Err(MagnumError::Conflict(format!(
      "Multiple external networks exist with same name {}. Please use the \
       external network ID instead.",
      network
    ))),
  }
}

/// Fixed networks are created on demand when they don't exist
pub async fn validate_fixed_network(
  _clients: &dyn OpenStackClients,
  _ctx: &RequestContext,
  _network: &str,
) -> Result<(), MagnumError> {
  Ok(())
}

async fn validate_attribute(
  clients: &dyn OpenStackClients,
  ctx: &RequestContext,
  kind: OsResource,
  value: &Value,
) -> Result<(), MagnumError> {
  if kind == OsResource::Labels {
    let labels: Labels = serde_json::from_value(value.clone())
      .map_err(|err| MagnumError::invalid(format!("Invalid labels: {}", err)))?;
    return validate_labels(&labels);
  }
  let value = value.as_str().ok_or_else(|| {
    MagnumError::invalid(format!("Expected a string but received {}", value))
  })?;
  match kind {
    OsResource::Image => validate_image(clients, ctx, value).await.map(|_| ()),
    OsResource::Flavor => validate_flavor(clients, ctx, Some(value)).await,
    OsResource::Keypair => validate_keypair(clients, ctx, value).await,
    OsResource::ExternalNetwork => {
      validate_external_network(clients, ctx, value).await
    }
    OsResource::FixedNetwork => validate_fixed_network(clients, ctx, value).await,
    OsResource::Labels => Ok(()),
  }
}

fn is_set(value: Option<&Value>) -> bool {
  match value {
    None | Some(Value::Null) => false,
    Some(Value::String(s)) => !s.is_empty(),
    Some(Value::Object(map)) => !map.is_empty(),
    Some(_) => true,
  }
}

/// Validate the references of a template and of the cluster built on it.
///
/// Cluster attributes shadow the template ones. The cluster keypair is
/// always checked when a cluster is given.
pub async fn validate_os_resources(
  clients: &dyn OpenStackClients,
  ctx: &RequestContext,
  template: &Map<String, Value>,
  cluster: Option<&Map<String, Value>>,
) -> Result<(), MagnumError> {
  for (attr, kind) in VALIDATORS {
    let from_cluster = cluster.and_then(|c| c.get(*attr));
    if is_set(from_cluster) {
      if let Some(value) = from_cluster {
        validate_attribute(clients, ctx, *kind, value).await?;
      }
    } else if let Some(value) = template.get(*attr).filter(|v| !v.is_null()) {
      validate_attribute(clients, ctx, *kind, value).await?;
    }
  }
  if let Some(keypair) = cluster
    .and_then(|c| c.get("keypair"))
    .and_then(|k| k.as_str())
  {
    validate_keypair(clients, ctx, keypair).await?;
  }
  Ok(())
}

/// Validate only the template attributes listed in `delta`
pub async fn validate_os_resources_delta(
  clients: &dyn OpenStackClients,
  ctx: &RequestContext,
  template: &Map<String, Value>,
  delta: &HashSet<String>,
) -> Result<(), MagnumError> {
  let changed = template
    .iter()
    .filter(|(key, _)| delta.contains(key.as_str()))
    .map(|(key, value)| (key.to_owned(), value.clone()))
    .collect::<Map<String, Value>>();
  validate_os_resources(clients, ctx, &changed, None).await
}

fn supported_network_drivers(coe: Coe) -> &'static [&'static str] {
  match coe {
    Coe::Kubernetes => &["flannel", "calico"],
    Coe::Swarm | Coe::SwarmMode => &["docker", "flannel"],
    Coe::Mesos => &["docker"],
    Coe::Dcos => &[],
  }
}

fn supported_volume_drivers(coe: Coe) -> &'static [&'static str] {
  match coe {
    Coe::Kubernetes => &["cinder"],
    Coe::Swarm | Coe::SwarmMode | Coe::Mesos => &["rexray"],
    Coe::Dcos => &[],
  }
}

/// The network driver must be supported by the coe and allowed by the
/// configuration
pub fn validate_network_driver(
  config: &ClusterTemplateSection,
  coe: Coe,
  driver: Option<&str>,
) -> Result<(), MagnumError> {
  let driver = match driver {
    None => return Ok(()),
    Some(driver) => driver,
  };
  let supported = supported_network_drivers(coe);
  if !supported.contains(&driver) {
    return Err(MagnumError::invalid(format!(
      "Network driver type {} is not supported, expecting a {} network \
       driver.",
      driver,
      supported.join(", ")
    )));
  }
  let allowed = match coe {
    Coe::Kubernetes => &config.kubernetes_allowed_network_drivers,
    Coe::Swarm | Coe::SwarmMode => &config.swarm_allowed_network_drivers,
    Coe::Mesos | Coe::Dcos => &config.mesos_allowed_network_drivers,
  };
  if !allowed.iter().any(|a| a == "all" || a == driver) {
    return Err(MagnumError::invalid(format!(
      "Network driver type {} is not allowed, expecting a {} network driver.",
      driver,
      allowed.join(", ")
    )));
  }
  Ok(())
}

pub fn validate_volume_driver(
  coe: Coe,
  driver: Option<&str>,
) -> Result<(), MagnumError> {
  let driver = match driver {
    None => return Ok(()),
    Some(driver) => driver,
  };
  let supported = supported_volume_drivers(coe);
  if !supported.contains(&driver) {
    return Err(MagnumError::invalid(format!(
      "Volume driver type {} is not supported, expecting a {} volume driver.",
      driver,
      supported.join(", ")
    )));
  }
  Ok(())
}

fn validate_properties<'a>(
  delta: impl IntoIterator<Item = &'a String>,
  allowed: &[&str],
  resource: &str,
) -> Result<(), MagnumError> {
  let mut invalid = delta
    .into_iter()
    .filter(|key| !allowed.contains(&key.as_str()))
    .cloned()
    .collect::<Vec<String>>();
  if invalid.is_empty() {
    return Ok(());
  }
  invalid.sort();
  Err(MagnumError::invalid(format!(
    "cannot change {} property(ies) {}.",
    resource,
    invalid.join(", ")
  )))
}

/// A patched cluster may only change its node count and health
pub fn validate_cluster_properties(
  delta: &HashSet<String>,
) -> Result<(), MagnumError> {
  validate_properties(
    delta,
    crate::models::CLUSTER_UPDATE_ALLOWED_PROPERTIES,
    "cluster",
  )
}

pub fn validate_federation_properties(
  delta: &HashSet<String>,
) -> Result<(), MagnumError> {
  validate_properties(
    delta,
    crate::models::FEDERATION_UPDATE_ALLOWED_PROPERTIES,
    "federation",
  )
}

pub fn validate_nodegroup_properties(
  delta: &HashSet<String>,
) -> Result<(), MagnumError> {
  validate_properties(
    delta,
    crate::models::NODEGROUP_UPDATE_ALLOWED_PROPERTIES,
    "nodegroup",
  )
}

/// Federation creation needs a dns zone
pub fn validate_federation_dns_zone(
  properties: Option<&std::collections::BTreeMap<String, String>>,
) -> Result<(), MagnumError> {
  let has_zone = properties
    .and_then(|p| p.get("dns-zone"))
    .map_or(false, |zone| !zone.is_empty());
  if !has_zone {
    return Err(MagnumError::invalid(
      "No DNS zone specified. Please specify a 'dns-zone' in the federation \
       properties.",
    ));
  }
  Ok(())
}

#[cfg(test)]
mod test_validation {
  use serde_json::json;

  use crate::services::openstack::{Flavor, Inventory, Keypair, Network};

  use super::*;

  fn ctx() -> RequestContext {
    RequestContext {
      project_id: Some(String::from("p1")),
      user_id: Some(String::from("u1")),
      ..Default::default()
    }
  }

  fn inventory() -> Inventory {
    Inventory {
      images: vec![
        Image {
          id: String::from("fedora-id"),
          name: String::from("Fedora-k8s"),
          os_distro: Some(String::from("fedora-atomic")),
          ..Default::default()
        },
        Image {
          id: String::from("bare-id"),
          name: String::from("bare"),
          ..Default::default()
        },
        Image {
          id: String::from("dup-1"),
          name: String::from("dup"),
          os_distro: Some(String::from("ubuntu")),
          ..Default::default()
        },
        Image {
          id: String::from("dup-2"),
          name: String::from("dup"),
          os_distro: Some(String::from("ubuntu")),
          ..Default::default()
        },
      ],
      flavors: vec![Flavor {
        id: String::from("1"),
        name: String::from("m1.small"),
      }],
      networks: vec![Network {
        id: String::from("net-1"),
        name: String::from("public"),
        external: true,
      }],
      keypairs: vec![Keypair {
        name: String::from("k1"),
        user_id: None,
      }],
      ..Default::default()
    }
  }

  fn labels(value: Value) -> Labels {
    serde_json::from_value(value).unwrap()
  }

  #[ntex::test]
  async fn images() {
    let inv = inventory();
    let image = validate_image(&inv, &ctx(), "Fedora-k8s").await.unwrap();
    assert_eq!(image.os_distro.as_deref(), Some("fedora-atomic"));
    assert!(validate_image(&inv, &ctx(), "fedora-id").await.is_ok());
    let err = validate_image(&inv, &ctx(), "bare").await.unwrap_err();
    assert_eq!(err.status(), 400);
    let err = validate_image(&inv, &ctx(), "dup").await.unwrap_err();
    assert_eq!(err.status(), 409);
    let err = validate_image(&inv, &ctx(), "missing").await.unwrap_err();
    assert_eq!(err.status(), 404);
  }

  #[ntex::test]
  async fn flavors_keypairs_networks() {
    let inv = inventory();
    assert!(validate_flavor(&inv, &ctx(), None).await.is_ok());
    assert!(validate_flavor(&inv, &ctx(), Some("1")).await.is_ok());
    assert!(validate_flavor(&inv, &ctx(), Some("m1.small")).await.is_ok());
    assert!(validate_flavor(&inv, &ctx(), Some("m1.huge")).await.is_err());
    assert!(validate_keypair(&inv, &ctx(), "k1").await.is_ok());
    assert!(validate_keypair(&inv, &ctx(), "k2").await.is_err());
    assert!(validate_external_network(&inv, &ctx(), "public").await.is_ok());
    assert!(validate_external_network(&inv, &ctx(), "net-1").await.is_ok());
    assert!(validate_external_network(&inv, &ctx(), "private").await.is_err());
  }

  #[ntex::test]
  async fn cluster_attributes_shadow_template_ones() {
    let inv = inventory();
    let template = json!({
      "image_id": "Fedora-k8s",
      "flavor_id": "m1.huge",
      "keypair_id": "k1",
      "external_network_id": "public",
    });
    let cluster = json!({ "flavor_id": "m1.small", "keypair": "k1" });
    let res = validate_os_resources(
      &inv,
      &ctx(),
      template.as_object().unwrap(),
      Some(cluster.as_object().unwrap()),
    )
    .await;
    assert!(res.is_ok());
    let res =
      validate_os_resources(&inv, &ctx(), template.as_object().unwrap(), None)
        .await;
    assert_eq!(res.unwrap_err().status(), 404);
  }

  #[test]
  fn mesos_labels() {
    assert!(validate_labels(&labels(json!({
      "mesos_slave_isolation": "filesystem/posix,docker/runtime",
      "mesos_slave_image_providers": "docker",
    })))
    .is_ok());
    assert!(validate_labels(&labels(json!({
      "mesos_slave_isolation": "filesystem/posix,gpu",
    })))
    .is_err());
    assert!(validate_labels(&labels(json!({
      "mesos_slave_image_providers": "docker",
      "mesos_slave_isolation": "posix/cpu",
    })))
    .is_err());
    assert!(validate_labels(&labels(json!({
      "mesos_slave_image_providers": "rkt",
    })))
    .is_err());
    assert!(validate_labels(&labels(json!({
      "mesos_slave_executor_env_variables": "{\"PATH\": \"/bin\"}",
    })))
    .is_ok());
    assert!(validate_labels(&labels(json!({
      "mesos_slave_executor_env_variables": "{not json",
    })))
    .is_err());
  }

  #[test]
  fn drivers() {
    let config = ClusterTemplateSection::default();
    assert!(validate_network_driver(&config, Coe::Kubernetes, Some("flannel")).is_ok());
    assert!(validate_network_driver(&config, Coe::Kubernetes, Some("docker")).is_err());
    let restricted = ClusterTemplateSection {
      kubernetes_allowed_network_drivers: vec![String::from("calico")],
      ..Default::default()
    };
    assert!(
      validate_network_driver(&restricted, Coe::Kubernetes, Some("flannel")).is_err()
    );
    assert!(validate_volume_driver(Coe::Swarm, Some("rexray")).is_ok());
    assert!(validate_volume_driver(Coe::Kubernetes, Some("rexray")).is_err());
    assert!(validate_volume_driver(Coe::Mesos, None).is_ok());
  }

  #[test]
  fn properties() {
    let delta: HashSet<String> =
      ["node_count", "health_status"].iter().map(|s| s.to_string()).collect();
    assert!(validate_cluster_properties(&delta).is_ok());
    let delta: HashSet<String> =
      ["node_count", "name"].iter().map(|s| s.to_string()).collect();
    let err = validate_cluster_properties(&delta).unwrap_err();
    assert_eq!(
      err,
      MagnumError::invalid("cannot change cluster property(ies) name.")
    );
    let delta: HashSet<String> = ["member_ids"].iter().map(|s| s.to_string()).collect();
    assert!(validate_federation_properties(&delta).is_ok());
  }
}
