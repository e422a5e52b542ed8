//! Cluster drivers known to the api
use crate::errors::MagnumError;
use crate::models::{Coe, ServerType};

use super::openstack::Image;

/// (server_type, os_distro, coe, driver)
const DRIVERS: &[(&str, &str, &str, &str)] = &[
  ("vm", "fedora-atomic", "kubernetes", "k8s_fedora_atomic_v1"),
  ("vm", "fedora-coreos", "kubernetes", "k8s_fedora_coreos_v1"),
  ("vm", "coreos", "kubernetes", "k8s_coreos_v1"),
  ("bm", "fedora", "kubernetes", "k8s_fedora_ironic_v1"),
  ("vm", "fedora-atomic", "swarm", "swarm_fedora_atomic_v1"),
  ("vm", "fedora-atomic", "swarm-mode", "swarm_fedora_atomic_v2"),
  ("vm", "ubuntu", "mesos", "mesos_ubuntu_v1"),
];

/// Driver handling the (server_type, os, coe) triple
pub fn get_driver_name(
  server_type: ServerType,
  os_distro: &str,
  coe: Coe,
) -> Result<&'static str, MagnumError> {
  let server_type = server_type.to_string();
  let coe = coe.to_string();
  DRIVERS
    .iter()
    .find(|(st, os, c, _)| {
      *st == server_type && os.eq_ignore_ascii_case(os_distro) && *c == coe
    })
    .map(|(_, _, _, name)| *name)
    .ok_or_else(|| {
      MagnumError::invalid(format!(
        "Cluster type ({}, {}, {}) not supported.",
        server_type, os_distro, coe
      ))
    })
}

/// Driver of a new template.
///
/// The image may force one with its `magnum_driver` property, otherwise
/// the driver table decides. Disabled drivers are refused.
pub fn select_driver(
  image: &Image,
  server_type: ServerType,
  coe: Coe,
  disabled_drivers: &[String],
) -> Result<String, MagnumError> {
  let driver = match image.magnum_driver.as_deref().filter(|d| !d.is_empty()) {
    Some(driver) => driver.to_owned(),
    None => {
      let os_distro = image.os_distro.as_deref().unwrap_or_default();
      get_driver_name(server_type, os_distro, coe)?.to_owned()
    }
  };
  if disabled_drivers.iter().any(|disabled| *disabled == driver) {
    return Err(MagnumError::invalid(format!(
      "Cluster driver {} is disabled.",
      driver
    )));
  }
  Ok(driver)
}
