//! File to export controllers
use ntex::web;

use crate::errors::DaemonError;

/// Versioned method dispatch
pub mod base;
/// Version discovery
pub mod root;
/// Manage cluster templates
pub mod cluster_template;
/// Manage baymodels, legacy name of cluster templates
pub mod baymodel;
/// Manage clusters
pub mod cluster;
/// Resize and upgrade of clusters
pub mod cluster_actions;
/// Manage bays, legacy name of clusters
pub mod bay;
/// Manage nodegroups of a cluster
pub mod nodegroup;
/// Manage federations
pub mod federation;
/// Cluster certificates
pub mod certificate;
/// Cluster credentials
pub mod credential;
/// Manage quotas
pub mod quota;
/// Cluster statistics
pub mod stats;
/// Manage x509 key pairs
pub mod x509keypair;

use base::VersionedMethods;

/// Versioned methods of every controller, built once at boot
pub struct Controllers {
  pub(crate) cluster_template: VersionedMethods,
  pub(crate) baymodel: VersionedMethods,
  pub(crate) cluster: VersionedMethods,
  pub(crate) cluster_actions: VersionedMethods,
  pub(crate) bay: VersionedMethods,
  pub(crate) nodegroup: VersionedMethods,
  pub(crate) federation: VersionedMethods,
  pub(crate) certificate: VersionedMethods,
  pub(crate) credential: VersionedMethods,
  pub(crate) quota: VersionedMethods,
  pub(crate) stats: VersionedMethods,
  pub(crate) x509keypair: VersionedMethods,
}

impl Controllers {
  /// Register the versioned methods, overlapping ranges are refused
  pub fn new() -> Result<Self, DaemonError> {
    Ok(Controllers {
      cluster_template: cluster_template::methods()?,
      baymodel: baymodel::methods()?,
      cluster: cluster::methods()?,
      cluster_actions: cluster_actions::methods()?,
      bay: bay::methods()?,
      nodegroup: nodegroup::methods()?,
      federation: federation::methods()?,
      certificate: certificate::methods()?,
      credential: credential::methods()?,
      quota: quota::methods()?,
      stats: stats::methods()?,
      x509keypair: x509keypair::methods()?,
    })
  }
}

/// Register the routes of every controller
pub fn ntex_config(config: &mut web::ServiceConfig) {
  root::ntex_config(config);
  cluster_template::ntex_config(config);
  baymodel::ntex_config(config);
  cluster_actions::ntex_config(config);
  nodegroup::ntex_config(config);
  cluster::ntex_config(config);
  bay::ntex_config(config);
  federation::ntex_config(config);
  certificate::ntex_config(config);
  credential::ntex_config(config);
  quota::ntex_config(config);
  stats::ntex_config(config);
  x509keypair::ntex_config(config);
}
