//! Shared state of the api
use std::sync::Arc;

use crate::controllers::Controllers;
use crate::errors::DaemonError;
use crate::events;
use crate::models::DaemonConfig;
use crate::policy::PolicyEnforcer;
use crate::repositories::Store;
use crate::services::conductor::ConductorApi;
use crate::services::openstack::OpenStackClients;

pub mod config;

/// State bound to every http worker
#[derive(Clone)]
pub struct ApiState {
  pub(crate) config: DaemonConfig,
  pub(crate) store: Store,
  pub(crate) conductor: Arc<dyn ConductorApi>,
  pub(crate) clients: Arc<dyn OpenStackClients>,
  pub(crate) policy: PolicyEnforcer,
  pub(crate) controllers: Arc<Controllers>,
}

/// Load the policy, register the versioned methods and start the conductor
pub async fn init(config: DaemonConfig) -> Result<ApiState, DaemonError> {
  let policy = PolicyEnforcer::load(
    config.policy_file.as_deref(),
    config.trust.trustee_domain_id.clone(),
  )
  .await?;
  let controllers = Controllers::new()?;
  let store = Store::new();
  log::info!("Starting conductor");
  let conductor = events::conductor::start(store.clone());
  Ok(ApiState {
    clients: Arc::new(config.inventory.clone()),
    config,
    store,
    conductor: Arc::new(conductor),
    policy,
    controllers: Arc::new(controllers),
  })
}
