//! Repository to manage cluster templates in the store
//! Public templates are visible to every project
use uuid::Uuid;

use crate::errors::MagnumError;
use crate::models::{ClusterTemplateItem, ClusterTemplatePartial, Pagination};

use super::{find_by_ident as find_row, now, paginate, Scope, Store};

fn is_visible(item: &ClusterTemplateItem, scope: &Scope) -> bool {
  item.public || scope.allows(&item.project_id)
}

/// Create new cluster template
///
/// # Arguments
///
/// * `item` - Partial cluster template
/// * `project_id` - Owner project
/// * `user_id` - Creator
/// * `store` - Store to write in
pub async fn create(
  item: ClusterTemplatePartial,
  project_id: &str,
  user_id: &str,
  store: &Store,
) -> Result<ClusterTemplateItem, MagnumError> {
  let mut tables = store.lock()?;
  let item = ClusterTemplateItem {
    id: tables.next_id(),
    uuid: Uuid::new_v4().to_string(),
    project_id: project_id.to_owned(),
    user_id: user_id.to_owned(),
    name: item.name,
    coe: item.coe,
    image_id: item.image_id,
    flavor_id: item.flavor_id,
    master_flavor_id: item.master_flavor_id,
    dns_nameserver: item.dns_nameserver,
    keypair_id: item.keypair_id,
    external_network_id: item.external_network_id,
    fixed_network: item.fixed_network,
    fixed_subnet: item.fixed_subnet,
    network_driver: item.network_driver,
    volume_driver: item.volume_driver,
    apiserver_port: item.apiserver_port,
    docker_volume_size: item.docker_volume_size,
    docker_storage_driver: item.docker_storage_driver,
    cluster_distro: item.cluster_distro,
    http_proxy: item.http_proxy,
    https_proxy: item.https_proxy,
    no_proxy: item.no_proxy,
    registry_enabled: item.registry_enabled,
    labels: item.labels,
    tls_disabled: item.tls_disabled,
    public: item.public,
    hidden: item.hidden,
    server_type: item.server_type,
    insecure_registry: item.insecure_registry,
    master_lb_enabled: item.master_lb_enabled,
    floating_ip_enabled: item.floating_ip_enabled,
    tags: item.tags,
    driver: item.driver,
    created_at: now(),
    updated_at: None,
  };
  tables.cluster_templates.push(item.clone());
  Ok(item)
}

/// List the templates visible in `scope`, hidden ones only when asked
pub async fn list(
  scope: &Scope,
  include_hidden: bool,
  pagination: &Pagination,
  store: &Store,
) -> Result<Vec<ClusterTemplateItem>, MagnumError> {
  let rows = store
    .lock()?
    .cluster_templates
    .iter()
    .filter(|item| is_visible(item, scope))
    .filter(|item| include_hidden || !item.hidden)
    .cloned()
    .collect::<Vec<_>>();
  paginate(rows, pagination)
}

/// Find a visible template by uuid or name
pub async fn find_by_ident(
  ident: &str,
  scope: &Scope,
  store: &Store,
) -> Result<ClusterTemplateItem, MagnumError> {
  let tables = store.lock()?;
  let rows = tables
    .cluster_templates
    .iter()
    .filter(|item| is_visible(item, scope));
  let item = find_row(rows, ident)?.clone();
  Ok(item)
}

/// Find a template by uuid whatever its owner
pub async fn find_by_uuid(
  uuid: &str,
  store: &Store,
) -> Result<ClusterTemplateItem, MagnumError> {
  store
    .lock()?
    .cluster_templates
    .iter()
    .find(|item| item.uuid == uuid)
    .cloned()
    .ok_or_else(|| MagnumError::not_found("ClusterTemplate", uuid))
}

/// Save every column of `item`
pub async fn update(
  mut item: ClusterTemplateItem,
  store: &Store,
) -> Result<ClusterTemplateItem, MagnumError> {
  let mut tables = store.lock()?;
  let row = tables
    .cluster_templates
    .iter_mut()
    .find(|row| row.id == item.id)
    .ok_or_else(|| MagnumError::not_found("ClusterTemplate", &item.uuid))?;
  item.updated_at = Some(now());
  *row = item.clone();
  Ok(item)
}

/// Whether a cluster references the template
pub async fn is_in_use(uuid: &str, store: &Store) -> Result<bool, MagnumError> {
  Ok(
    store
      .lock()?
      .clusters
      .iter()
      .any(|cluster| cluster.cluster_template_id == uuid),
  )
}

/// Delete a template by uuid
pub async fn delete_by_uuid(uuid: &str, store: &Store) -> Result<(), MagnumError> {
  let mut tables = store.lock()?;
  let before = tables.cluster_templates.len();
  tables.cluster_templates.retain(|item| item.uuid != uuid);
  if tables.cluster_templates.len() == before {
    return Err(MagnumError::not_found("ClusterTemplate", uuid));
  }
  Ok(())
}
