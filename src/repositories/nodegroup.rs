//! Repository to manage nodegroups in the store
use uuid::Uuid;

use crate::errors::MagnumError;
use crate::models::{NodeGroupItem, Pagination};

use super::{find_by_ident as find_row, now, paginate, Store};

/// Create new nodegroup, names are unique inside a cluster
pub async fn create(
  mut item: NodeGroupItem,
  store: &Store,
) -> Result<NodeGroupItem, MagnumError> {
  let mut tables = store.lock()?;
  let taken = tables
    .nodegroups
    .iter()
    .any(|ng| ng.cluster_id == item.cluster_id && ng.name == item.name);
  if taken {
    return Err(MagnumError::Conflict(format!(
      "A node group with name {} already exists in the cluster {}.",
      item.name, item.cluster_id
    )));
  }
  item.id = tables.next_id();
  if item.uuid.is_empty() {
    item.uuid = Uuid::new_v4().to_string();
  }
  item.created_at = now();
  item.updated_at = None;
  tables.nodegroups.push(item.clone());
  Ok(item)
}

/// Every nodegroup of a cluster ordered by id
pub async fn list_by_cluster(
  cluster_uuid: &str,
  store: &Store,
) -> Result<Vec<NodeGroupItem>, MagnumError> {
  Ok(
    store
      .lock()?
      .nodegroups
      .iter()
      .filter(|ng| ng.cluster_id == cluster_uuid)
      .cloned()
      .collect(),
  )
}

/// A page of the nodegroups of a cluster, optionally filtered by role
pub async fn list(
  cluster_uuid: &str,
  role: Option<&str>,
  pagination: &Pagination,
  store: &Store,
) -> Result<Vec<NodeGroupItem>, MagnumError> {
  let rows = list_by_cluster(cluster_uuid, store)
    .await?
    .into_iter()
    .filter(|ng| role.map_or(true, |role| ng.role == role))
    .collect::<Vec<_>>();
  paginate(rows, pagination)
}

/// Find a nodegroup of a cluster by uuid or name
pub async fn find_by_ident(
  cluster_uuid: &str,
  ident: &str,
  store: &Store,
) -> Result<NodeGroupItem, MagnumError> {
  let tables = store.lock()?;
  let rows = tables
    .nodegroups
    .iter()
    .filter(|ng| ng.cluster_id == cluster_uuid);
  let item = find_row(rows, ident)?.clone();
  Ok(item)
}

/// Default nodegroup of a cluster with the given role
pub async fn find_default(
  cluster_uuid: &str,
  role: &str,
  store: &Store,
) -> Result<NodeGroupItem, MagnumError> {
  store
    .lock()?
    .nodegroups
    .iter()
    .find(|ng| ng.cluster_id == cluster_uuid && ng.is_default && ng.role == role)
    .cloned()
    .ok_or_else(|| {
      MagnumError::NotFound(format!(
        "Default {} nodegroup of cluster {} could not be found.",
        role, cluster_uuid
      ))
    })
}

/// Save every column of `item`
pub async fn update(
  mut item: NodeGroupItem,
  store: &Store,
) -> Result<NodeGroupItem, MagnumError> {
  let mut tables = store.lock()?;
  let row = tables
    .nodegroups
    .iter_mut()
    .find(|row| row.id == item.id)
    .ok_or_else(|| MagnumError::not_found("NodeGroup", &item.uuid))?;
  item.updated_at = Some(now());
  *row = item.clone();
  Ok(item)
}

pub async fn delete_by_uuid(uuid: &str, store: &Store) -> Result<(), MagnumError> {
  let mut tables = store.lock()?;
  let before = tables.nodegroups.len();
  tables.nodegroups.retain(|ng| ng.uuid != uuid);
  if tables.nodegroups.len() == before {
    return Err(MagnumError::not_found("NodeGroup", uuid));
  }
  Ok(())
}
