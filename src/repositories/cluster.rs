//! Repository to manage clusters in the store
//! Deleting a cluster deletes its nodegroups
use crate::errors::MagnumError;
use crate::models::{ClusterItem, ClusterNodes, NodeGroupItem, Pagination, Stats};

use super::{find_by_ident as find_row, now, paginate, Scope, Store};

/// Create a cluster together with its nodegroups
///
/// # Arguments
///
/// * `item` - Cluster row, its id and timestamps are assigned here
/// * `nodegroups` - Default nodegroups of the cluster
/// * `store` - Store to write in
pub async fn create(
  mut item: ClusterItem,
  nodegroups: Vec<NodeGroupItem>,
  store: &Store,
) -> Result<ClusterItem, MagnumError> {
  let mut tables = store.lock()?;
  if tables.clusters.iter().any(|row| row.uuid == item.uuid) {
    return Err(MagnumError::Conflict(format!(
      "A cluster with UUID {} already exists.",
      item.uuid
    )));
  }
  item.id = tables.next_id();
  item.created_at = now();
  item.updated_at = None;
  for mut nodegroup in nodegroups {
    nodegroup.id = tables.next_id();
    nodegroup.created_at = now();
    tables.nodegroups.push(nodegroup);
  }
  tables.clusters.push(item.clone());
  Ok(item)
}

/// List the clusters of `scope`
pub async fn list(
  scope: &Scope,
  pagination: &Pagination,
  store: &Store,
) -> Result<Vec<ClusterItem>, MagnumError> {
  let rows = store
    .lock()?
    .clusters
    .iter()
    .filter(|item| scope.allows(&item.project_id))
    .cloned()
    .collect::<Vec<_>>();
  paginate(rows, pagination)
}

/// Find a cluster of `scope` by uuid or name
pub async fn find_by_ident(
  ident: &str,
  scope: &Scope,
  store: &Store,
) -> Result<ClusterItem, MagnumError> {
  let tables = store.lock()?;
  let rows = tables
    .clusters
    .iter()
    .filter(|item| scope.allows(&item.project_id));
  let item = find_row(rows, ident)?.clone();
  Ok(item)
}

/// Find a cluster by uuid whatever its owner
pub async fn find_by_uuid(uuid: &str, store: &Store) -> Result<ClusterItem, MagnumError> {
  store
    .lock()?
    .clusters
    .iter()
    .find(|item| item.uuid == uuid)
    .cloned()
    .ok_or_else(|| MagnumError::not_found("Cluster", uuid))
}

/// Whether a cluster with this uuid exists in `scope`
pub async fn exists(uuid: &str, scope: &Scope, store: &Store) -> Result<bool, MagnumError> {
  Ok(
    store
      .lock()?
      .clusters
      .iter()
      .any(|item| item.uuid == uuid && scope.allows(&item.project_id)),
  )
}

/// Save every column of `item`
pub async fn update(mut item: ClusterItem, store: &Store) -> Result<ClusterItem, MagnumError> {
  let mut tables = store.lock()?;
  let row = tables
    .clusters
    .iter_mut()
    .find(|row| row.id == item.id)
    .ok_or_else(|| MagnumError::not_found("Cluster", &item.uuid))?;
  item.updated_at = Some(now());
  *row = item.clone();
  Ok(item)
}

/// Delete a cluster and its nodegroups
pub async fn delete_by_uuid(uuid: &str, store: &Store) -> Result<(), MagnumError> {
  let mut tables = store.lock()?;
  let before = tables.clusters.len();
  tables.clusters.retain(|item| item.uuid != uuid);
  if tables.clusters.len() == before {
    return Err(MagnumError::not_found("Cluster", uuid));
  }
  tables.nodegroups.retain(|ng| ng.cluster_id != uuid);
  Ok(())
}

/// Number of clusters owned by a project
pub async fn count_by_project(project_id: &str, store: &Store) -> Result<usize, MagnumError> {
  Ok(
    store
      .lock()?
      .clusters
      .iter()
      .filter(|item| item.project_id == project_id)
      .count(),
  )
}

/// Cluster and node counts of a project, of every project when `None`
pub async fn stats(project_id: Option<&str>, store: &Store) -> Result<Stats, MagnumError> {
  let tables = store.lock()?;
  let clusters = tables
    .clusters
    .iter()
    .filter(|item| project_id.map_or(true, |project| item.project_id == project))
    .map(|item| item.uuid.as_str())
    .collect::<Vec<&str>>();
  let nodegroups = tables
    .nodegroups
    .iter()
    .filter(|ng| clusters.contains(&ng.cluster_id.as_str()))
    .cloned()
    .collect::<Vec<_>>();
  let nodes = ClusterNodes::from_nodegroups(&nodegroups);
  Ok(Stats {
    clusters: clusters.len(),
    nodes: nodes.node_count + nodes.master_count,
  })
}

#[cfg(test)]
mod test_cluster {
  use crate::models::{NodeGroupItem, MASTER_ROLE};

  use super::*;

  fn sample(uuid: &str, name: &str, project_id: &str) -> ClusterItem {
    serde_json::from_value(serde_json::json!({
      "id": 0,
      "uuid": uuid,
      "project_id": project_id,
      "user_id": "u1",
      "name": name,
      "cluster_template_id": "t1",
      "keypair": null,
      "docker_volume_size": null,
      "master_flavor_id": null,
      "flavor_id": null,
      "create_timeout": 60,
      "stack_id": null,
      "status": "CREATE_IN_PROGRESS",
      "status_reason": null,
      "health_status": null,
      "health_status_reason": null,
      "discovery_url": null,
      "api_address": null,
      "coe_version": null,
      "container_version": null,
      "master_lb_enabled": false,
      "floating_ip_enabled": true,
      "fixed_network": null,
      "fixed_subnet": null,
      "ca_cert_ref": null,
      "magnum_cert_ref": null,
      "etcd_ca_cert_ref": null,
      "front_proxy_ca_cert_ref": null,
      "trust_id": null,
      "trustee_username": null,
      "trustee_password": null,
      "trustee_user_id": null,
      "created_at": "2020-01-01T00:00:00Z",
      "updated_at": null,
    }))
    .unwrap()
  }

  fn nodegroups(cluster_uuid: &str, workers: i64) -> Vec<NodeGroupItem> {
    let mut master = NodeGroupItem::sample(cluster_uuid);
    master.role = String::from(MASTER_ROLE);
    master.name = String::from("default-master");
    let mut worker = NodeGroupItem::sample(cluster_uuid);
    worker.node_count = workers;
    vec![master, worker]
  }

  #[ntex::test]
  async fn create_find_delete() {
    let store = Store::new();
    let uuid = "7d1a4c8e-3c4f-4a35-9f5f-0a0a7e4a0001";
    create(sample(uuid, "c1", "p1"), nodegroups(uuid, 2), &store)
      .await
      .unwrap();
    let dup = create(sample(uuid, "c1", "p1"), vec![], &store).await;
    assert_eq!(dup.unwrap_err().status(), 409);
    let p1 = Scope {
      project_id: Some(String::from("p1")),
    };
    let p2 = Scope {
      project_id: Some(String::from("p2")),
    };
    assert!(find_by_ident("c1", &p1, &store).await.is_ok());
    assert!(find_by_ident(uuid, &p2, &store).await.is_err());
    assert!(exists(uuid, &p1, &store).await.unwrap());
    assert_eq!(count_by_project("p1", &store).await.unwrap(), 1);
    assert_eq!(
      stats(Some("p1"), &store).await.unwrap(),
      Stats {
        clusters: 1,
        nodes: 3
      }
    );
    delete_by_uuid(uuid, &store).await.unwrap();
    assert!(store.lock().unwrap().nodegroups.is_empty());
    assert_eq!(stats(None, &store).await.unwrap(), Stats::default());
  }
}
