//! Repository to manage federations in the store
use crate::errors::MagnumError;
use crate::models::{FederationItem, Pagination};

use super::{find_by_ident as find_row, now, paginate, Scope, Store};

/// Create new federation, the uuid is assigned by the caller
pub async fn create(
  mut item: FederationItem,
  store: &Store,
) -> Result<FederationItem, MagnumError> {
  let mut tables = store.lock()?;
  if tables.federations.iter().any(|row| row.uuid == item.uuid) {
    return Err(MagnumError::Conflict(format!(
      "A federation with UUID {} already exists.",
      item.uuid
    )));
  }
  item.id = tables.next_id();
  item.created_at = now();
  item.updated_at = None;
  tables.federations.push(item.clone());
  Ok(item)
}

pub async fn list(
  scope: &Scope,
  pagination: &Pagination,
  store: &Store,
) -> Result<Vec<FederationItem>, MagnumError> {
  let rows = store
    .lock()?
    .federations
    .iter()
    .filter(|item| scope.allows(&item.project_id))
    .cloned()
    .collect::<Vec<_>>();
  paginate(rows, pagination)
}

pub async fn find_by_ident(
  ident: &str,
  scope: &Scope,
  store: &Store,
) -> Result<FederationItem, MagnumError> {
  let tables = store.lock()?;
  let rows = tables
    .federations
    .iter()
    .filter(|item| scope.allows(&item.project_id));
  let item = find_row(rows, ident)?.clone();
  Ok(item)
}

pub async fn find_by_uuid(uuid: &str, store: &Store) -> Result<FederationItem, MagnumError> {
  store
    .lock()?
    .federations
    .iter()
    .find(|item| item.uuid == uuid)
    .cloned()
    .ok_or_else(|| MagnumError::not_found("Federation", uuid))
}

/// Save every column of `item`
pub async fn update(
  mut item: FederationItem,
  store: &Store,
) -> Result<FederationItem, MagnumError> {
  let mut tables = store.lock()?;
  let row = tables
    .federations
    .iter_mut()
    .find(|row| row.id == item.id)
    .ok_or_else(|| MagnumError::not_found("Federation", &item.uuid))?;
  item.updated_at = Some(now());
  *row = item.clone();
  Ok(item)
}

pub async fn delete_by_uuid(uuid: &str, store: &Store) -> Result<(), MagnumError> {
  let mut tables = store.lock()?;
  let before = tables.federations.len();
  tables.federations.retain(|item| item.uuid != uuid);
  if tables.federations.len() == before {
    return Err(MagnumError::not_found("Federation", uuid));
  }
  Ok(())
}

#[cfg(test)]
mod test_federation {
  use chrono::Utc;

  use super::*;

  fn federation(uuid: &str, project_id: &str) -> FederationItem {
    FederationItem {
      id: 0,
      uuid: uuid.to_owned(),
      project_id: project_id.to_owned(),
      name: Some(String::from("fed")),
      hostcluster_id: String::from("host"),
      member_ids: vec![],
      status: None,
      status_reason: None,
      properties: Default::default(),
      created_at: Utc::now(),
      updated_at: None,
    }
  }

  #[ntex::test]
  async fn tenant_isolation() {
    let store = Store::new();
    let uuid = "0d8a7a3c-7b8f-4f9e-8d49-6f0c8c0d2a11";
    create(federation(uuid, "p1"), &store).await.unwrap();
    let p2 = Scope {
      project_id: Some(String::from("p2")),
    };
    assert!(find_by_ident("fed", &p2, &store).await.is_err());
    assert!(find_by_ident("fed", &Scope::all(), &store).await.is_ok());
    let mut item = find_by_uuid(uuid, &store).await.unwrap();
    item.member_ids.push(String::from("m1"));
    update(item, &store).await.unwrap();
    assert_eq!(find_by_uuid(uuid, &store).await.unwrap().member_ids, vec!["m1"]);
    delete_by_uuid(uuid, &store).await.unwrap();
    assert!(find_by_uuid(uuid, &store).await.is_err());
  }
}
