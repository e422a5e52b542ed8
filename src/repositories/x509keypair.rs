//! Repository to manage x509 key pairs in the store
use crate::errors::MagnumError;
use crate::models::{Pagination, X509KeyPairItem};

use super::{find_by_ident as find_row, now, paginate, Scope, Store};

pub async fn create(
  mut item: X509KeyPairItem,
  store: &Store,
) -> Result<X509KeyPairItem, MagnumError> {
  let mut tables = store.lock()?;
  item.id = tables.next_id();
  item.created_at = now();
  item.updated_at = None;
  tables.x509keypairs.push(item.clone());
  Ok(item)
}

pub async fn list(
  scope: &Scope,
  pagination: &Pagination,
  store: &Store,
) -> Result<Vec<X509KeyPairItem>, MagnumError> {
  let rows = store
    .lock()?
    .x509keypairs
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
) -> Result<X509KeyPairItem, MagnumError> {
  let tables = store.lock()?;
  let rows = tables
    .x509keypairs
    .iter()
    .filter(|item| scope.allows(&item.project_id));
  let item = find_row(rows, ident)?.clone();
  Ok(item)
}

pub async fn delete_by_uuid(uuid: &str, store: &Store) -> Result<(), MagnumError> {
  let mut tables = store.lock()?;
  let before = tables.x509keypairs.len();
  tables.x509keypairs.retain(|item| item.uuid != uuid);
  if tables.x509keypairs.len() == before {
    return Err(MagnumError::not_found("X509KeyPair", uuid));
  }
  Ok(())
}
