//! Repository to manage quotas in the store
//! A project has at most one quota per resource
use crate::errors::MagnumError;
use crate::models::{Pagination, QuotaItem, QuotaResource};

use super::{now, paginate, Scope, Store};

pub async fn create(
  project_id: &str,
  resource: QuotaResource,
  hard_limit: i64,
  store: &Store,
) -> Result<QuotaItem, MagnumError> {
  let mut tables = store.lock()?;
  let exists = tables
    .quotas
    .iter()
    .any(|quota| quota.project_id == project_id && quota.resource == resource);
  if exists {
    return Err(MagnumError::Conflict(format!(
      "Quota for project {} already exists for resource {}.",
      project_id, resource
    )));
  }
  let item = QuotaItem {
    id: tables.next_id(),
    project_id: project_id.to_owned(),
    resource,
    hard_limit,
    created_at: now(),
    updated_at: None,
  };
  tables.quotas.push(item.clone());
  Ok(item)
}

pub async fn list(
  scope: &Scope,
  pagination: &Pagination,
  store: &Store,
) -> Result<Vec<QuotaItem>, MagnumError> {
  let rows = store
    .lock()?
    .quotas
    .iter()
    .filter(|quota| scope.allows(&quota.project_id))
    .cloned()
    .collect::<Vec<_>>();
  paginate(rows, pagination)
}

/// Explicit quota of a project, if any
pub async fn find(
  project_id: &str,
  resource: QuotaResource,
  store: &Store,
) -> Result<Option<QuotaItem>, MagnumError> {
  Ok(
    store
      .lock()?
      .quotas
      .iter()
      .find(|quota| quota.project_id == project_id && quota.resource == resource)
      .cloned(),
  )
}

pub async fn update(mut item: QuotaItem, store: &Store) -> Result<QuotaItem, MagnumError> {
  let mut tables = store.lock()?;
  let row = tables
    .quotas
    .iter_mut()
    .find(|row| row.id == item.id)
    .ok_or_else(|| MagnumError::not_found("Quota", &item.project_id))?;
  item.updated_at = Some(now());
  *row = item.clone();
  Ok(item)
}

pub async fn delete(
  project_id: &str,
  resource: QuotaResource,
  store: &Store,
) -> Result<(), MagnumError> {
  let mut tables = store.lock()?;
  let before = tables.quotas.len();
  tables
    .quotas
    .retain(|quota| !(quota.project_id == project_id && quota.resource == resource));
  if tables.quotas.len() == before {
    return Err(MagnumError::NotFound(format!(
      "Quota for project {} and resource {} could not be found.",
      project_id, resource
    )));
  }
  Ok(())
}
