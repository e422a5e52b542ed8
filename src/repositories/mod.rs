//! Functions to manipulate models in the store
//!
//! Rows live in an in-process store shared by the http workers and the
//! conductor loop. Every repository function takes the store it works on.
use std::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::context::RequestContext;
use crate::errors::MagnumError;
use crate::models::{
  is_uuid_like, to_dict, ClusterItem, ClusterTemplateItem, FederationItem,
  NodeGroupItem, Pagination, QuotaItem, SortDir, X509KeyPairItem,
};

pub mod cluster_template;
pub mod cluster;
pub mod nodegroup;
pub mod federation;
pub mod quota;
pub mod x509keypair;

/// Tables of the store
#[derive(Debug, Default)]
pub struct Tables {
  pub(crate) cluster_templates: Vec<ClusterTemplateItem>,
  pub(crate) clusters: Vec<ClusterItem>,
  pub(crate) nodegroups: Vec<NodeGroupItem>,
  pub(crate) federations: Vec<FederationItem>,
  pub(crate) quotas: Vec<QuotaItem>,
  pub(crate) x509keypairs: Vec<X509KeyPairItem>,
  sequence: i64,
}

impl Tables {
  /// Next primary key, shared by every table
  pub(crate) fn next_id(&mut self) -> i64 {
    self.sequence += 1;
    self.sequence
  }
}

#[derive(Debug, Clone, Default)]
pub struct Store(Arc<Mutex<Tables>>);

impl Store {
  pub fn new() -> Self {
    Store::default()
  }

  pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Tables>, MagnumError> {
    self
      .0
      .lock()
      .map_err(|err| MagnumError::internal(format!("store lock poisoned {}", err)))
  }
}

/// Columns every stored row has
pub trait Row: Serialize + Clone {
  const RESOURCE: &'static str;

  fn id(&self) -> i64;

  fn uuid(&self) -> &str;

  fn name(&self) -> Option<&str>;

  fn project_id(&self) -> &str;

  /// Value of the `marker` parameter pointing at this row
  fn marker(&self) -> String {
    self.uuid().to_owned()
  }
}

macro_rules! impl_row {
  ($item:ty, $resource:expr) => {
    impl Row for $item {
      const RESOURCE: &'static str = $resource;

      fn id(&self) -> i64 {
        self.id
      }

      fn uuid(&self) -> &str {
        &self.uuid
      }

      fn name(&self) -> Option<&str> {
        self.name.as_deref()
      }

      fn project_id(&self) -> &str {
        &self.project_id
      }
    }
  };
}

impl_row!(ClusterTemplateItem, "ClusterTemplate");
impl_row!(ClusterItem, "Cluster");
impl_row!(FederationItem, "Federation");
impl_row!(X509KeyPairItem, "X509KeyPair");

impl Row for NodeGroupItem {
  const RESOURCE: &'static str = "NodeGroup";

  fn id(&self) -> i64 {
    self.id
  }

  fn uuid(&self) -> &str {
    &self.uuid
  }

  fn name(&self) -> Option<&str> {
    Some(&self.name)
  }

  fn project_id(&self) -> &str {
    &self.project_id
  }
}

impl Row for QuotaItem {
  const RESOURCE: &'static str = "Quota";

  fn id(&self) -> i64 {
    self.id
  }

  fn uuid(&self) -> &str {
    &self.project_id
  }

  fn name(&self) -> Option<&str> {
    None
  }

  fn project_id(&self) -> &str {
    &self.project_id
  }

  fn marker(&self) -> String {
    self.id.to_string()
  }
}

/// Tenant filter of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
  /// `None` when the request spans all the projects
  pub(crate) project_id: Option<String>,
}

impl Scope {
  pub fn from_context(ctx: &RequestContext) -> Self {
    if ctx.all_tenants {
      return Scope { project_id: None };
    }
    Scope {
      project_id: Some(ctx.project()),
    }
  }

  pub fn all() -> Self {
    Scope { project_id: None }
  }

  pub fn allows(&self, project_id: &str) -> bool {
    match &self.project_id {
      None => true,
      Some(scope) => scope == project_id,
    }
  }
}

/// Look a row up by uuid when `ident` looks like one, by name otherwise
pub fn find_by_ident<'a, T, I>(rows: I, ident: &str) -> Result<&'a T, MagnumError>
where
  T: Row + 'a,
  I: Iterator<Item = &'a T>,
{
  if is_uuid_like(ident) {
    return rows
      .into_iter()
      .find(|row| row.uuid() == ident)
      .ok_or_else(|| MagnumError::not_found(T::RESOURCE, ident));
  }
  let mut matches = rows.filter(|row| row.name() == Some(ident));
  let found = matches
    .next()
    .ok_or_else(|| MagnumError::not_found(T::RESOURCE, ident))?;
  if matches.next().is_some() {
    return Err(MagnumError::multiple_matches(T::RESOURCE));
  }
  Ok(found)
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
  match (a, b) {
    (None, None) | (Some(Value::Null), Some(Value::Null)) => Ordering::Equal,
    (None, _) | (Some(Value::Null), _) => Ordering::Less,
    (_, None) | (_, Some(Value::Null)) => Ordering::Greater,
    (Some(Value::Number(a)), Some(Value::Number(b))) => a
      .as_f64()
      .partial_cmp(&b.as_f64())
      .unwrap_or(Ordering::Equal),
    (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
    (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
    (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
  }
}

/// Sort `rows` and cut the page after `pagination.marker`.
///
/// Ties are broken by id so a marker always points at a stable position.
pub fn paginate<T: Row>(
  rows: Vec<T>,
  pagination: &Pagination,
) -> Result<Vec<T>, MagnumError> {
  let mut keyed = rows
    .into_iter()
    .map(|row| {
      let dict = to_dict(&row)?;
      Ok((dict.get(&pagination.sort_key).cloned(), dict.contains_key(&pagination.sort_key), row))
    })
    .collect::<Result<Vec<_>, MagnumError>>()?;
  if !keyed.is_empty() && keyed.iter().all(|(_, known, _)| !known) {
    return Err(MagnumError::invalid(format!(
      "The sort_key value \"{}\" is an invalid field for sorting",
      pagination.sort_key
    )));
  }
  keyed.sort_by(|(a, _, row_a), (b, _, row_b)| {
    let ordering =
      compare_values(a.as_ref(), b.as_ref()).then(row_a.id().cmp(&row_b.id()));
    match pagination.sort_dir {
      SortDir::Asc => ordering,
      SortDir::Desc => ordering.reverse(),
    }
  });
  let rows = keyed.into_iter().map(|(_, _, row)| row).collect::<Vec<T>>();
  let start = match &pagination.marker {
    None => 0,
    Some(marker) => {
      let position = rows
        .iter()
        .position(|row| row.marker() == *marker)
        .ok_or_else(|| {
          MagnumError::invalid(format!("Marker {} could not be found.", marker))
        })?;
      position + 1
    }
  };
  Ok(rows.into_iter().skip(start).take(pagination.limit).collect())
}

/// Timestamp of a write
pub(crate) fn now() -> chrono::DateTime<Utc> {
  Utc::now()
}
