//! Paginated collections
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer, Deserialize};

use crate::errors::MagnumError;

/// Sort direction of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
  Asc,
  Desc,
}

impl SortDir {
  pub fn parse(value: &str) -> Result<Self, MagnumError> {
    match value {
      "asc" => Ok(SortDir::Asc),
      "desc" => Ok(SortDir::Desc),
      _ => Err(MagnumError::invalid(format!(
        "Invalid sort direction: {}. Acceptable values are 'asc' or 'desc'",
        value
      ))),
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      SortDir::Asc => "asc",
      SortDir::Desc => "desc",
    }
  }
}

/// Raw pagination query string parameters
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PaginationQuery {
  pub(crate) marker: Option<String>,
  pub(crate) limit: Option<i64>,
  pub(crate) sort_key: Option<String>,
  pub(crate) sort_dir: Option<String>,
}

/// Validated pagination parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
  pub(crate) marker: Option<String>,
  pub(crate) limit: usize,
  pub(crate) sort_key: String,
  pub(crate) sort_dir: SortDir,
}

impl Pagination {
  /// Check `limit` and `sort_dir`, `limit` is capped to `max_limit`
  pub fn from_query(
    query: &PaginationQuery,
    max_limit: usize,
  ) -> Result<Self, MagnumError> {
    let limit = match query.limit {
      None => max_limit,
      Some(limit) if limit <= 0 => {
        return Err(MagnumError::invalid("Limit must be positive"));
      }
      Some(limit) => (limit as usize).min(max_limit),
    };
    let sort_dir = SortDir::parse(query.sort_dir.as_deref().unwrap_or("asc"))?;
    Ok(Pagination {
      marker: query.marker.clone(),
      limit,
      sort_key: query.sort_key.clone().unwrap_or_else(|| String::from("id")),
      sort_dir,
    })
  }
}

/// A page of resources serialized as `{"<kind>": [...], "next": "..."}`
#[derive(Debug, Clone)]
pub struct Collection<T> {
  pub(crate) kind: &'static str,
  pub(crate) items: Vec<T>,
  pub(crate) next: Option<String>,
}

impl<T> Collection<T> {
  pub fn new(kind: &'static str, items: Vec<T>) -> Self {
    Collection {
      kind,
      items,
      next: None,
    }
  }

  /// A page is full when it holds exactly `limit` items
  pub fn has_next(&self, limit: usize) -> bool {
    self.items.len() == limit
  }

  /// Set the `next` link when the page is full.
  ///
  /// `marker` is the marker of the last item, `extra` holds query
  /// parameters to carry over such as filters.
  pub fn with_next(
    mut self,
    host_url: &str,
    resource_url: &str,
    pagination: &Pagination,
    marker: Option<String>,
    extra: &[(&str, String)],
  ) -> Self {
    if !self.has_next(pagination.limit) {
      return self;
    }
    let marker = match marker {
      None => return self,
      Some(marker) => marker,
    };
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("marker", &marker);
    query.append_pair("limit", &pagination.limit.to_string());
    query.append_pair("sort_key", &pagination.sort_key);
    query.append_pair("sort_dir", pagination.sort_dir.as_str());
    for (key, value) in extra {
      query.append_pair(key, value);
    }
    self.next = Some(format!(
      "{}/v1/{}?{}",
      host_url.trim_end_matches('/'),
      resource_url,
      query.finish()
    ));
    self
  }
}

impl<T: Serialize> Serialize for Collection<T> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let len = if self.next.is_some() { 2 } else { 1 };
    let mut map = serializer.serialize_map(Some(len))?;
    map.serialize_entry(self.kind, &self.items)?;
    if let Some(next) = &self.next {
      map.serialize_entry("next", next)?;
    }
    map.end()
  }
}

#[cfg(test)]
mod test_collection {
  use serde_json::json;

  use super::*;

  fn pagination(limit: usize) -> Pagination {
    Pagination {
      marker: None,
      limit,
      sort_key: String::from("id"),
      sort_dir: SortDir::Asc,
    }
  }

  #[test]
  fn limit_validation() {
    let query = PaginationQuery {
      limit: Some(0),
      ..Default::default()
    };
    assert!(Pagination::from_query(&query, 1000).is_err());
    let query = PaginationQuery {
      limit: Some(5000),
      ..Default::default()
    };
    assert_eq!(Pagination::from_query(&query, 1000).unwrap().limit, 1000);
    let query = PaginationQuery::default();
    let pagination = Pagination::from_query(&query, 1000).unwrap();
    assert_eq!(pagination.limit, 1000);
    assert_eq!(pagination.sort_key, "id");
    let query = PaginationQuery {
      sort_dir: Some(String::from("up")),
      ..Default::default()
    };
    assert!(Pagination::from_query(&query, 1000).is_err());
  }

  #[test]
  fn next_only_when_page_is_full() {
    let page = Collection::new("clusters", vec![1, 2])
      .with_next("http://h", "clusters", &pagination(3), Some("m".into()), &[]);
    assert_eq!(serde_json::to_value(&page).unwrap(), json!({ "clusters": [1, 2] }));

    let page = Collection::new("clusters", vec![1, 2]).with_next(
      "http://h",
      "clusters",
      &pagination(2),
      Some("m".into()),
      &[],
    );
    assert_eq!(
      page.next.as_deref(),
      Some("http://h/v1/clusters?marker=m&limit=2&sort_key=id&sort_dir=asc")
    );
  }
}
