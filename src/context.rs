//! Request context built from the headers the authentication middleware sets
use ntex::http::HeaderMap;
use serde_json::{json, Value};
use uuid::Uuid;

/// Credentials and scoping flags of the current request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
  pub(crate) auth_token: Option<String>,
  pub(crate) user_id: Option<String>,
  pub(crate) user_name: Option<String>,
  pub(crate) project_id: Option<String>,
  pub(crate) project_name: Option<String>,
  pub(crate) domain_id: Option<String>,
  pub(crate) user_domain_id: Option<String>,
  pub(crate) project_domain_id: Option<String>,
  pub(crate) trust_id: Option<String>,
  pub(crate) roles: Vec<String>,
  pub(crate) request_id: String,
  pub(crate) is_admin: bool,
  /// Disable project filtering for listings and lookups
  pub(crate) all_tenants: bool,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
  headers
    .get(name)
    .and_then(|value| value.to_str().ok())
    .map(|value| value.trim().to_owned())
    .filter(|value| !value.is_empty())
}

impl RequestContext {
  pub fn from_headers(headers: &HeaderMap) -> Self {
    let roles = header(headers, "X-Roles")
      .map(|roles| {
        roles
          .split(',')
          .map(|role| role.trim().to_lowercase())
          .filter(|role| !role.is_empty())
          .collect::<Vec<String>>()
      })
      .unwrap_or_default();
    let request_id = header(headers, "X-Openstack-Request-Id")
      .unwrap_or_else(|| format!("req-{}", Uuid::new_v4()));
    RequestContext {
      auth_token: header(headers, "X-Auth-Token"),
      user_id: header(headers, "X-User-Id"),
      user_name: header(headers, "X-User-Name"),
      project_id: header(headers, "X-Project-Id"),
      project_name: header(headers, "X-Project-Name"),
      domain_id: header(headers, "X-Domain-Id")
        .or_else(|| header(headers, "X-User-Domain-Id")),
      user_domain_id: header(headers, "X-User-Domain-Id"),
      project_domain_id: header(headers, "X-Project-Domain-Id"),
      trust_id: header(headers, "X-Trust-Id"),
      roles,
      request_id,
      is_admin: false,
      all_tenants: false,
    }
  }

  /// Credentials exposed to the policy engine
  pub fn to_policy_values(&self) -> Value {
    json!({
      "user_id": self.user_id,
      "user_name": self.user_name,
      "project_id": self.project_id,
      "project_name": self.project_name,
      "domain_id": self.domain_id,
      "user_domain_id": self.user_domain_id,
      "project_domain_id": self.project_domain_id,
      "trust_id": self.trust_id,
      "roles": self.roles,
      "is_admin": self.is_admin,
    })
  }

  /// Project owning the resources created by this request
  pub fn project(&self) -> String {
    self.project_id.clone().unwrap_or_default()
  }

  pub fn user(&self) -> String {
    self.user_id.clone().unwrap_or_default()
  }
}

#[cfg(test)]
mod test_context {
  use ntex::http::header::{HeaderName, HeaderValue};

  use super::*;

  #[test]
  fn build_from_headers() {
    let mut headers = HeaderMap::new();
    headers.insert(
      HeaderName::from_static("x-project-id"),
      HeaderValue::from_static("p1"),
    );
    headers.insert(
      HeaderName::from_static("x-roles"),
      HeaderValue::from_static("Member, admin"),
    );
    let ctx = RequestContext::from_headers(&headers);
    assert_eq!(ctx.project_id.as_deref(), Some("p1"));
    assert_eq!(ctx.user_id, None);
    assert_eq!(ctx.roles, vec!["member", "admin"]);
    assert!(ctx.request_id.starts_with("req-"));
    assert!(!ctx.is_admin);
    assert_eq!(ctx.to_policy_values()["project_id"], "p1");
  }
}
