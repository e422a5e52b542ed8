//! Versioned method dispatch shared by every controller
//!
//! A controller registers several handlers under the same method name, each
//! one tagged with the range of api versions it serves. The handler whose
//! range holds the requested version answers the request.
use std::collections::HashMap;

use futures::future::LocalBoxFuture;
use ntex::http::StatusCode;
use ntex::http::header::{self, HeaderName, HeaderValue};
use ntex::util::Bytes;
use ntex::web;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::context::RequestContext;
use crate::errors::{HttpResponseError, MagnumError};
use crate::models::{Pagination, PaginationQuery};
use crate::repositories::{Scope, Store};
use crate::services::conductor::{ConductorMessage, ConductorReply};
use crate::state::ApiState;
use crate::version::{Version, VersionError, BASE_VER, CURRENT_MAX_VER};

pub type HandlerFuture =
  LocalBoxFuture<'static, Result<web::HttpResponse, MagnumError>>;

pub type Handler = fn(ApiCall) -> HandlerFuture;

/// Turn an `async fn(ApiCall) -> Result<HttpResponse, MagnumError>` into a
/// [`Handler`]
macro_rules! handler {
  ($f:path) => {
    |call: $crate::controllers::base::ApiCall| -> $crate::controllers::base::HandlerFuture {
      Box::pin($f(call))
    }
  };
}

pub(crate) use handler;

/// A handler and the versions it serves
pub struct Versioned {
  pub(crate) name: &'static str,
  pub(crate) start: Version,
  pub(crate) end: Version,
  /// `(resource, action)` rule checked before the handler runs
  pub(crate) policy: Option<(&'static str, &'static str)>,
  handler: Handler,
}

impl Versioned {
  /// Serve every supported version until restricted with `min` or `max`
  pub fn new(name: &'static str, handler: Handler) -> Self {
    Versioned {
      name,
      start: BASE_VER,
      end: CURRENT_MAX_VER,
      policy: None,
      handler,
    }
  }

  pub fn min(mut self, version: Version) -> Self {
    self.start = version;
    self
  }

  pub fn max(mut self, version: Version) -> Self {
    self.end = version;
    self
  }

  pub fn policy(mut self, resource: &'static str, action: &'static str) -> Self {
    self.policy = Some((resource, action));
    self
  }
}

/// Registry of the versioned methods of one controller
pub struct VersionedMethods {
  kind: &'static str,
  methods: HashMap<&'static str, Vec<Versioned>>,
}

/// Sweep the sorted range ends, more than one open range means overlap
fn intersects(methods: &[Versioned]) -> bool {
  // 0 sorts starts before ends on the same version
  let mut points = methods
    .iter()
    .flat_map(|method| [(method.start, 0u8), (method.end, 1u8)])
    .collect::<Vec<(Version, u8)>>();
  points.sort();
  let mut counter = 0;
  for (_, kind) in points {
    if kind == 0 {
      counter += 1;
      if counter > 1 {
        return true;
      }
    } else {
      counter -= 1;
    }
  }
  false
}

impl VersionedMethods {
  pub fn new(kind: &'static str) -> Self {
    VersionedMethods {
      kind,
      methods: HashMap::new(),
    }
  }

  /// Register `method`, its range may not overlap a registered one
  pub fn add(mut self, method: Versioned) -> Result<Self, VersionError> {
    let name = method.name;
    let list = self.methods.entry(name).or_default();
    list.push(method);
    list.sort_by(|a, b| b.start.cmp(&a.start));
    if intersects(list) {
      return Err(VersionError::Intersection(format!("{}.{}", self.kind, name)));
    }
    Ok(self)
  }

  /// Latest handler of `name` serving `version`
  pub fn select(
    &self,
    name: &str,
    version: &Version,
  ) -> Result<&Versioned, VersionError> {
    self
      .methods
      .get(name)
      .and_then(|list| {
        list
          .iter()
          .find(|method| version.matches(&method.start, &method.end))
      })
      .ok_or_else(|| VersionError::NoMatch {
        version: *version,
        method: format!("{}.{}", self.kind, name),
      })
  }
}

/// Everything a handler knows about the request it serves
pub struct ApiCall {
  pub(crate) version: Version,
  pub(crate) ctx: RequestContext,
  pub(crate) state: ApiState,
  pub(crate) host_url: String,
  params: Vec<(&'static str, String)>,
  query: String,
  body: Bytes,
}

impl ApiCall {
  pub fn store(&self) -> &Store {
    &self.state.store
  }

  /// Path parameter declared by the route
  pub fn param(&self, name: &str) -> Result<String, MagnumError> {
    self
      .params
      .iter()
      .find(|(key, _)| *key == name)
      .map(|(_, value)| value.clone())
      .ok_or_else(|| MagnumError::internal(format!("missing path parameter {}", name)))
  }

  /// Decode the body
  pub fn json<T: DeserializeOwned>(&self) -> Result<T, MagnumError> {
    serde_json::from_slice(&self.body)
      .map_err(|err| MagnumError::invalid(format!("Invalid body: {}", err)))
  }

  /// Decode the body as a plain dict
  pub fn dict(&self) -> Result<Map<String, Value>, MagnumError> {
    match self.json::<Value>()? {
      Value::Object(map) => Ok(map),
      other => Err(MagnumError::invalid(format!(
        "Invalid body: expected an object got {}",
        other
      ))),
    }
  }

  /// Decode the query string
  pub fn query<T: DeserializeOwned>(&self) -> Result<T, MagnumError> {
    serde_urlencoded::from_str(&self.query).map_err(|err| {
      MagnumError::invalid(format!("Invalid query string: {}", err))
    })
  }

  pub fn pagination(&self) -> Result<Pagination, MagnumError> {
    let query = self.query::<PaginationQuery>()?;
    Pagination::from_query(&query, self.state.config.api.max_limit)
  }

  /// Tenant filter of the request
  pub fn scope(&self) -> Scope {
    Scope::from_context(&self.ctx)
  }

  /// Authorize `rule` against `target`, the caller when `None`
  pub fn enforce(&self, rule: &str, target: Option<Value>) -> Result<(), MagnumError> {
    self.state.policy.enforce(&self.ctx, rule, target, true)?;
    Ok(())
  }

  /// Whether `rule` allows the request, without failing
  pub fn allows(&self, rule: &str, target: Option<Value>) -> Result<bool, MagnumError> {
    self.state.policy.enforce(&self.ctx, rule, target, false)
  }

  /// Admins span every project once `rule` allows it
  pub fn enforce_all_projects(&mut self, rule: &str) -> Result<(), MagnumError> {
    if self.ctx.is_admin {
      self.enforce(rule, None)?;
      self.ctx.all_tenants = true;
    }
    Ok(())
  }

  pub async fn cast(&self, message: ConductorMessage) -> Result<(), MagnumError> {
    self.state.conductor.cast(&self.ctx, message).await
  }

  pub async fn call(
    &self,
    message: ConductorMessage,
  ) -> Result<ConductorReply, MagnumError> {
    self.state.conductor.call(&self.ctx, message).await
  }

  /// `<host>/v1/<collection>/<uuid>`
  pub fn resource_url(&self, collection: &str, uuid: &str) -> String {
    format!(
      "{}/v1/{}/{}",
      self.host_url.trim_end_matches('/'),
      collection,
      uuid
    )
  }
}

/// Policy target of a resource owned by `project_id`
pub fn target(project_id: &str, user_id: &str) -> Value {
  json!({ "project_id": project_id, "user_id": user_id })
}

pub fn ok<T: Serialize>(body: &T) -> Result<web::HttpResponse, MagnumError> {
  Ok(web::HttpResponse::Ok().json(body))
}

pub fn accepted<T: Serialize>(body: &T) -> Result<web::HttpResponse, MagnumError> {
  Ok(web::HttpResponse::Accepted().json(body))
}

/// 202 for a resource the conductor is still building at `location`
pub fn accepted_at<T: Serialize>(
  location: &str,
  body: &T,
) -> Result<web::HttpResponse, MagnumError> {
  Ok(
    web::HttpResponse::Accepted()
      .header(header::LOCATION, location)
      .json(body),
  )
}

pub fn created<T: Serialize>(
  location: &str,
  body: &T,
) -> Result<web::HttpResponse, MagnumError> {
  Ok(
    web::HttpResponse::Created()
      .header(header::LOCATION, location)
      .json(body),
  )
}

pub fn no_content() -> Result<web::HttpResponse, MagnumError> {
  Ok(web::HttpResponse::NoContent().finish())
}

/// Host used in links, the configured one or the one of the request
pub fn host_url(req: &web::HttpRequest, state: &ApiState) -> String {
  match &state.config.api.host_url {
    Some(host_url) => host_url.clone(),
    None => {
      let info = req.connection_info();
      format!("{}://{}", info.scheme(), info.host())
    }
  }
}

/// Select the handler of `name` for the requested version and run it
///
/// # Arguments
///
/// * `req` - Incoming request
/// * `state` - Shared state of the api
/// * `methods` - Versioned methods of the controller
/// * `name` - Method name
/// * `params` - Names of the path parameters the handler reads
/// * `body` - Raw body
pub async fn dispatch(
  req: &web::HttpRequest,
  state: &ApiState,
  methods: &VersionedMethods,
  name: &str,
  params: &[&'static str],
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let version = Version::from_headers(req.headers()).map_err(MagnumError::from)?;
  let method = methods.select(name, &version).map_err(MagnumError::from)?;
  let mut ctx = RequestContext::from_headers(req.headers());
  ctx.is_admin = state.policy.check_is_admin(&ctx);
  if let Some((resource, action)) = method.policy {
    state.policy.enforce_wsgi(&ctx, resource, action)?;
  }
  let params = params
    .iter()
    .map(|param| {
      req
        .match_info()
        .get(param)
        .map(|value| (*param, value.to_owned()))
        .ok_or_else(|| MagnumError::internal(format!("route lacks {}", param)))
    })
    .collect::<Result<Vec<_>, MagnumError>>()?;
  let request_id = ctx.request_id.clone();
  let call = ApiCall {
    version,
    ctx,
    state: state.clone(),
    host_url: host_url(req, state),
    params,
    query: req.query_string().to_owned(),
    body,
  };
  let mut response = (method.handler)(call).await.map_err(|err| {
    log::debug!("[{}] {}.{} failed: {}", request_id, methods.kind, name, err);
    err
  })?;
  let value =
    HeaderValue::from_str(&version.header_value()).map_err(MagnumError::internal)?;
  let headers = response.headers_mut();
  headers.insert(HeaderName::from_static("openstack-api-version"), value);
  headers.insert(header::VARY, HeaderValue::from_static("OpenStack-API-Version"));
  Ok(response)
}

/// Individual resources have no detail view
pub fn detail_not_found() -> Result<web::HttpResponse, HttpResponseError> {
  Err(HttpResponseError {
    msg: String::from("The resource could not be found."),
    status: StatusCode::NOT_FOUND,
  })
}
