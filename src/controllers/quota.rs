//! File to handle quota routes
//!
//! A project without an explicit quota gets the configured default.
use ntex::util::Bytes;
use ntex::web;
use serde_json::{json, Value};

use crate::errors::{HttpResponseError, MagnumError};
use crate::models::{
  parse_bool, ApiResource, Collection, Quota, QuotaItem, QuotaQuery, QuotaResource,
};
use crate::repositories;
use crate::state::ApiState;
use crate::version::VersionError;

use super::base::{
  created, dispatch, handler, no_content, ok, ApiCall, Versioned, VersionedMethods,
};

fn quota_target(project_id: &str) -> Value {
  json!({ "project_id": project_id })
}

fn parse_resource(resource: &str) -> Result<QuotaResource, MagnumError> {
  serde_json::from_value(Value::String(resource.to_owned())).map_err(|_| {
    MagnumError::invalid(format!("Invalid quota resource {}", resource))
  })
}

fn to_wire(item: &QuotaItem) -> Result<Quota, MagnumError> {
  Quota::from_item(item)
}

async fn get_all(mut call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let query = call.query::<QuotaQuery>()?;
  let all_tenants = match &query.all_tenants {
    None => false,
    Some(value) => parse_bool("all_tenants", value)?,
  };
  call.ctx.all_tenants = all_tenants && call.ctx.is_admin;
  let pagination = call.pagination()?;
  let items = repositories::quota::list(&call.scope(), &pagination, call.store()).await?;
  let marker = items.last().map(|item| item.id.to_string());
  let quotas = items.iter().map(to_wire).collect::<Result<Vec<Quota>, _>>()?;
  let mut extra = Vec::new();
  if call.ctx.all_tenants {
    extra.push(("all_tenants", String::from("True")));
  }
  let collection = Collection::new("quotas", quotas).with_next(
    &call.host_url,
    "quotas",
    &pagination,
    marker,
    &extra,
  );
  ok(&collection)
}

async fn get_one(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let project_id = call.param("project_id")?;
  let resource = parse_resource(&call.param("resource")?)?;
  if !call.ctx.is_admin && project_id != call.ctx.project() {
    return Err(MagnumError::NotAuthorized(String::from(
      "Only an admin can look at the quotas of another project.",
    )));
  }
  call.enforce("quota:get", Some(quota_target(&project_id)))?;
  let quota = match repositories::quota::find(&project_id, resource, call.store()).await? {
    Some(item) => to_wire(&item)?,
    None => Quota::synthesized(
      &project_id,
      resource,
      call.state.config.quotas.max_clusters_per_project,
    ),
  };
  ok(&quota)
}

async fn post(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let quota = Quota::from_dict(&call.dict()?)?;
  let project_id = quota
    .project_id
    .ok_or_else(|| MagnumError::invalid("Mandatory field missing: project_id"))?;
  let resource = quota
    .resource
    .ok_or_else(|| MagnumError::invalid("Mandatory field missing: resource"))?;
  let hard_limit = quota.hard_limit.unwrap_or(1);
  let item =
    repositories::quota::create(&project_id, resource, hard_limit, call.store()).await?;
  log::info!("quota {} of {} set to {}", resource, project_id, hard_limit);
  let location = call.resource_url("quotas", &format!("{}/{}", project_id, resource));
  created(&location, &to_wire(&item)?)
}

async fn patch(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let project_id = call.param("project_id")?;
  let resource = parse_resource(&call.param("resource")?)?;
  let quota = Quota::from_dict(&call.dict()?)?;
  let mut item = repositories::quota::find(&project_id, resource, call.store())
    .await?
    .ok_or_else(|| {
      MagnumError::NotFound(format!(
        "Quota for project {} and resource {} could not be found.",
        project_id, resource
      ))
    })?;
  if let Some(hard_limit) = quota.hard_limit {
    item.hard_limit = hard_limit;
  }
  let item = repositories::quota::update(item, call.store()).await?;
  ok(&to_wire(&item)?)
}

async fn delete(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let project_id = call.param("project_id")?;
  let resource = parse_resource(&call.param("resource")?)?;
  repositories::quota::delete(&project_id, resource, call.store()).await?;
  no_content()
}

pub fn methods() -> Result<VersionedMethods, VersionError> {
  VersionedMethods::new("QuotaController")
    .add(Versioned::new("get_all", handler!(get_all)).policy("quota", "get_all"))?
    .add(Versioned::new("get_one", handler!(get_one)))?
    .add(Versioned::new("post", handler!(post)).policy("quota", "create"))?
    .add(Versioned::new("patch", handler!(patch)).policy("quota", "update"))?
    .add(Versioned::new("delete", handler!(delete)).policy("quota", "delete"))
}

#[web::get("/v1/quotas")]
async fn list_quotas(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.quota;
  dispatch(&req, &state, methods, "get_all", &[], Bytes::new()).await
}

#[web::get("/v1/quotas/{project_id}/{resource}")]
async fn inspect_quota(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.quota;
  let params = &["project_id", "resource"];
  dispatch(&req, &state, methods, "get_one", params, Bytes::new()).await
}

#[web::post("/v1/quotas")]
async fn create_quota(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.quota;
  dispatch(&req, &state, methods, "post", &[], body).await
}

#[web::patch("/v1/quotas/{project_id}/{resource}")]
async fn patch_quota(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.quota;
  dispatch(&req, &state, methods, "patch", &["project_id", "resource"], body).await
}

#[web::delete("/v1/quotas/{project_id}/{resource}")]
async fn delete_quota(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.quota;
  let params = &["project_id", "resource"];
  dispatch(&req, &state, methods, "delete", params, Bytes::new()).await
}

pub fn ntex_config(config: &mut web::ServiceConfig) {
  config.service(list_quotas);
  config.service(inspect_quota);
  config.service(create_quota);
  config.service(patch_quota);
  config.service(delete_quota);
}

#[cfg(test)]
mod test_quota {
  use ntex::http::{Method, StatusCode};
  use serde_json::{json, Value};

  use crate::utils::tests::*;

  async fn test_defaults(srv: &TestServer) -> TestReturn {
    let mut resp = request(srv, Method::GET, "/v1/quotas/p1/Cluster", "1.10")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.json::<Value>().await?;
    assert_eq!(body["hard_limit"], json!(20));
    assert_eq!(body["project_id"], json!(PROJECT_ID));

    let resp = request(srv, Method::GET, "/v1/quotas/p2/Cluster", "1.10")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = request(srv, Method::GET, "/v1/quotas/p1/Node", "1.10")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
  }

  async fn test_admin_only(srv: &TestServer) -> TestReturn {
    let body = json!({ "project_id": "p2", "resource": "Cluster", "hard_limit": 3 });
    let resp = request(srv, Method::POST, "/v1/quotas", "1.10")
      .send_json(&body)
      .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = request(srv, Method::GET, "/v1/quotas", "1.10").send().await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    Ok(())
  }

  async fn test_lifecycle(srv: &TestServer) -> TestReturn {
    let body = json!({ "project_id": "p2", "resource": "Cluster", "hard_limit": 3 });
    let mut resp = admin_request(srv, Method::POST, "/v1/quotas", "1.10")
      .send_json(&body)
      .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = resp.json::<Value>().await?;
    assert_eq!(created["hard_limit"], json!(3));

    let resp = admin_request(srv, Method::POST, "/v1/quotas", "1.10")
      .send_json(&body)
      .await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let mut resp = admin_request(srv, Method::PATCH, "/v1/quotas/p2/Cluster", "1.10")
      .send_json(&json!({ "hard_limit": 7 }))
      .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.json::<Value>().await?["hard_limit"], json!(7));

    let mut resp = admin_request(srv, Method::GET, "/v1/quotas/p2/Cluster", "1.10")
      .send()
      .await?;
    assert_eq!(resp.json::<Value>().await?["hard_limit"], json!(7));

    let mut resp = admin_request(srv, Method::GET, "/v1/quotas", "1.10").send().await?;
    let list = resp.json::<Value>().await?;
    assert_eq!(list["quotas"].as_array().unwrap().len(), 0);
    let mut resp = admin_request(srv, Method::GET, "/v1/quotas?all_tenants=true", "1.10")
      .send()
      .await?;
    let list = resp.json::<Value>().await?;
    assert_eq!(list["quotas"].as_array().unwrap().len(), 1);

    let resp = admin_request(srv, Method::DELETE, "/v1/quotas/p2/Cluster", "1.10")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = admin_request(srv, Method::DELETE, "/v1/quotas/p2/Cluster", "1.10")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
  }

  #[ntex::test]
  async fn main() -> TestReturn {
    let srv = generate_server(crate::controllers::ntex_config).await;
    test_defaults(&srv).await?;
    test_admin_only(&srv).await?;
    test_lifecycle(&srv).await?;
    Ok(())
  }
}
