//! File to handle bay routes, the legacy name of clusters
//!
//! Bays are clusters with a few renamed attributes, every operation is
//! translated to its cluster counterpart.
use std::collections::HashSet;

use ntex::util::Bytes;
use ntex::web;

use crate::errors::{HttpResponseError, MagnumError};
use crate::models::{
  bay_field_to_cluster, ApiResource, Bay, ClusterId, ClusterItem, Collection,
  JsonPatch, BAY_PATCH_RULES, BAY_SUMMARY,
};
use crate::services::conductor::ConductorMessage;
use crate::state::ApiState;
use crate::utils::patch::patch_resource;
use crate::version::{Version, VersionError};

use super::base::{
  accepted, accepted_at, created, detail_not_found, dispatch, handler, no_content, ok,
  ApiCall, VersionedMethods,
};
use super::baymodel::legacy;
use super::cluster::{
  apply_update, cluster_target, create_and_dispatch, delete_cluster,
  find_cluster, list_page, rollback, show_cluster, to_wire, ROLLBACK_VER,
  SYNC_CREATE_MAX_VER,
};

async fn to_bay(call: &ApiCall, item: &ClusterItem) -> Result<Bay, MagnumError> {
  Bay::from_cluster(&to_wire(call, item).await?, &call.host_url)
}

async fn list(
  mut call: ApiCall,
  action: &str,
  summary: bool,
) -> Result<web::HttpResponse, MagnumError> {
  let (clusters, pagination, marker) = list_page(&mut call, "bay", action).await?;
  let mut bays = Vec::with_capacity(clusters.len());
  for cluster in &clusters {
    let mut bay = Bay::from_cluster(cluster, &call.host_url)?;
    if summary {
      bay.unset_fields_except(BAY_SUMMARY)?;
    }
    bays.push(bay);
  }
  let collection = Collection::new("bays", bays).with_next(
    &call.host_url,
    "bays",
    &pagination,
    marker,
    &[],
  );
  ok(&collection)
}

async fn get_all(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  list(call, "get_all", true).await
}

async fn detail(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  list(call, "detail", false).await
}

async fn get_one(mut call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let cluster = show_cluster(&mut call, "bay").await?;
  ok(&Bay::from_cluster(&cluster, &call.host_url)?)
}

async fn post_sync(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let bay = Bay::from_dict(&call.dict()?)?;
  let item = create_and_dispatch(&call, bay.to_cluster()?, true).await?;
  let location = call.resource_url("bays", &item.uuid);
  created(&location, &to_bay(&call, &item).await?)
}

async fn post(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let bay = Bay::from_dict(&call.dict()?)?;
  let item = create_and_dispatch(&call, bay.to_cluster()?, false).await?;
  let location = call.resource_url("bays", &item.uuid);
  accepted_at(&location, &ClusterId { uuid: item.uuid })
}

/// Apply a patch on a bay, the delta is reported with cluster names
async fn update(
  call: &ApiCall,
  rollback: bool,
  sync: bool,
) -> Result<ClusterItem, MagnumError> {
  let patch = call.json::<Vec<JsonPatch>>()?;
  let item = find_cluster(call).await?;
  call.enforce("bay:update", Some(cluster_target(&item)))?;
  let bay = to_bay(call, &item).await?;
  let patched = patch_bay(&bay, &patch)?;
  let cluster = patched.0.to_cluster()?;
  apply_update(call, item, &cluster, &patched.1, rollback, sync).await
}

fn patch_bay(
  bay: &Bay,
  patch: &[JsonPatch],
) -> Result<(Bay, HashSet<String>), MagnumError> {
  let patched = patch_resource(bay, patch, &BAY_PATCH_RULES)?;
  let delta = patched
    .delta
    .iter()
    .map(|field| bay_field_to_cluster(field).to_owned())
    .collect();
  Ok((patched.resource, delta))
}

async fn patch_sync(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let item = update(&call, false, true).await?;
  accepted(&to_bay(&call, &item).await?)
}

async fn patch(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let rollback = rollback(&call)?;
  let item = update(&call, rollback, false).await?;
  accepted(&ClusterId { uuid: item.uuid })
}

async fn delete_sync(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let item = find_cluster(&call).await?;
  call.enforce("bay:delete", Some(cluster_target(&item)))?;
  call
    .call(ConductorMessage::ClusterDelete {
      cluster_uuid: item.uuid,
    })
    .await?;
  no_content()
}

async fn delete(mut call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  delete_cluster(&mut call, "bay").await?;
  no_content()
}

pub fn methods() -> Result<VersionedMethods, VersionError> {
  VersionedMethods::new("BaysController")
    .add(legacy("get_all", handler!(get_all)).policy("bay", "get_all"))?
    .add(legacy("detail", handler!(detail)).policy("bay", "detail"))?
    .add(legacy("get_one", handler!(get_one)))?
    .add(
      legacy("post", handler!(post_sync))
        .max(SYNC_CREATE_MAX_VER)
        .policy("bay", "create"),
    )?
    .add(
      legacy("post", handler!(post))
        .min(Version::new(1, 2))
        .policy("bay", "create"),
    )?
    .add(legacy("patch", handler!(patch_sync)).max(Version::new(1, 2)))?
    .add(legacy("patch", handler!(patch)).min(ROLLBACK_VER))?
    .add(legacy("delete", handler!(delete_sync)).max(SYNC_CREATE_MAX_VER))?
    .add(legacy("delete", handler!(delete)).min(Version::new(1, 2)))
}

#[web::get("/v1/bays")]
async fn list_bays(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.bay;
  dispatch(&req, &state, methods, "get_all", &[], Bytes::new()).await
}

#[web::get("/v1/bays/detail")]
async fn detail_bays(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.bay;
  dispatch(&req, &state, methods, "detail", &[], Bytes::new()).await
}

#[web::get("/v1/bays/{ident}/detail")]
async fn detail_bay() -> Result<web::HttpResponse, HttpResponseError> {
  detail_not_found()
}

#[web::get("/v1/bays/{ident}")]
async fn inspect_bay(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.bay;
  dispatch(&req, &state, methods, "get_one", &["ident"], Bytes::new()).await
}

#[web::post("/v1/bays")]
async fn create_bay(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.bay;
  dispatch(&req, &state, methods, "post", &[], body).await
}

#[web::patch("/v1/bays/{ident}")]
async fn patch_bay_route(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.bay;
  dispatch(&req, &state, methods, "patch", &["ident"], body).await
}

#[web::delete("/v1/bays/{ident}")]
async fn delete_bay(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.bay;
  dispatch(&req, &state, methods, "delete", &["ident"], Bytes::new()).await
}

pub fn ntex_config(config: &mut web::ServiceConfig) {
  config.service(list_bays);
  config.service(detail_bays);
  config.service(detail_bay);
  config.service(inspect_bay);
  config.service(create_bay);
  config.service(patch_bay_route);
  config.service(delete_bay);
}

#[cfg(test)]
mod test_bay {
  use ntex::http::{Method, StatusCode};
  use serde_json::{json, Value};

  use crate::models::ClusterTemplate;
  use crate::utils::tests::*;

  use super::*;

  fn sample() -> Value {
    json!({
      "name": "bay1",
      "baymodel_id": "example",
      "node_count": 1,
      "bay_create_timeout": 30,
    })
  }

  async fn test_create(srv: &TestServer, conductor: &RecordingConductor) -> TestReturn {
    let resp = request(srv, Method::POST, "/v1/baymodels", "1.1")
      .send_json(&ClusterTemplate::sample())
      .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let mut resp = request(srv, Method::POST, "/v1/bays", "1.1")
      .send_json(&sample())
      .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bay = resp.json::<Value>().await?;
    assert_eq!(bay["bay_create_timeout"], 30);
    assert!(bay.get("create_timeout").is_none());
    assert!(bay["baymodel_id"].is_string());
    assert!(bay["links"][0]["href"].as_str().unwrap().contains("/v1/bays/"));
    assert!(matches!(
      conductor.last(),
      Some(ConductorMessage::ClusterCreate { create_timeout: 30, .. })
    ));

    let mut body = sample();
    body["name"] = json!("bay2");
    let mut resp = request(srv, Method::POST, "/v1/bays", "1.2")
      .send_json(&body)
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let location = resp.headers().get("location").unwrap().to_str()?.to_owned();
    let body = resp.json::<Value>().await?;
    let uuid = body["uuid"].as_str().unwrap();
    assert!(location.ends_with(&format!("/v1/bays/{}", uuid)));
    assert!(body.get("name").is_none());
    Ok(())
  }

  async fn test_list(srv: &TestServer) -> TestReturn {
    let mut resp = request(srv, Method::GET, "/v1/bays", "1.10").send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.json::<Value>().await?;
    let bays = body["bays"].as_array().unwrap();
    assert_eq!(bays.len(), 2);
    assert!(bays[0].get("baymodel_id").is_some());
    assert!(bays[0].get("keypair").is_none());

    let mut resp = request(srv, Method::GET, "/v1/bays/bay1", "1.1").send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bay = resp.json::<Value>().await?;
    assert_eq!(bay["keypair"], "k1");

    let resp = request(srv, Method::GET, "/v1/bays", "1.11").send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);
    Ok(())
  }

  async fn test_patch(srv: &TestServer, conductor: &RecordingConductor) -> TestReturn {
    let mut resp = request(srv, Method::PATCH, "/v1/bays/bay1", "1.1")
      .send_json(&json!([{ "op": "replace", "path": "/node_count", "value": 2 }]))
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let bay = resp.json::<Value>().await?;
    assert_eq!(bay["name"], "bay1");
    assert!(matches!(
      conductor.last(),
      Some(ConductorMessage::ClusterUpdate { node_count: 2, rollback: false, .. })
    ));

    let mut resp = request(srv, Method::PATCH, "/v1/bays/bay1?rollback=true", "1.3")
      .send_json(&json!([{ "op": "replace", "path": "/node_count", "value": 3 }]))
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body = resp.json::<Value>().await?;
    assert!(body.get("name").is_none());
    assert!(matches!(
      conductor.last(),
      Some(ConductorMessage::ClusterUpdate { node_count: 3, rollback: true, .. })
    ));

    let resp = request(srv, Method::PATCH, "/v1/bays/bay1", "1.3")
      .send_json(&json!([{ "op": "replace", "path": "/baymodel_id", "value": "x" }]))
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(srv, Method::PATCH, "/v1/bays/bay1", "1.3")
      .send_json(&json!([{ "op": "replace", "path": "/bay_create_timeout", "value": 9 }]))
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
  }

  async fn test_delete(srv: &TestServer, conductor: &RecordingConductor) -> TestReturn {
    let resp = request(srv, Method::DELETE, "/v1/bays/bay2", "1.1").send().await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = request(srv, Method::DELETE, "/v1/bays/bay1", "1.10").send().await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(
      conductor
        .messages()
        .iter()
        .filter(|m| matches!(m, ConductorMessage::ClusterDelete { .. }))
        .count(),
      2
    );
    Ok(())
  }

  #[ntex::test]
  async fn main() -> TestReturn {
    let (state, conductor) = generate_state(&[]);
    let srv = generate_server_with(crate::controllers::ntex_config, state).await;
    test_create(&srv, &conductor).await?;
    test_list(&srv).await?;
    test_patch(&srv, &conductor).await?;
    test_delete(&srv, &conductor).await?;
    Ok(())
  }
}
