//! File to handle federation routes
//!
//! Members join and leave a federation through a patch on `/member_ids`,
//! the single `add` or `remove` operation is rewritten to a `replace` of
//! the whole member list.
use chrono::Utc;
use ntex::util::Bytes;
use ntex::web;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::{HttpResponseError, MagnumError};
use crate::models::{
  flatten, ApiResource, Collection, Federation, FederationId, FederationItem,
  JsonPatch, PatchOp, Status, FEDERATION_PATCH_RULES, FEDERATION_SUMMARY,
  MEMBER_IDS_PATH,
};
use crate::repositories;
use crate::services::conductor::ConductorMessage;
use crate::services::validation;
use crate::state::ApiState;
use crate::utils::name::generate_name;
use crate::utils::patch::{merge_into_item, patch_resource};
use crate::version::VersionError;

use super::base::{
  accepted, accepted_at, detail_not_found, dispatch, handler, no_content, ok, ApiCall,
  Versioned, VersionedMethods,
};
use super::cluster::rollback;

/// Minutes the conductor waits for a federation to be created
pub const FEDERATION_CREATE_TIMEOUT: i64 = 15;

fn federation_target(item: &FederationItem) -> Value {
  json!({ "project_id": item.project_id })
}

async fn find_federation(call: &ApiCall) -> Result<FederationItem, MagnumError> {
  let ident = call.param("ident")?;
  repositories::federation::find_by_ident(&ident, &call.scope(), call.store()).await
}

async fn list(call: ApiCall, summary: bool) -> Result<web::HttpResponse, MagnumError> {
  let pagination = call.pagination()?;
  let items =
    repositories::federation::list(&call.scope(), &pagination, call.store()).await?;
  let marker = items.last().map(|item| item.uuid.clone());
  let federations = items
    .iter()
    .map(|item| {
      let mut federation = Federation::convert(item, &call.host_url)?;
      if summary {
        federation.unset_fields_except(FEDERATION_SUMMARY)?;
      }
      Ok(federation)
    })
    .collect::<Result<Vec<Federation>, MagnumError>>()?;
  let collection = Collection::new("federations", federations).with_next(
    &call.host_url,
    "federations",
    &pagination,
    marker,
    &[],
  );
  ok(&collection)
}

async fn get_all(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  list(call, true).await
}

async fn detail(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  list(call, false).await
}

async fn get_one(mut call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  call.enforce_all_projects("federation:get_one_all_projects")?;
  let item = find_federation(&call).await?;
  call.enforce("federation:get", Some(federation_target(&item)))?;
  ok(&Federation::convert(&item, &call.host_url)?)
}

async fn post(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let federation = Federation::from_dict(&call.dict()?)?;
  validation::validate_federation_dns_zone(federation.properties.as_ref())?;
  let host_ident = federation.hostcluster_id.clone().ok_or_else(|| {
    MagnumError::invalid("Mandatory field missing: hostcluster_id")
  })?;
  let host = repositories::cluster::find_by_ident(&host_ident, &call.scope(), call.store())
    .await
    .map_err(MagnumError::into_client_error)?;
  let item = FederationItem {
    id: 0,
    uuid: Uuid::new_v4().to_string(),
    project_id: call.ctx.project(),
    name: Some(
      flatten(&federation.name)
        .cloned()
        .unwrap_or_else(|| generate_name("federation")),
    ),
    hostcluster_id: host.uuid,
    member_ids: federation.member_ids.unwrap_or_default(),
    status: Some(Status::CreateInProgress),
    status_reason: None,
    properties: federation.properties.unwrap_or_default(),
    created_at: Utc::now(),
    updated_at: None,
  };
  let item = repositories::federation::create(item, call.store()).await?;
  call
    .cast(ConductorMessage::FederationCreate {
      federation_uuid: item.uuid.clone(),
      create_timeout: FEDERATION_CREATE_TIMEOUT,
    })
    .await?;
  let location = call.resource_url("federations", &item.uuid);
  accepted_at(&location, &FederationId { uuid: item.uuid })
}

/// Turn a member `add` or `remove` into a `replace` of the member list
async fn rewrite_membership(
  call: &ApiCall,
  item: &FederationItem,
  patch: Vec<JsonPatch>,
) -> Result<Vec<JsonPatch>, MagnumError> {
  let member_root = MEMBER_IDS_PATH.trim_start_matches('/');
  let touches_members = patch.iter().any(|op| op.root() == member_root);
  if !touches_members {
    return Ok(patch);
  }
  if patch.len() > 1 {
    return Err(MagnumError::invalid(
      "A patch changing /member_ids must hold a single operation.",
    ));
  }
  let op = &patch[0];
  if op.depth() > 1 {
    return Err(MagnumError::invalid(format!(
      "Invalid path {}, members are changed through {}.",
      op.path, MEMBER_IDS_PATH
    )));
  }
  let member = match (&op.op, &op.value) {
    (PatchOp::Add, Some(Value::String(member)))
    | (PatchOp::Remove, Some(Value::String(member))) => member.clone(),
    _ => {
      return Err(MagnumError::invalid(
        "Members are added or removed one cluster at a time.",
      ))
    }
  };
  let mut members = item.member_ids.clone();
  if op.op == PatchOp::Add {
    let cluster =
      repositories::cluster::find_by_ident(&member, &call.scope(), call.store())
        .await?;
    if members.contains(&cluster.uuid) {
      return Err(MagnumError::Conflict(format!(
        "Cluster {} is already a member of the federation {}.",
        cluster.uuid, item.uuid
      )));
    }
    members.push(cluster.uuid);
  } else {
    if !members.contains(&member) {
      return Err(MagnumError::NotFound(format!(
        "Cluster {} is not a member of the federation {}.",
        member, item.uuid
      )));
    }
    members.retain(|uuid| *uuid != member);
  }
  Ok(vec![JsonPatch::new(
    PatchOp::Replace,
    MEMBER_IDS_PATH,
    Some(json!(members)),
  )])
}

async fn patch(mut call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let patch = call.json::<Vec<JsonPatch>>()?;
  let rollback = rollback(&call)?;
  call.enforce_all_projects("federation:update_all_projects")?;
  let item = find_federation(&call).await?;
  call.enforce("federation:update", Some(federation_target(&item)))?;
  let patch = rewrite_membership(&call, &item, patch).await?;
  let federation = Federation::convert(&item, &call.host_url)?;
  let patched = patch_resource(&federation, &patch, &FEDERATION_PATCH_RULES)?;
  validation::validate_federation_properties(&patched.delta)?;
  let mut item = merge_into_item(&item, &patched.resource)?;
  item.status = Some(Status::UpdateInProgress);
  let item = repositories::federation::update(item, call.store()).await?;
  call
    .cast(ConductorMessage::FederationUpdate {
      federation_uuid: item.uuid.clone(),
      rollback,
    })
    .await?;
  accepted(&FederationId { uuid: item.uuid })
}

async fn delete(mut call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  call.enforce_all_projects("federation:delete_all_projects")?;
  let item = find_federation(&call).await?;
  call.enforce("federation:delete", Some(federation_target(&item)))?;
  call
    .cast(ConductorMessage::FederationDelete {
      federation_uuid: item.uuid,
    })
    .await?;
  no_content()
}

pub fn methods() -> Result<VersionedMethods, VersionError> {
  VersionedMethods::new("FederationsController")
    .add(Versioned::new("get_all", handler!(get_all)).policy("federation", "get_all"))?
    .add(Versioned::new("detail", handler!(detail)).policy("federation", "detail"))?
    .add(Versioned::new("get_one", handler!(get_one)))?
    .add(Versioned::new("post", handler!(post)).policy("federation", "create"))?
    .add(Versioned::new("patch", handler!(patch)))?
    .add(Versioned::new("delete", handler!(delete)))
}

#[web::get("/v1/federations")]
async fn list_federations(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.federation;
  dispatch(&req, &state, methods, "get_all", &[], Bytes::new()).await
}

#[web::get("/v1/federations/detail")]
async fn detail_federations(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.federation;
  dispatch(&req, &state, methods, "detail", &[], Bytes::new()).await
}

#[web::get("/v1/federations/{ident}/detail")]
async fn detail_federation() -> Result<web::HttpResponse, HttpResponseError> {
  detail_not_found()
}

#[web::get("/v1/federations/{ident}")]
async fn inspect_federation(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.federation;
  dispatch(&req, &state, methods, "get_one", &["ident"], Bytes::new()).await
}

#[web::post("/v1/federations")]
async fn create_federation(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.federation;
  dispatch(&req, &state, methods, "post", &[], body).await
}

#[web::patch("/v1/federations/{ident}")]
async fn patch_federation(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.federation;
  dispatch(&req, &state, methods, "patch", &["ident"], body).await
}

#[web::delete("/v1/federations/{ident}")]
async fn delete_federation(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.federation;
  dispatch(&req, &state, methods, "delete", &["ident"], Bytes::new()).await
}

pub fn ntex_config(config: &mut web::ServiceConfig) {
  config.service(list_federations);
  config.service(detail_federations);
  config.service(detail_federation);
  config.service(inspect_federation);
  config.service(create_federation);
  config.service(patch_federation);
  config.service(delete_federation);
}

#[cfg(test)]
mod test_federation {
  use ntex::http::{Method, StatusCode};
  use serde_json::{json, Value};

  use crate::controllers::cluster::test_cluster::seed;
  use crate::models::Cluster;
  use crate::utils::tests::*;

  use super::*;

  async fn create_member(srv: &TestServer, name: &str) -> Result<String, Box<dyn std::error::Error>> {
    let mut body = Cluster::sample();
    body["name"] = json!(name);
    let mut resp = request(srv, Method::POST, "/v1/clusters", "1.2")
      .send_json(&body)
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body = resp.json::<Value>().await?;
    Ok(body["uuid"].as_str().unwrap_or_default().to_owned())
  }

  async fn test_create(srv: &TestServer, member_a: &str) -> TestReturn {
    let mut body = Federation::sample();
    body["hostcluster_id"] = json!("example");
    body["member_ids"] = json!([member_a]);
    let mut resp = request(srv, Method::POST, "/v1/federations", "1.9")
      .send_json(&body)
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let location = resp.headers().get("location").unwrap().to_str()?.to_owned();
    let body = resp.json::<Value>().await?;
    let uuid = body["uuid"].as_str().unwrap();
    assert!(location.ends_with(&format!("/v1/federations/{}", uuid)));

    let mut body = Federation::sample();
    body["name"] = json!("nozone");
    body["hostcluster_id"] = json!("example");
    body["properties"] = json!({});
    let resp = request(srv, Method::POST, "/v1/federations", "1.9")
      .send_json(&body)
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let mut body = Federation::sample();
    body["name"] = json!("nohost");
    body["hostcluster_id"] = json!("missing");
    let resp = request(srv, Method::POST, "/v1/federations", "1.9")
      .send_json(&body)
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let mut resp = request(srv, Method::GET, "/v1/federations", "1.9").send().await?;
    let body = resp.json::<Value>().await?;
    assert_eq!(body["federations"].as_array().unwrap().len(), 1);
    Ok(())
  }

  async fn members(srv: &TestServer) -> Result<Value, Box<dyn std::error::Error>> {
    let mut resp = request(srv, Method::GET, "/v1/federations/example", "1.9")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(resp.json::<Value>().await?["member_ids"].clone())
  }

  async fn test_join(
    srv: &TestServer,
    conductor: &RecordingConductor,
    member_a: &str,
    member_b: &str,
  ) -> TestReturn {
    let join = json!([{ "op": "add", "path": "/member_ids", "value": member_b }]);
    let resp = request(srv, Method::PATCH, "/v1/federations/example", "1.9")
      .send_json(&join)
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(members(srv).await?, json!([member_a, member_b]));
    assert!(matches!(
      conductor.last(),
      Some(ConductorMessage::FederationUpdate { rollback: false, .. })
    ));

    let resp = request(srv, Method::PATCH, "/v1/federations/example", "1.9")
      .send_json(&join)
      .await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let unknown = json!([{ "op": "add", "path": "/member_ids", "value": "nope" }]);
    let resp = request(srv, Method::PATCH, "/v1/federations/example", "1.9")
      .send_json(&unknown)
      .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let multi = json!([
      { "op": "add", "path": "/member_ids", "value": member_b },
      { "op": "replace", "path": "/name", "value": "other" },
    ]);
    let resp = request(srv, Method::PATCH, "/v1/federations/example", "1.9")
      .send_json(&multi)
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let nested = json!([{ "op": "add", "path": "/member_ids/-", "value": "nope" }]);
    let resp = request(srv, Method::PATCH, "/v1/federations/example", "1.9")
      .send_json(&nested)
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let nested_multi = json!([
      { "op": "add", "path": "/member_ids/0", "value": "nope" },
      { "op": "add", "path": "/member_ids/1", "value": "nope" },
    ]);
    let resp = request(srv, Method::PATCH, "/v1/federations/example", "1.9")
      .send_json(&nested_multi)
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let replace = json!([{ "op": "replace", "path": "/member_ids", "value": ["nope"] }]);
    let resp = request(srv, Method::PATCH, "/v1/federations/example", "1.9")
      .send_json(&replace)
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(members(srv).await?, json!([member_a, member_b]));
    Ok(())
  }

  async fn test_unjoin(srv: &TestServer, member_a: &str, member_b: &str) -> TestReturn {
    let leave = json!([{ "op": "remove", "path": "/member_ids", "value": member_a }]);
    let resp = request(srv, Method::PATCH, "/v1/federations/example?rollback=1", "1.9")
      .send_json(&leave)
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(members(srv).await?, json!([member_b]));

    let resp = request(srv, Method::PATCH, "/v1/federations/example", "1.9")
      .send_json(&leave)
      .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let rename = json!([{ "op": "replace", "path": "/name", "value": "other" }]);
    let resp = request(srv, Method::PATCH, "/v1/federations/example", "1.9")
      .send_json(&rename)
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
  }

  async fn test_admin(srv: &TestServer) -> TestReturn {
    let mut resp = admin_request(srv, Method::GET, "/v1/federations/example", "1.9")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.json::<Value>().await?["project_id"], json!(PROJECT_ID));
    Ok(())
  }

  async fn test_delete(srv: &TestServer, conductor: &RecordingConductor) -> TestReturn {
    let resp = request(srv, Method::DELETE, "/v1/federations/example", "1.9")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(matches!(
      conductor.last(),
      Some(ConductorMessage::FederationDelete { .. })
    ));
    Ok(())
  }

  #[ntex::test]
  async fn main() -> TestReturn {
    let (state, conductor) = generate_state(&[]);
    let srv = generate_server_with(crate::controllers::ntex_config, state).await;
    let member_a = seed(&srv).await?;
    let member_b = create_member(&srv, "member").await?;
    test_create(&srv, &member_a).await?;
    test_join(&srv, &conductor, &member_a, &member_b).await?;
    test_unjoin(&srv, &member_a, &member_b).await?;
    test_admin(&srv).await?;
    test_delete(&srv, &conductor).await?;
    Ok(())
  }
}
