//! File to handle cluster routes
//!
//! The conductor builds, updates and deletes the clusters. Version 1.1
//! waits for the creation to be handled, later versions answer with the
//! uuid of the cluster as soon as the work is queued.
use std::collections::HashSet;

use chrono::Utc;
use ntex::util::Bytes;
use ntex::web;
use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::{HttpResponseError, MagnumError};
use crate::models::{
  flatten, parse_bool, to_dict, ApiResource, Cluster, ClusterId, ClusterItem,
  ClusterTemplateItem, Coe, Collection, Faults, JsonPatch, NodeGroupItem,
  Pagination, QuotaResource, Status, CLUSTER_HEALTH_PROPERTIES,
  CLUSTER_PATCH_RULES, CLUSTER_SUMMARY, MASTER_ROLE, WORKER_ROLE,
};
use crate::repositories;
use crate::services::conductor::ConductorMessage;
use crate::services::validation;
use crate::state::ApiState;
use crate::utils::name::generate_name;
use crate::utils::patch::{merge_into_item, patch_resource};
use crate::version::{Version, VersionError};

use super::base::{
  accepted, accepted_at, created, detail_not_found, dispatch, handler, no_content, ok,
  target, ApiCall, Versioned, VersionedMethods,
};

/// Minutes the conductor waits for a cluster to be created
pub const DEFAULT_CREATE_TIMEOUT: i64 = 60;

/// Last version creating clusters synchronously
pub const SYNC_CREATE_MAX_VER: Version = Version::new(1, 1);
/// First version reading the `rollback` query parameter
pub const ROLLBACK_VER: Version = Version::new(1, 3);
/// First version accepting nodegroups without nodes
pub const ZERO_NODES_VER: Version = Version::new(1, 10);

/// Query string of updates
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RollbackQuery {
  pub(crate) rollback: Option<String>,
}

/// Whether a failed update must be rolled back
pub fn rollback(call: &ApiCall) -> Result<bool, MagnumError> {
  match call.query::<RollbackQuery>()?.rollback {
    None => Ok(false),
    Some(value) => parse_bool("rollback", &value),
  }
}

/// Empty node groups are only accepted from 1.10
pub fn check_node_count(call: &ApiCall, node_count: i64) -> Result<(), MagnumError> {
  let min = if call.version >= ZERO_NODES_VER { 0 } else { 1 };
  if node_count < min {
    return Err(MagnumError::invalid(format!(
      "Invalid input for field node_count: {} is lower than {}.",
      node_count, min
    )));
  }
  Ok(())
}

pub fn cluster_target(item: &ClusterItem) -> Value {
  target(&item.project_id, &item.user_id)
}

/// Cluster named by the `ident` path parameter
pub async fn find_cluster(call: &ApiCall) -> Result<ClusterItem, MagnumError> {
  let ident = call.param("ident")?;
  repositories::cluster::find_by_ident(&ident, &call.scope(), call.store()).await
}

/// Wire form of a cluster, counts come from its nodegroups
pub async fn to_wire(call: &ApiCall, item: &ClusterItem) -> Result<Cluster, MagnumError> {
  let nodegroups =
    repositories::nodegroup::list_by_cluster(&item.uuid, call.store()).await?;
  Cluster::convert(item, &nodegroups, &call.host_url)
}

/// Reasons of the failed stack resources of a failed cluster.
///
/// The stack is best effort: a failing lookup yields no fault.
pub async fn collect_faults(call: &ApiCall, item: &ClusterItem) -> Option<Faults> {
  if !item.status.map_or(false, |status| status.is_failed()) {
    return None;
  }
  let stack_id = match &item.stack_id {
    None => return Some(Faults::new()),
    Some(stack_id) => stack_id,
  };
  let resources = call
    .state
    .clients
    .list_stack_resources(&call.ctx, stack_id, Some("FAILED"))
    .await;
  match resources {
    Ok(resources) => Some(
      resources
        .into_iter()
        .map(|res| (res.resource_name, res.resource_status_reason))
        .collect(),
    ),
    Err(err) => {
      log::warn!(
        "[{}] Failed to retrieve failed resources of stack {}: {}",
        call.ctx.request_id,
        stack_id,
        err
      );
      Some(Faults::new())
    }
  }
}

/// A page of clusters in their full form
pub async fn list_page(
  call: &mut ApiCall,
  policy: &str,
  action: &str,
) -> Result<(Vec<Cluster>, Pagination, Option<String>), MagnumError> {
  call.enforce_all_projects(&format!("{}:{}_all_projects", policy, action))?;
  let pagination = call.pagination()?;
  let items =
    repositories::cluster::list(&call.scope(), &pagination, call.store()).await?;
  let marker = items.last().map(|item| item.uuid.clone());
  let mut clusters = Vec::with_capacity(items.len());
  for item in &items {
    clusters.push(to_wire(call, item).await?);
  }
  Ok((clusters, pagination, marker))
}

/// Cluster named by the path with its faults when it failed
pub async fn show_cluster(
  call: &mut ApiCall,
  policy: &str,
) -> Result<Cluster, MagnumError> {
  call.enforce_all_projects(&format!("{}:get_one_all_projects", policy))?;
  let item = find_cluster(call).await?;
  call.enforce(&format!("{}:get", policy), Some(cluster_target(&item)))?;
  let mut cluster = to_wire(call, &item).await?;
  cluster.faults = collect_faults(call, &item).await;
  Ok(cluster)
}

async fn check_quota(call: &ApiCall) -> Result<(), MagnumError> {
  let project_id = call.ctx.project();
  let quota =
    repositories::quota::find(&project_id, QuotaResource::Cluster, call.store())
      .await?;
  let hard_limit = match quota {
    Some(quota) => quota.hard_limit,
    None => call.state.config.quotas.max_clusters_per_project,
  };
  let count =
    repositories::cluster::count_by_project(&project_id, call.store()).await?;
  if count as i64 >= hard_limit {
    return Err(MagnumError::invalid(format!(
      "Resource limit exceeded: you have reached the maximum number of \
       clusters ({}) of project {}.",
      hard_limit, project_id
    )));
  }
  Ok(())
}

fn default_nodegroup(
  cluster: &ClusterItem,
  template: &ClusterTemplateItem,
  role: &str,
  node_count: i64,
) -> NodeGroupItem {
  let is_master = role == MASTER_ROLE;
  NodeGroupItem {
    id: 0,
    uuid: Uuid::new_v4().to_string(),
    name: format!("default-{}", role),
    cluster_id: cluster.uuid.clone(),
    project_id: cluster.project_id.clone(),
    flavor_id: if is_master {
      cluster.master_flavor_id.clone()
    } else {
      cluster.flavor_id.clone()
    },
    image_id: Some(template.image_id.clone()),
    docker_volume_size: cluster.docker_volume_size,
    labels: cluster.labels.clone(),
    node_addresses: Vec::new(),
    node_count,
    role: role.to_owned(),
    min_node_count: if is_master { 1 } else { 0 },
    max_node_count: None,
    is_default: true,
    stack_id: None,
    status: Some(Status::CreateInProgress),
    status_reason: None,
    version: None,
    created_at: Utc::now(),
    updated_at: None,
  }
}

/// Cluster references the cloud must know, the template fills the gaps
fn reference_dict(item: &ClusterItem) -> Map<String, Value> {
  let mut dict = Map::new();
  for (key, value) in [
    ("keypair", &item.keypair),
    ("flavor_id", &item.flavor_id),
    ("master_flavor_id", &item.master_flavor_id),
    ("fixed_network", &item.fixed_network),
  ] {
    if let Some(value) = value {
      dict.insert(key.to_owned(), Value::String(value.clone()));
    }
  }
  if let Ok(labels) = serde_json::to_value(&item.labels) {
    dict.insert(String::from("labels"), labels);
  }
  dict
}

/// Validate a create request and store the cluster with its default
/// nodegroups
async fn create_cluster(
  call: &ApiCall,
  cluster: Cluster,
) -> Result<ClusterItem, MagnumError> {
  let node_count = cluster.node_count.unwrap_or(1);
  check_node_count(call, node_count)?;
  let master_count = cluster.master_count.unwrap_or(1);
  let template_ident = cluster.cluster_template_id.clone().ok_or_else(|| {
    MagnumError::invalid("Mandatory field missing: cluster_template_id")
  })?;
  let template = repositories::cluster_template::find_by_ident(
    &template_ident,
    &call.scope(),
    call.store(),
  )
  .await
  .map_err(MagnumError::into_client_error)?;
  check_quota(call).await?;
  let master_lb_enabled = flatten(&cluster.master_lb_enabled)
    .copied()
    .unwrap_or_else(|| template.master_lb_enabled());
  if master_count > 1 && template.coe != Coe::Kubernetes {
    return Err(MagnumError::invalid(format!(
      "master_count must be 1 for {} clusters, got {}.",
      template.coe, master_count
    )));
  }
  if master_count > 1 && !master_lb_enabled {
    return Err(MagnumError::invalid(
      "master_count must be 1 when master_lb_enabled is False",
    ));
  }
  let labels = match (cluster.labels.clone().flatten(), cluster.merge_labels) {
    (None, _) => template.labels.clone(),
    (Some(own), Some(true)) => {
      let mut merged = template.labels.clone();
      merged.extend(own);
      merged
    }
    (Some(own), _) => own,
  };
  let item = ClusterItem {
    id: 0,
    uuid: Uuid::new_v4().to_string(),
    project_id: call.ctx.project(),
    user_id: call.ctx.user(),
    name: Some(
      flatten(&cluster.name)
        .cloned()
        .unwrap_or_else(|| generate_name("cluster")),
    ),
    cluster_template_id: template.uuid.clone(),
    keypair: flatten(&cluster.keypair)
      .cloned()
      .or_else(|| template.keypair_id.clone()),
    docker_volume_size: flatten(&cluster.docker_volume_size)
      .copied()
      .or(template.docker_volume_size),
    labels,
    master_flavor_id: flatten(&cluster.master_flavor_id)
      .cloned()
      .or_else(|| template.master_flavor_id.clone()),
    flavor_id: flatten(&cluster.flavor_id)
      .cloned()
      .or_else(|| template.flavor_id.clone()),
    create_timeout: Some(
      flatten(&cluster.create_timeout)
        .copied()
        .unwrap_or(DEFAULT_CREATE_TIMEOUT),
    ),
    stack_id: None,
    status: Some(Status::CreateInProgress),
    status_reason: None,
    health_status: None,
    health_status_reason: None,
    discovery_url: flatten(&cluster.discovery_url).cloned(),
    api_address: None,
    coe_version: None,
    container_version: None,
    master_lb_enabled: Some(master_lb_enabled),
    floating_ip_enabled: flatten(&cluster.floating_ip_enabled)
      .copied()
      .or(template.floating_ip_enabled),
    fixed_network: flatten(&cluster.fixed_network)
      .cloned()
      .or_else(|| template.fixed_network.clone()),
    fixed_subnet: flatten(&cluster.fixed_subnet)
      .cloned()
      .or_else(|| template.fixed_subnet.clone()),
    ca_cert_ref: None,
    magnum_cert_ref: None,
    etcd_ca_cert_ref: None,
    front_proxy_ca_cert_ref: None,
    trust_id: None,
    trustee_username: None,
    trustee_password: None,
    trustee_user_id: None,
    created_at: Utc::now(),
    updated_at: None,
  };
  let clients = call.state.clients.clone();
  validation::validate_os_resources(
    clients.as_ref(),
    &call.ctx,
    &to_dict(&template)?,
    Some(&reference_dict(&item)),
  )
  .await?;
  let nodegroups = vec![
    default_nodegroup(&item, &template, MASTER_ROLE, master_count),
    default_nodegroup(&item, &template, WORKER_ROLE, node_count),
  ];
  let item = repositories::cluster::create(item, nodegroups, call.store()).await?;
  log::info!(
    "[{}] cluster {} created from template {}",
    call.ctx.request_id,
    item.uuid,
    template.uuid
  );
  Ok(item)
}

/// Create a cluster and hand it to the conductor.
///
/// With `sync` the conductor is waited for and the stored row is read
/// back.
pub async fn create_and_dispatch(
  call: &ApiCall,
  cluster: Cluster,
  sync: bool,
) -> Result<ClusterItem, MagnumError> {
  let item = create_cluster(call, cluster).await?;
  let message = ConductorMessage::ClusterCreate {
    cluster_uuid: item.uuid.clone(),
    create_timeout: item.create_timeout.unwrap_or(DEFAULT_CREATE_TIMEOUT),
  };
  if !sync {
    call.cast(message).await?;
    return Ok(item);
  }
  call.call(message).await?;
  repositories::cluster::find_by_uuid(&item.uuid, call.store()).await
}

/// Policy rule of a patch, health reports have their own
pub fn update_rule(patch: &[JsonPatch]) -> &'static str {
  if patch
    .iter()
    .all(|op| CLUSTER_HEALTH_PROPERTIES.contains(&op.root()))
  {
    "cluster:update_health_status"
  } else {
    "cluster:update"
  }
}

/// Forward a patched cluster.
///
/// Health reports are saved right away, node count changes go to the
/// conductor with the post patch count.
pub async fn apply_update(
  call: &ApiCall,
  item: ClusterItem,
  cluster: &Cluster,
  delta: &HashSet<String>,
  rollback: bool,
  sync: bool,
) -> Result<ClusterItem, MagnumError> {
  validation::validate_cluster_properties(delta)?;
  if delta.is_empty() {
    return Ok(item);
  }
  if delta
    .iter()
    .all(|field| CLUSTER_HEALTH_PROPERTIES.contains(&field.as_str()))
  {
    let item = merge_into_item(&item, cluster)?;
    return repositories::cluster::update(item, call.store()).await;
  }
  let node_count = cluster
    .node_count
    .ok_or_else(|| MagnumError::invalid("'/node_count' is a mandatory attribute"))?;
  check_node_count(call, node_count)?;
  let mut fields = delta.iter().cloned().collect::<Vec<String>>();
  fields.sort();
  let message = ConductorMessage::ClusterUpdate {
    cluster_uuid: item.uuid.clone(),
    node_count,
    delta: fields,
    rollback,
  };
  if !sync {
    call.cast(message).await?;
    return Ok(item);
  }
  call.call(message).await?;
  repositories::cluster::find_by_uuid(&item.uuid, call.store()).await
}

/// Hand a cluster deletion to the conductor
pub async fn delete_cluster(call: &mut ApiCall, policy: &str) -> Result<(), MagnumError> {
  call.enforce_all_projects(&format!("{}:delete_all_projects", policy))?;
  let item = find_cluster(call).await?;
  call.enforce(&format!("{}:delete", policy), Some(cluster_target(&item)))?;
  call
    .cast(ConductorMessage::ClusterDelete {
      cluster_uuid: item.uuid.clone(),
    })
    .await?;
  log::info!("[{}] cluster {} deletion requested", call.ctx.request_id, item.uuid);
  Ok(())
}

async fn list(
  mut call: ApiCall,
  action: &str,
  summary: bool,
) -> Result<web::HttpResponse, MagnumError> {
  let (mut clusters, pagination, marker) =
    list_page(&mut call, "cluster", action).await?;
  if summary {
    for cluster in clusters.iter_mut() {
      cluster.unset_fields_except(CLUSTER_SUMMARY)?;
    }
  }
  let collection = Collection::new("clusters", clusters).with_next(
    &call.host_url,
    "clusters",
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
  let cluster = show_cluster(&mut call, "cluster").await?;
  ok(&cluster)
}

async fn post_sync(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let cluster = Cluster::from_dict(&call.dict()?)?;
  let item = create_and_dispatch(&call, cluster, true).await?;
  let location = call.resource_url("clusters", &item.uuid);
  created(&location, &to_wire(&call, &item).await?)
}

async fn post(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let cluster = Cluster::from_dict(&call.dict()?)?;
  let item = create_and_dispatch(&call, cluster, false).await?;
  let location = call.resource_url("clusters", &item.uuid);
  accepted_at(&location, &ClusterId { uuid: item.uuid })
}

async fn update(mut call: ApiCall, rollback: bool) -> Result<web::HttpResponse, MagnumError> {
  let patch = call.json::<Vec<JsonPatch>>()?;
  call.enforce_all_projects("cluster:update_all_projects")?;
  let item = find_cluster(&call).await?;
  call.enforce(update_rule(&patch), Some(cluster_target(&item)))?;
  let cluster = to_wire(&call, &item).await?;
  let patched = patch_resource(&cluster, &patch, &CLUSTER_PATCH_RULES)?;
  let item =
    apply_update(&call, item, &patched.resource, &patched.delta, rollback, false)
      .await?;
  accepted(&ClusterId { uuid: item.uuid })
}

async fn patch_no_rollback(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  update(call, false).await
}

async fn patch(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let rollback = rollback(&call)?;
  update(call, rollback).await
}

async fn delete(mut call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  delete_cluster(&mut call, "cluster").await?;
  no_content()
}

pub fn methods() -> Result<VersionedMethods, VersionError> {
  VersionedMethods::new("ClustersController")
    .add(Versioned::new("get_all", handler!(get_all)).policy("cluster", "get_all"))?
    .add(Versioned::new("detail", handler!(detail)).policy("cluster", "detail"))?
    .add(Versioned::new("get_one", handler!(get_one)))?
    .add(
      Versioned::new("post", handler!(post_sync))
        .max(SYNC_CREATE_MAX_VER)
        .policy("cluster", "create"),
    )?
    .add(
      Versioned::new("post", handler!(post))
        .min(Version::new(1, 2))
        .policy("cluster", "create"),
    )?
    .add(Versioned::new("patch", handler!(patch_no_rollback)).max(Version::new(1, 2)))?
    .add(Versioned::new("patch", handler!(patch)).min(ROLLBACK_VER))?
    .add(Versioned::new("delete", handler!(delete)))
}

/// List clusters
#[web::get("/v1/clusters")]
async fn list_clusters(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster;
  dispatch(&req, &state, methods, "get_all", &[], Bytes::new()).await
}

/// List clusters with every attribute
#[web::get("/v1/clusters/detail")]
async fn detail_clusters(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster;
  dispatch(&req, &state, methods, "detail", &[], Bytes::new()).await
}

#[web::get("/v1/clusters/{ident}/detail")]
async fn detail_cluster() -> Result<web::HttpResponse, HttpResponseError> {
  detail_not_found()
}

/// Inspect a cluster by uuid or name
#[web::get("/v1/clusters/{ident}")]
async fn inspect_cluster(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster;
  dispatch(&req, &state, methods, "get_one", &["ident"], Bytes::new()).await
}

/// Create new cluster
#[web::post("/v1/clusters")]
async fn create_cluster_route(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster;
  dispatch(&req, &state, methods, "post", &[], body).await
}

/// Apply a json patch to a cluster
#[web::patch("/v1/clusters/{ident}")]
async fn patch_cluster(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster;
  dispatch(&req, &state, methods, "patch", &["ident"], body).await
}

/// Delete a cluster by uuid or name
#[web::delete("/v1/clusters/{ident}")]
async fn delete_cluster_route(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster;
  dispatch(&req, &state, methods, "delete", &["ident"], Bytes::new()).await
}

pub fn ntex_config(config: &mut web::ServiceConfig) {
  config.service(list_clusters);
  config.service(detail_clusters);
  config.service(detail_cluster);
  config.service(inspect_cluster);
  config.service(create_cluster_route);
  config.service(patch_cluster);
  config.service(delete_cluster_route);
}

#[cfg(test)]
pub mod test_cluster {
  use std::sync::Arc;

  use ntex::http::{Method, StatusCode};
  use serde_json::{json, Value};

  use crate::models::ClusterTemplate;
  use crate::services::openstack::{Inventory, OpenStackClients, StackResource};
  use crate::utils::tests::*;

  use super::*;

  /// Store the sample template and a cluster built on it at 1.2
  pub async fn seed(srv: &TestServer) -> Result<String, Box<dyn std::error::Error>> {
    let resp = request(srv, Method::POST, "/v1/clustertemplates", "1.1")
      .send_json(&ClusterTemplate::sample())
      .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let mut resp = request(srv, Method::POST, "/v1/clusters", "1.2")
      .send_json(&Cluster::sample())
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body = resp.json::<Value>().await?;
    Ok(body["uuid"].as_str().unwrap_or_default().to_owned())
  }

  async fn test_create_versions(srv: &TestServer, conductor: &RecordingConductor) -> TestReturn {
    let uuid = seed(srv).await?;
    assert!(matches!(
      conductor.last(),
      Some(ConductorMessage::ClusterCreate { cluster_uuid, create_timeout: 15 }) if cluster_uuid == uuid
    ));

    let mut body = Cluster::sample();
    body["name"] = json!("sync");
    let mut resp = request(srv, Method::POST, "/v1/clusters", "1.1")
      .send_json(&body)
      .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let cluster = resp.json::<Value>().await?;
    assert_eq!(cluster["name"], "sync");
    assert_eq!(cluster["node_count"], 2);
    assert_eq!(cluster["master_count"], 1);
    assert_eq!(cluster["keypair"], "k1");
    assert_eq!(cluster["flavor_id"], "m1.small");
    assert_eq!(cluster["labels"], json!({}));
    assert_eq!(cluster["status"], "CREATE_IN_PROGRESS");
    let location = resp.headers().get("location").unwrap().to_str()?;
    assert!(location.ends_with(&format!(
      "/v1/clusters/{}",
      cluster["uuid"].as_str().unwrap()
    )));
    Ok(())
  }

  async fn test_create_errors(srv: &TestServer) -> TestReturn {
    let mut body = Cluster::sample();
    body["cluster_template_id"] = json!("missing");
    let resp = request(srv, Method::POST, "/v1/clusters", "1.2")
      .send_json(&body)
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let mut body = Cluster::sample();
    body["node_count"] = json!(0);
    let resp = request(srv, Method::POST, "/v1/clusters", "1.9")
      .send_json(&body)
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let mut body = Cluster::sample();
    body["master_count"] = json!(3);
    let resp = request(srv, Method::POST, "/v1/clusters", "1.2")
      .send_json(&body)
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let mut body = Cluster::sample();
    body["keypair"] = json!("unknown");
    let resp = request(srv, Method::POST, "/v1/clusters", "1.2")
      .send_json(&body)
      .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
  }

  async fn test_inherited_defaults(srv: &TestServer) -> TestReturn {
    let body = json!({
      "name": "merged",
      "cluster_template_id": "example",
      "labels": { "key2": "val2" },
      "merge_labels": true,
    });
    let mut resp = request(srv, Method::POST, "/v1/clusters", "1.10")
      .send_json(&body)
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let location = resp.headers().get("location").unwrap().to_str()?.to_owned();
    let uuid = resp.json::<Value>().await?["uuid"].clone();
    let path = format!("/v1/clusters/{}", uuid.as_str().unwrap());
    assert!(location.ends_with(&path));
    let mut resp = request(srv, Method::GET, &path, "1.10").send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let cluster = resp.json::<Value>().await?;
    assert_eq!(cluster["labels"], json!({ "key1": "val1", "key2": "val2" }));
    assert_eq!(cluster["docker_volume_size"], 25);
    assert_eq!(cluster["create_timeout"], 60);
    assert_eq!(cluster["node_count"], 1);
    assert!(cluster.get("faults").is_none());
    Ok(())
  }

  async fn test_list(srv: &TestServer) -> TestReturn {
    let mut resp = request(srv, Method::GET, "/v1/clusters", "1.2").send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.json::<Value>().await?;
    let clusters = body["clusters"].as_array().unwrap();
    assert_eq!(clusters.len(), 3);
    assert!(clusters[0].get("api_address").is_none());
    assert!(clusters[0].get("node_count").is_some());

    let mut resp = request(srv, Method::GET, "/v1/clusters/detail?limit=2", "1.2")
      .send()
      .await?;
    let body = resp.json::<Value>().await?;
    assert_eq!(body["clusters"].as_array().unwrap().len(), 2);
    assert!(body["next"].as_str().unwrap().contains("/v1/clusters?marker="));

    let resp = request(srv, Method::GET, "/v1/clusters/example/detail", "1.2")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
  }

  async fn test_patch(srv: &TestServer, conductor: &RecordingConductor) -> TestReturn {
    let resp = request(srv, Method::PATCH, "/v1/clusters/example?rollback=True", "1.3")
      .send_json(&json!([{ "op": "replace", "path": "/node_count", "value": 3 }]))
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    match conductor.last() {
      Some(ConductorMessage::ClusterUpdate { node_count, delta, rollback, .. }) => {
        assert_eq!(node_count, 3);
        assert_eq!(delta, vec![String::from("node_count")]);
        assert!(rollback);
      }
      other => panic!("unexpected message {:?}", other),
    }

    let resp = request(srv, Method::PATCH, "/v1/clusters/example?rollback=True", "1.2")
      .send_json(&json!([{ "op": "replace", "path": "/node_count", "value": 4 }]))
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert!(matches!(
      conductor.last(),
      Some(ConductorMessage::ClusterUpdate { node_count: 4, rollback: false, .. })
    ));

    let resp = request(srv, Method::PATCH, "/v1/clusters/example", "1.3")
      .send_json(&json!([{ "op": "replace", "path": "/name", "value": "renamed" }]))
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(srv, Method::PATCH, "/v1/clusters/example", "1.3")
      .send_json(&json!([{ "op": "replace", "path": "/stack_id", "value": "s" }]))
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(srv, Method::PATCH, "/v1/clusters/example", "1.3")
      .send_json(&json!([{ "op": "remove", "path": "/node_count" }]))
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(srv, Method::PATCH, "/v1/clusters/example", "1.9")
      .send_json(&json!([{ "op": "replace", "path": "/node_count", "value": 0 }]))
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
  }

  async fn test_health_report(srv: &TestServer) -> TestReturn {
    let resp = request(srv, Method::PATCH, "/v1/clusters/example", "1.3")
      .send_json(&json!([
        { "op": "replace", "path": "/health_status", "value": "HEALTHY" },
        { "op": "replace", "path": "/health_status_reason", "value": "{'api': 'ok'}" },
      ]))
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let mut resp = request(srv, Method::GET, "/v1/clusters/example", "1.3")
      .send()
      .await?;
    let cluster = resp.json::<Value>().await?;
    assert_eq!(cluster["health_status"], "HEALTHY");
    assert_eq!(cluster["health_status_reason"], json!({ "api": "ok" }));
    Ok(())
  }

  async fn test_delete(srv: &TestServer, conductor: &RecordingConductor) -> TestReturn {
    let resp = request(srv, Method::DELETE, "/v1/clusters/merged", "1.2")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(matches!(
      conductor.last(),
      Some(ConductorMessage::ClusterDelete { .. })
    ));
    let resp = request(srv, Method::DELETE, "/v1/clusters/unknown", "1.2")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
  }

  async fn test_template_in_use(srv: &TestServer) -> TestReturn {
    let resp = request(srv, Method::DELETE, "/v1/clustertemplates/example", "1.2")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = request(srv, Method::PATCH, "/v1/clustertemplates/example", "1.2")
      .send_json(&json!([{ "op": "replace", "path": "/docker_volume_size", "value": 3 }]))
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = request(srv, Method::PATCH, "/v1/clustertemplates/example", "1.2")
      .send_json(&json!([{ "op": "replace", "path": "/name", "value": "renamed" }]))
      .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = request(srv, Method::PATCH, "/v1/clustertemplates/renamed", "1.2")
      .send_json(&json!([{ "op": "replace", "path": "/name", "value": "example" }]))
      .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
  }

  #[ntex::test]
  async fn main() -> TestReturn {
    let (state, conductor) = generate_state(&[]);
    let srv = generate_server_with(crate::controllers::ntex_config, state).await;
    test_create_versions(&srv, &conductor).await?;
    test_create_errors(&srv).await?;
    test_inherited_defaults(&srv).await?;
    test_list(&srv).await?;
    test_patch(&srv, &conductor).await?;
    test_health_report(&srv).await?;
    test_template_in_use(&srv).await?;
    test_delete(&srv, &conductor).await?;
    Ok(())
  }

  #[ntex::test]
  async fn quota_exceeded() -> TestReturn {
    let (state, _) = generate_state(&[]);
    repositories::quota::create(PROJECT_ID, QuotaResource::Cluster, 1, &state.store).await?;
    let srv = generate_server_with(crate::controllers::ntex_config, state).await;
    seed(&srv).await?;
    let mut body = Cluster::sample();
    body["name"] = json!("second");
    let resp = request(&srv, Method::POST, "/v1/clusters", "1.2")
      .send_json(&body)
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
  }

  #[ntex::test]
  async fn faults_of_failed_clusters() -> TestReturn {
    let (mut state, _) = generate_state(&[]);
    let mut inventory: Inventory = inventory();
    inventory.stack_resources = vec![
      StackResource {
        stack_id: String::from("s1"),
        resource_name: String::from("kube_masters"),
        resource_status: String::from("CREATE_FAILED"),
        resource_status_reason: String::from("quota exceeded"),
      },
      StackResource {
        stack_id: String::from("s1"),
        resource_name: String::from("network"),
        resource_status: String::from("CREATE_COMPLETE"),
        resource_status_reason: String::new(),
      },
    ];
    let clients: Arc<dyn OpenStackClients> = Arc::new(inventory);
    state.clients = clients;
    let store = state.store.clone();
    let srv = generate_server_with(crate::controllers::ntex_config, state).await;
    let uuid = seed(&srv).await?;
    let mut item = repositories::cluster::find_by_uuid(&uuid, &store).await?;
    item.status = Some(Status::CreateFailed);
    item.stack_id = Some(String::from("s1"));
    repositories::cluster::update(item, &store).await?;
    let mut resp = request(&srv, Method::GET, &format!("/v1/clusters/{}", uuid), "1.2")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let cluster = resp.json::<Value>().await?;
    assert_eq!(cluster["faults"], json!({ "kube_masters": "quota exceeded" }));
    Ok(())
  }

  #[ntex::test]
  async fn admin_lists_every_project() -> TestReturn {
    let srv = generate_server(crate::controllers::ntex_config).await;
    seed(&srv).await?;
    let mut resp = admin_request(&srv, Method::GET, "/v1/clusters", "1.2")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.json::<Value>().await?;
    assert_eq!(body["clusters"].as_array().unwrap().len(), 1);
    let resp = srv
      .request(Method::GET, srv.url("/v1/clusters/example"))
      .header("X-Project-Id", "p2")
      .header("X-User-Id", "u2")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
  }
}
