//! File to handle nodegroup routes
//!
//! Nodegroups are nested under their cluster, the default master and
//! worker groups are created with the cluster and live as long as it.
use chrono::Utc;
use ntex::util::Bytes;
use ntex::web;
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::errors::{HttpResponseError, MagnumError};
use crate::models::{
  flatten, ApiResource, ClusterItem, Collection, JsonPatch, NodeGroup,
  NodeGroupItem, Status, MASTER_ROLE, NODEGROUP_PATCH_RULES,
  NODEGROUP_SUMMARY, WORKER_ROLE,
};
use crate::repositories;
use crate::services::conductor::ConductorMessage;
use crate::services::validation;
use crate::state::ApiState;
use crate::utils::patch::{merge_into_item, patch_resource};
use crate::version::{Version, VersionError};

use super::base::{
  accepted, detail_not_found, dispatch, handler, no_content, ok, ApiCall,
  Handler, Versioned, VersionedMethods,
};
use super::cluster::{check_node_count, cluster_target};

pub const NODEGROUP_VER: Version = Version::new(1, 9);

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct NodeGroupQuery {
  pub(crate) role: Option<String>,
}

async fn find_parent(call: &ApiCall) -> Result<ClusterItem, MagnumError> {
  let ident = call.param("cluster_id")?;
  repositories::cluster::find_by_ident(&ident, &call.scope(), call.store()).await
}

async fn find_nodegroup(
  call: &ApiCall,
  cluster: &ClusterItem,
) -> Result<NodeGroupItem, MagnumError> {
  let ident = call.param("nodegroup_id")?;
  repositories::nodegroup::find_by_ident(&cluster.uuid, &ident, call.store()).await
}

async fn list(
  mut call: ApiCall,
  action: &str,
  summary: bool,
) -> Result<web::HttpResponse, MagnumError> {
  call.enforce_all_projects("nodegroup:get_all_all_projects")?;
  let cluster = find_parent(&call).await?;
  call.enforce(&format!("nodegroup:{}", action), Some(cluster_target(&cluster)))?;
  let query = call.query::<NodeGroupQuery>()?;
  let pagination = call.pagination()?;
  let items = repositories::nodegroup::list(
    &cluster.uuid,
    query.role.as_deref(),
    &pagination,
    call.store(),
  )
  .await?;
  let marker = items.last().map(|item| item.uuid.clone());
  let mut nodegroups = Vec::with_capacity(items.len());
  for item in &items {
    let mut nodegroup = NodeGroup::convert(item, &cluster.uuid, &call.host_url)?;
    if summary {
      nodegroup.unset_fields_except(NODEGROUP_SUMMARY)?;
    }
    nodegroups.push(nodegroup);
  }
  let resource_url = format!("clusters/{}/nodegroups", cluster.uuid);
  let extra = query
    .role
    .map(|role| vec![("role", role)])
    .unwrap_or_default();
  let collection = Collection::new("nodegroups", nodegroups).with_next(
    &call.host_url,
    &resource_url,
    &pagination,
    marker,
    &extra,
  );
  ok(&collection)
}

async fn get_all(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  list(call, "get_all", true).await
}

async fn detail(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  list(call, "get_all", false).await
}

async fn get_one(mut call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  call.enforce_all_projects("nodegroup:get_one_all_projects")?;
  let cluster = find_parent(&call).await?;
  call.enforce("nodegroup:get", Some(cluster_target(&cluster)))?;
  let item = find_nodegroup(&call, &cluster).await?;
  ok(&NodeGroup::convert(&item, &cluster.uuid, &call.host_url)?)
}

/// Row of a new nodegroup, unset attributes are taken from the cluster
async fn new_item(
  call: &ApiCall,
  cluster: &ClusterItem,
  nodegroup: &NodeGroup,
) -> Result<NodeGroupItem, MagnumError> {
  let name = nodegroup
    .name
    .clone()
    .ok_or_else(|| MagnumError::invalid("Mandatory field missing: name"))?;
  let image_id = match flatten(&nodegroup.image_id) {
    Some(image_id) => image_id.clone(),
    None => {
      repositories::cluster_template::find_by_uuid(
        &cluster.cluster_template_id,
        call.store(),
      )
      .await?
      .image_id
    }
  };
  let labels = match (&nodegroup.labels, nodegroup.merge_labels) {
    (None, _) => cluster.labels.clone(),
    (Some(own), Some(true)) => {
      let mut merged = cluster.labels.clone();
      merged.extend(own.clone());
      merged
    }
    (Some(own), _) => own.clone(),
  };
  Ok(NodeGroupItem {
    id: 0,
    uuid: Uuid::new_v4().to_string(),
    name,
    cluster_id: cluster.uuid.clone(),
    project_id: cluster.project_id.clone(),
    flavor_id: flatten(&nodegroup.flavor_id)
      .cloned()
      .or_else(|| cluster.flavor_id.clone()),
    image_id: Some(image_id),
    docker_volume_size: flatten(&nodegroup.docker_volume_size)
      .copied()
      .or(cluster.docker_volume_size),
    labels,
    node_addresses: Vec::new(),
    node_count: nodegroup.node_count.unwrap_or(1),
    role: nodegroup
      .role
      .clone()
      .unwrap_or_else(|| String::from(WORKER_ROLE)),
    min_node_count: nodegroup.min_node_count.unwrap_or(0),
    max_node_count: flatten(&nodegroup.max_node_count).copied(),
    is_default: false,
    stack_id: None,
    status: Some(Status::CreateInProgress),
    status_reason: None,
    version: None,
    created_at: Utc::now(),
    updated_at: None,
  })
}

async fn post(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let nodegroup = NodeGroup::from_dict(&call.dict()?)?;
  let cluster = find_parent(&call).await?;
  call.enforce("nodegroup:create", Some(cluster_target(&cluster)))?;
  if nodegroup.role.as_deref() == Some(MASTER_ROLE) {
    return Err(MagnumError::invalid(
      "Creating master nodegroups is currently not supported.",
    ));
  }
  check_node_count(&call, nodegroup.node_count.unwrap_or(1))?;
  nodegroup.validate_counts()?;
  let item = new_item(&call, &cluster, &nodegroup).await?;
  let item = repositories::nodegroup::create(item, call.store()).await?;
  call
    .cast(ConductorMessage::NodeGroupCreate {
      cluster_uuid: cluster.uuid.clone(),
      nodegroup_uuid: item.uuid.clone(),
    })
    .await?;
  log::info!(
    "[{}] nodegroup {} created in cluster {}",
    call.ctx.request_id,
    item.uuid,
    cluster.uuid
  );
  accepted(&NodeGroup::convert(&item, &cluster.uuid, &call.host_url)?)
}

async fn patch(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let patch = call.json::<Vec<JsonPatch>>()?;
  let cluster = find_parent(&call).await?;
  call.enforce("nodegroup:update", Some(cluster_target(&cluster)))?;
  let item = find_nodegroup(&call, &cluster).await?;
  let nodegroup = NodeGroup::convert(&item, &cluster.uuid, &call.host_url)?;
  let patched = patch_resource(&nodegroup, &patch, &NODEGROUP_PATCH_RULES)?;
  validation::validate_nodegroup_properties(&patched.delta)?;
  let nodegroup = patched.resource;
  nodegroup.validate_counts()?;
  if patched.delta.contains("node_count") {
    check_node_count(&call, nodegroup.node_count.unwrap_or(1))?;
  }
  if patched.delta.is_empty() {
    return accepted(&NodeGroup::convert(&item, &cluster.uuid, &call.host_url)?);
  }
  let mut item = merge_into_item(&item, &nodegroup)?;
  item.status = Some(Status::UpdateInProgress);
  let item = repositories::nodegroup::update(item, call.store()).await?;
  call
    .cast(ConductorMessage::NodeGroupUpdate {
      cluster_uuid: cluster.uuid.clone(),
      nodegroup_uuid: item.uuid.clone(),
    })
    .await?;
  accepted(&NodeGroup::convert(&item, &cluster.uuid, &call.host_url)?)
}

async fn delete(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let cluster = find_parent(&call).await?;
  call.enforce("nodegroup:delete", Some(cluster_target(&cluster)))?;
  let item = find_nodegroup(&call, &cluster).await?;
  if item.is_default {
    return Err(MagnumError::invalid(format!(
      "Deleting a default nodegroup is not supported: {}.",
      item.name
    )));
  }
  call
    .cast(ConductorMessage::NodeGroupDelete {
      cluster_uuid: cluster.uuid,
      nodegroup_uuid: item.uuid,
    })
    .await?;
  no_content()
}

fn nodegroup_method(name: &'static str, handler: Handler) -> Versioned {
  Versioned::new(name, handler).min(NODEGROUP_VER)
}

pub fn methods() -> Result<VersionedMethods, VersionError> {
  VersionedMethods::new("NodeGroupController")
    .add(nodegroup_method("get_all", handler!(get_all)))?
    .add(nodegroup_method("detail", handler!(detail)))?
    .add(nodegroup_method("get_one", handler!(get_one)))?
    .add(nodegroup_method("post", handler!(post)))?
    .add(nodegroup_method("patch", handler!(patch)))?
    .add(nodegroup_method("delete", handler!(delete)))
}

#[web::get("/v1/clusters/{cluster_id}/nodegroups")]
async fn list_nodegroups(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.nodegroup;
  dispatch(&req, &state, methods, "get_all", &["cluster_id"], Bytes::new()).await
}

#[web::get("/v1/clusters/{cluster_id}/nodegroups/detail")]
async fn detail_nodegroups(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.nodegroup;
  dispatch(&req, &state, methods, "detail", &["cluster_id"], Bytes::new()).await
}

#[web::get("/v1/clusters/{cluster_id}/nodegroups/{nodegroup_id}/detail")]
async fn detail_nodegroup() -> Result<web::HttpResponse, HttpResponseError> {
  detail_not_found()
}

#[web::get("/v1/clusters/{cluster_id}/nodegroups/{nodegroup_id}")]
async fn inspect_nodegroup(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.nodegroup;
  let params = &["cluster_id", "nodegroup_id"];
  dispatch(&req, &state, methods, "get_one", params, Bytes::new()).await
}

#[web::post("/v1/clusters/{cluster_id}/nodegroups")]
async fn create_nodegroup(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.nodegroup;
  dispatch(&req, &state, methods, "post", &["cluster_id"], body).await
}

#[web::patch("/v1/clusters/{cluster_id}/nodegroups/{nodegroup_id}")]
async fn patch_nodegroup(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.nodegroup;
  let params = &["cluster_id", "nodegroup_id"];
  dispatch(&req, &state, methods, "patch", params, body).await
}

#[web::delete("/v1/clusters/{cluster_id}/nodegroups/{nodegroup_id}")]
async fn delete_nodegroup(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.nodegroup;
  let params = &["cluster_id", "nodegroup_id"];
  dispatch(&req, &state, methods, "delete", params, Bytes::new()).await
}

pub fn ntex_config(config: &mut web::ServiceConfig) {
  config.service(list_nodegroups);
  config.service(detail_nodegroups);
  config.service(detail_nodegroup);
  config.service(inspect_nodegroup);
  config.service(create_nodegroup);
  config.service(patch_nodegroup);
  config.service(delete_nodegroup);
}
