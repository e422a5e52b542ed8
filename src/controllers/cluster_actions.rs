//! File to handle cluster action routes
//!
//! Resize changes the node count of a worker nodegroup, upgrade moves a
//! cluster or one of its nodegroups to another template.
use ntex::util::Bytes;
use ntex::web;

use crate::errors::{HttpResponseError, MagnumError};
use crate::models::{
  ClusterId, ClusterItem, ClusterResizeRequest, ClusterUpgradeRequest,
  NodeGroupItem, WORKER_ROLE,
};
use crate::repositories;
use crate::services::conductor::ConductorMessage;
use crate::state::ApiState;
use crate::version::{Version, VersionError};

use super::base::{accepted, dispatch, handler, ApiCall, Versioned, VersionedMethods};
use super::cluster::{check_node_count, cluster_target, find_cluster, rollback};

pub const RESIZE_VER: Version = Version::new(1, 7);
pub const UPGRADE_VER: Version = Version::new(1, 8);

/// Named nodegroup of the cluster, the default worker one when `None`
async fn target_nodegroup(
  call: &ApiCall,
  cluster: &ClusterItem,
  ident: Option<&str>,
) -> Result<NodeGroupItem, MagnumError> {
  match ident {
    Some(ident) => {
      repositories::nodegroup::find_by_ident(&cluster.uuid, ident, call.store())
        .await
    }
    None => {
      repositories::nodegroup::find_default(&cluster.uuid, WORKER_ROLE, call.store())
        .await
    }
  }
}

fn check_resize_bounds(
  nodegroup: &NodeGroupItem,
  node_count: i64,
) -> Result<(), MagnumError> {
  if nodegroup.is_master() {
    return Err(MagnumError::invalid(format!(
      "Resizing a nodegroup with role master is not supported: {}.",
      nodegroup.name
    )));
  }
  let above_max = nodegroup.max_node_count.map_or(false, |max| node_count > max);
  if node_count < nodegroup.min_node_count || above_max {
    let max = nodegroup
      .max_node_count
      .map(|max| max.to_string())
      .unwrap_or_else(|| String::from("unlimited"));
    return Err(MagnumError::invalid(format!(
      "To resize nodegroup {} node_count must be between {} and {}, got {}.",
      nodegroup.name, nodegroup.min_node_count, max, node_count
    )));
  }
  Ok(())
}

async fn resize(mut call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let request = call.json::<ClusterResizeRequest>()?;
  call.enforce_all_projects("cluster:resize_all_projects")?;
  let cluster = find_cluster(&call).await?;
  call.enforce("cluster:resize", Some(cluster_target(&cluster)))?;
  check_node_count(&call, request.node_count)?;
  let nodegroup =
    target_nodegroup(&call, &cluster, request.nodegroup.as_deref()).await?;
  check_resize_bounds(&nodegroup, request.node_count)?;
  call
    .cast(ConductorMessage::ClusterResize {
      cluster_uuid: cluster.uuid.clone(),
      node_count: request.node_count,
      nodes_to_remove: request.nodes_to_remove,
      nodegroup_uuid: nodegroup.uuid,
    })
    .await?;
  accepted(&ClusterId { uuid: cluster.uuid })
}

async fn upgrade(mut call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let request = call.json::<ClusterUpgradeRequest>()?;
  let rollback = rollback(&call)?;
  call.enforce_all_projects("cluster:upgrade_all_projects")?;
  let cluster = find_cluster(&call).await?;
  call.enforce("cluster:upgrade", Some(cluster_target(&cluster)))?;
  if request.max_batch_size < 1 {
    return Err(MagnumError::invalid(format!(
      "max_batch_size must be at least 1, got {}.",
      request.max_batch_size
    )));
  }
  let template = repositories::cluster_template::find_by_ident(
    &request.cluster_template,
    &call.scope(),
    call.store(),
  )
  .await
  .map_err(MagnumError::into_client_error)?;
  let nodegroup =
    target_nodegroup(&call, &cluster, request.nodegroup.as_deref()).await?;
  if !nodegroup.is_default && template.uuid != cluster.cluster_template_id {
    return Err(MagnumError::invalid(format!(
      "Nodegroup {} can only be upgraded to the cluster template of its \
       cluster, upgrade the cluster first.",
      nodegroup.name
    )));
  }
  call
    .cast(ConductorMessage::ClusterUpgrade {
      cluster_uuid: cluster.uuid.clone(),
      cluster_template_uuid: template.uuid,
      max_batch_size: request.max_batch_size,
      nodegroup_uuid: nodegroup.uuid,
      rollback,
    })
    .await?;
  accepted(&ClusterId { uuid: cluster.uuid })
}

pub fn methods() -> Result<VersionedMethods, VersionError> {
  VersionedMethods::new("ActionsController")
    .add(Versioned::new("resize", handler!(resize)).min(RESIZE_VER))?
    .add(Versioned::new("upgrade", handler!(upgrade)).min(UPGRADE_VER))
}

/// Resize a nodegroup of a cluster
#[web::post("/v1/clusters/{ident}/actions/resize")]
async fn resize_cluster(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster_actions;
  dispatch(&req, &state, methods, "resize", &["ident"], body).await
}

/// Upgrade a cluster to another template
#[web::post("/v1/clusters/{ident}/actions/upgrade")]
async fn upgrade_cluster(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster_actions;
  dispatch(&req, &state, methods, "upgrade", &["ident"], body).await
}

#[web::post("/v1/clusters/{ident}/resize")]
async fn resize_cluster_short(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster_actions;
  dispatch(&req, &state, methods, "resize", &["ident"], body).await
}

#[web::post("/v1/clusters/{ident}/upgrade")]
async fn upgrade_cluster_short(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster_actions;
  dispatch(&req, &state, methods, "upgrade", &["ident"], body).await
}

pub fn ntex_config(config: &mut web::ServiceConfig) {
  config.service(resize_cluster);
  config.service(upgrade_cluster);
  config.service(resize_cluster_short);
  config.service(upgrade_cluster_short);
}

#[cfg(test)]
mod test_cluster_actions {
  use ntex::http::{Method, StatusCode};
  use serde_json::{json, Value};

  use crate::controllers::cluster::test_cluster::seed;
  use crate::models::ClusterTemplate;
  use crate::utils::tests::*;

  use super::*;

  async fn test_resize(srv: &TestServer, conductor: &RecordingConductor) -> TestReturn {
    let path = "/v1/clusters/example/actions/resize";
    let resp = request(srv, Method::POST, path, "1.6")
      .send_json(&json!({ "node_count": 3 }))
      .await?;
    assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);

    let mut resp = request(srv, Method::POST, path, "1.7")
      .send_json(&json!({ "node_count": 3, "nodes_to_remove": ["n1"] }))
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body = resp.json::<Value>().await?;
    match conductor.last() {
      Some(ConductorMessage::ClusterResize {
        cluster_uuid,
        node_count,
        nodes_to_remove,
        ..
      }) => {
        assert_eq!(body["uuid"], json!(cluster_uuid));
        assert_eq!(node_count, 3);
        assert_eq!(nodes_to_remove, vec![String::from("n1")]);
      }
      other => panic!("unexpected message {:?}", other),
    }

    let resp = request(srv, Method::POST, path, "1.7")
      .send_json(&json!({ "node_count": 2, "nodegroup": "default-master" }))
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(srv, Method::POST, path, "1.7")
      .send_json(&json!({ "node_count": 0 }))
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(srv, Method::POST, path, "1.10")
      .send_json(&json!({ "node_count": 0 }))
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let resp = request(srv, Method::POST, path, "1.7")
      .send_json(&json!({ "node_count": 2, "nodegroup": "unknown" }))
      .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = request(srv, Method::POST, "/v1/clusters/example/resize", "1.7")
      .send_json(&json!({ "node_count": 4 }))
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert!(matches!(
      conductor.last(),
      Some(ConductorMessage::ClusterResize { node_count: 4, .. })
    ));
    Ok(())
  }

  async fn test_upgrade(srv: &TestServer, conductor: &RecordingConductor) -> TestReturn {
    let mut template = ClusterTemplate::sample();
    template["name"] = json!("next");
    let resp = request(srv, Method::POST, "/v1/clustertemplates", "1.8")
      .send_json(&template)
      .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let path = "/v1/clusters/example/actions/upgrade";
    let resp = request(srv, Method::POST, path, "1.7")
      .send_json(&json!({ "cluster_template": "next" }))
      .await?;
    assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);

    let resp = request(srv, Method::POST, &format!("{}?rollback=yes", path), "1.8")
      .send_json(&json!({ "cluster_template": "next", "max_batch_size": 2 }))
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert!(matches!(
      conductor.last(),
      Some(ConductorMessage::ClusterUpgrade { max_batch_size: 2, rollback: true, .. })
    ));

    let resp = request(srv, Method::POST, path, "1.8")
      .send_json(&json!({ "cluster_template": "missing" }))
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(srv, Method::POST, path, "1.8")
      .send_json(&json!({ "cluster_template": "next", "max_batch_size": 0 }))
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
  }

  #[ntex::test]
  async fn main() -> TestReturn {
    let (state, conductor) = generate_state(&[]);
    let srv = generate_server_with(crate::controllers::ntex_config, state).await;
    seed(&srv).await?;
    test_resize(&srv, &conductor).await?;
    test_upgrade(&srv, &conductor).await?;
    Ok(())
  }

  #[ntex::test]
  async fn admin_acts_on_other_projects() -> TestReturn {
    let (state, conductor) = generate_state(&[]);
    let srv = generate_server_with(crate::controllers::ntex_config, state).await;
    let uuid = seed(&srv).await?;
    let path = format!("/v1/clusters/{}/actions/resize", uuid);
    let resp = admin_request(&srv, Method::POST, &path, "1.7")
      .send_json(&json!({ "node_count": 3 }))
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert!(matches!(
      conductor.last(),
      Some(ConductorMessage::ClusterResize { node_count: 3, .. })
    ));

    let path = format!("/v1/clusters/{}/actions/upgrade", uuid);
    let resp = admin_request(&srv, Method::POST, &path, "1.8")
      .send_json(&json!({ "cluster_template": "example" }))
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let (state, _) = generate_state(&[("cluster:resize_all_projects", "!")]);
    let srv = generate_server_with(crate::controllers::ntex_config, state).await;
    let uuid = seed(&srv).await?;
    let path = format!("/v1/clusters/{}/actions/resize", uuid);
    let resp = admin_request(&srv, Method::POST, &path, "1.7")
      .send_json(&json!({ "node_count": 3 }))
      .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    Ok(())
  }

  #[test]
  fn bounds_of_a_nodegroup() {
    let mut nodegroup = NodeGroupItem::sample("c1");
    nodegroup.min_node_count = 1;
    nodegroup.max_node_count = Some(3);
    assert!(check_resize_bounds(&nodegroup, 2).is_ok());
    assert!(check_resize_bounds(&nodegroup, 0).is_err());
    assert!(check_resize_bounds(&nodegroup, 4).is_err());
    nodegroup.max_node_count = None;
    assert!(check_resize_bounds(&nodegroup, 40).is_ok());
  }
}
