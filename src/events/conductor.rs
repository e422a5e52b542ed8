//! In-process conductor loop
//!
//! Consumes the conductor messages on its own arbiter and applies their
//! bookkeeping effects to the store.
use futures::StreamExt;
use futures::channel::mpsc;
use ntex::rt;
use uuid::Uuid;

use crate::errors::MagnumError;
use crate::models::{Status, WORKER_ROLE};
use crate::repositories::{self, Store};
use crate::services::conductor::{
  ConductorClient, ConductorEvent, ConductorMessage, ConductorReply,
};

async fn set_cluster_status(
  cluster_uuid: &str,
  status: Status,
  store: &Store,
) -> Result<(), MagnumError> {
  let mut cluster =
    repositories::cluster::find_by_uuid(cluster_uuid, store).await?;
  cluster.status = Some(status);
  cluster.status_reason = None;
  repositories::cluster::update(cluster, store).await?;
  Ok(())
}

async fn set_nodegroup_count(
  cluster_uuid: &str,
  nodegroup_uuid: &str,
  node_count: i64,
  nodes_to_remove: &[String],
  store: &Store,
) -> Result<(), MagnumError> {
  let mut nodegroup =
    repositories::nodegroup::find_by_ident(cluster_uuid, nodegroup_uuid, store)
      .await?;
  nodegroup.node_count = node_count;
  nodegroup
    .node_addresses
    .retain(|address| !nodes_to_remove.contains(address));
  nodegroup.status = Some(Status::UpdateComplete);
  repositories::nodegroup::update(nodegroup, store).await?;
  Ok(())
}

/// Apply the effect of `message` on the store
async fn apply(message: &ConductorMessage, store: &Store) -> Result<(), MagnumError> {
  match message {
    ConductorMessage::ClusterCreate { cluster_uuid, .. } => {
      let mut cluster =
        repositories::cluster::find_by_uuid(cluster_uuid, store).await?;
      cluster.stack_id = Some(Uuid::new_v4().to_string());
      cluster.status = Some(Status::CreateComplete);
      repositories::cluster::update(cluster, store).await?;
      for mut nodegroup in
        repositories::nodegroup::list_by_cluster(cluster_uuid, store).await?
      {
        nodegroup.status = Some(Status::CreateComplete);
        repositories::nodegroup::update(nodegroup, store).await?;
      }
    }
    ConductorMessage::ClusterUpdate {
      cluster_uuid,
      node_count,
      ..
    } => {
      let worker =
        repositories::nodegroup::find_default(cluster_uuid, WORKER_ROLE, store)
          .await?;
      set_nodegroup_count(cluster_uuid, &worker.uuid, *node_count, &[], store)
        .await?;
      set_cluster_status(cluster_uuid, Status::UpdateComplete, store).await?;
    }
    ConductorMessage::ClusterDelete { cluster_uuid } => {
      repositories::cluster::delete_by_uuid(cluster_uuid, store).await?;
    }
    ConductorMessage::ClusterResize {
      cluster_uuid,
      node_count,
      nodes_to_remove,
      nodegroup_uuid,
    } => {
      set_nodegroup_count(
        cluster_uuid,
        nodegroup_uuid,
        *node_count,
        nodes_to_remove,
        store,
      )
      .await?;
      set_cluster_status(cluster_uuid, Status::UpdateComplete, store).await?;
    }
    ConductorMessage::ClusterUpgrade {
      cluster_uuid,
      cluster_template_uuid,
      nodegroup_uuid,
      ..
    } => {
      let template =
        repositories::cluster_template::find_by_uuid(cluster_template_uuid, store)
          .await?;
      let mut nodegroup = repositories::nodegroup::find_by_ident(
        cluster_uuid,
        nodegroup_uuid,
        store,
      )
      .await?;
      nodegroup.image_id = Some(template.image_id.clone());
      nodegroup.status = Some(Status::UpdateComplete);
      let upgrades_cluster = nodegroup.is_default;
      repositories::nodegroup::update(nodegroup, store).await?;
      let mut cluster =
        repositories::cluster::find_by_uuid(cluster_uuid, store).await?;
      if upgrades_cluster {
        cluster.cluster_template_id = template.uuid;
      }
      cluster.status = Some(Status::UpdateComplete);
      repositories::cluster::update(cluster, store).await?;
    }
    ConductorMessage::NodeGroupCreate {
      cluster_uuid,
      nodegroup_uuid,
    }
    | ConductorMessage::NodeGroupUpdate {
      cluster_uuid,
      nodegroup_uuid,
    } => {
      let status = match message {
        ConductorMessage::NodeGroupCreate { .. } => Status::CreateComplete,
        _ => Status::UpdateComplete,
      };
      let mut nodegroup = repositories::nodegroup::find_by_ident(
        cluster_uuid,
        nodegroup_uuid,
        store,
      )
      .await?;
      nodegroup.status = Some(status);
      repositories::nodegroup::update(nodegroup, store).await?;
    }
    ConductorMessage::NodeGroupDelete { nodegroup_uuid, .. } => {
      repositories::nodegroup::delete_by_uuid(nodegroup_uuid, store).await?;
    }
    ConductorMessage::FederationCreate { federation_uuid, .. }
    | ConductorMessage::FederationUpdate { federation_uuid, .. } => {
      let status = match message {
        ConductorMessage::FederationCreate { .. } => Status::CreateComplete,
        _ => Status::UpdateComplete,
      };
      let mut federation =
        repositories::federation::find_by_uuid(federation_uuid, store).await?;
      federation.status = Some(status);
      repositories::federation::update(federation, store).await?;
    }
    ConductorMessage::FederationDelete { federation_uuid } => {
      repositories::federation::delete_by_uuid(federation_uuid, store).await?;
    }
    ConductorMessage::RotateCaCertificate { cluster_uuid }
    | ConductorMessage::CredentialRotate { cluster_uuid } => {
      repositories::cluster::find_by_uuid(cluster_uuid, store).await?;
    }
    ConductorMessage::GetCaCertificate { .. }
    | ConductorMessage::SignCertificate { .. } => {
      return Err(MagnumError::NotSupported(format!(
        "{} is not supported by the in-process conductor",
        message.method()
      )));
    }
  }
  Ok(())
}

/// Start the conductor loop and return a client to talk to it
pub fn start(store: Store) -> ConductorClient {
  let (tx, mut rx) = mpsc::unbounded::<ConductorEvent>();
  rt::Arbiter::new().exec_fn(move || {
    rt::spawn(async move {
      while let Some(event) = rx.next().await {
        match event {
          ConductorEvent::Cast(ctx, message) => {
            log::debug!("[{}] conductor handles {}", ctx.request_id, message.method());
            if let Err(err) = apply(&message, &store).await {
              log::error!(
                "[{}] conductor {} failed: {}",
                ctx.request_id,
                message.method(),
                err
              );
            }
          }
          ConductorEvent::Call(ctx, message, reply) => {
            log::debug!("[{}] conductor answers {}", ctx.request_id, message.method());
            let res = apply(&message, &store)
              .await
              .map(|_| ConductorReply::Done);
            if reply.send(res).is_err() {
              log::warn!("[{}] caller of {} went away", ctx.request_id, message.method());
            }
          }
        }
      }
      log::error!("Conductor loop died");
      rt::Arbiter::current().stop();
    });
  });
  ConductorClient::new(tx)
}

#[cfg(test)]
mod test_conductor_loop {
  use crate::models::{NodeGroupItem, MASTER_ROLE};

  use super::*;

  async fn seed(store: &Store) -> (String, String) {
    let cluster_uuid = Uuid::new_v4().to_string();
    let item: crate::models::ClusterItem =
      serde_json::from_value(serde_json::json!({
        "id": 0,
        "uuid": cluster_uuid,
        "project_id": "p1",
        "user_id": "u1",
        "name": "c1",
        "cluster_template_id": "t1",
        "keypair": null,
        "docker_volume_size": null,
        "master_flavor_id": null,
        "flavor_id": null,
        "create_timeout": 60,
        "stack_id": null,
        "status": "CREATE_IN_PROGRESS",
        "status_reason": null,
        "health_status": null,
        "health_status_reason": null,
        "discovery_url": null,
        "api_address": null,
        "coe_version": null,
        "container_version": null,
        "master_lb_enabled": false,
        "floating_ip_enabled": true,
        "fixed_network": null,
        "fixed_subnet": null,
        "ca_cert_ref": null,
        "magnum_cert_ref": null,
        "etcd_ca_cert_ref": null,
        "front_proxy_ca_cert_ref": null,
        "trust_id": null,
        "trustee_username": null,
        "trustee_password": null,
        "trustee_user_id": null,
        "created_at": "2020-01-01T00:00:00Z",
        "updated_at": null,
      }))
      .unwrap();
    let mut master = NodeGroupItem::sample(&cluster_uuid);
    master.role = String::from(MASTER_ROLE);
    master.name = String::from("default-master");
    let worker = NodeGroupItem::sample(&cluster_uuid);
    let worker_uuid = worker.uuid.clone();
    repositories::cluster::create(item, vec![master, worker], store)
      .await
      .unwrap();
    (cluster_uuid, worker_uuid)
  }

  #[ntex::test]
  async fn bookkeeping_effects() {
    let store = Store::new();
    let (cluster_uuid, worker_uuid) = seed(&store).await;
    apply(
      &ConductorMessage::ClusterCreate {
        cluster_uuid: cluster_uuid.clone(),
        create_timeout: 60,
      },
      &store,
    )
    .await
    .unwrap();
    let cluster = repositories::cluster::find_by_uuid(&cluster_uuid, &store)
      .await
      .unwrap();
    assert_eq!(cluster.status, Some(Status::CreateComplete));
    assert!(cluster.stack_id.is_some());

    apply(
      &ConductorMessage::ClusterUpdate {
        cluster_uuid: cluster_uuid.clone(),
        node_count: 4,
        delta: vec![String::from("node_count")],
        rollback: false,
      },
      &store,
    )
    .await
    .unwrap();
    let worker =
      repositories::nodegroup::find_by_ident(&cluster_uuid, &worker_uuid, &store)
        .await
        .unwrap();
    assert_eq!(worker.node_count, 4);

    let sign = ConductorMessage::SignCertificate {
      cluster_uuid: cluster_uuid.clone(),
      csr: String::from("csr"),
      ca_cert_type: None,
    };
    assert_eq!(apply(&sign, &store).await.unwrap_err().status(), 400);

    apply(&ConductorMessage::ClusterDelete { cluster_uuid: cluster_uuid.clone() }, &store)
      .await
      .unwrap();
    assert!(repositories::cluster::find_by_uuid(&cluster_uuid, &store)
      .await
      .is_err());
  }
}
