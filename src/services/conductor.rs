//! Message contract with the conductor
//!
//! Casts are fire and forget, calls wait for the conductor reply.
use async_trait::async_trait;
use futures::channel::{mpsc, oneshot};

use crate::context::RequestContext;
use crate::errors::MagnumError;

/// Work requested from the conductor
#[derive(Debug, Clone, PartialEq)]
pub enum ConductorMessage {
  ClusterCreate {
    cluster_uuid: String,
    create_timeout: i64,
  },
  /// `node_count` is the post patch count, `delta` is informational
  ClusterUpdate {
    cluster_uuid: String,
    node_count: i64,
    delta: Vec<String>,
    rollback: bool,
  },
  ClusterDelete {
    cluster_uuid: String,
  },
  ClusterResize {
    cluster_uuid: String,
    node_count: i64,
    nodes_to_remove: Vec<String>,
    nodegroup_uuid: String,
  },
  ClusterUpgrade {
    cluster_uuid: String,
    cluster_template_uuid: String,
    max_batch_size: i64,
    nodegroup_uuid: String,
    rollback: bool,
  },
  NodeGroupCreate {
    cluster_uuid: String,
    nodegroup_uuid: String,
  },
  NodeGroupUpdate {
    cluster_uuid: String,
    nodegroup_uuid: String,
  },
  NodeGroupDelete {
    cluster_uuid: String,
    nodegroup_uuid: String,
  },
  FederationCreate {
    federation_uuid: String,
    create_timeout: i64,
  },
  FederationUpdate {
    federation_uuid: String,
    rollback: bool,
  },
  FederationDelete {
    federation_uuid: String,
  },
  GetCaCertificate {
    cluster_uuid: String,
    ca_cert_type: Option<String>,
  },
  SignCertificate {
    cluster_uuid: String,
    csr: String,
    ca_cert_type: Option<String>,
  },
  RotateCaCertificate {
    cluster_uuid: String,
  },
  CredentialRotate {
    cluster_uuid: String,
  },
}

impl ConductorMessage {
  /// Name of the conductor method, used in logs
  pub fn method(&self) -> &'static str {
    match self {
      ConductorMessage::ClusterCreate { .. } => "cluster_create",
      ConductorMessage::ClusterUpdate { .. } => "cluster_update",
      ConductorMessage::ClusterDelete { .. } => "cluster_delete",
      ConductorMessage::ClusterResize { .. } => "cluster_resize",
      ConductorMessage::ClusterUpgrade { .. } => "cluster_upgrade",
      ConductorMessage::NodeGroupCreate { .. } => "nodegroup_create",
      ConductorMessage::NodeGroupUpdate { .. } => "nodegroup_update",
      ConductorMessage::NodeGroupDelete { .. } => "nodegroup_delete",
      ConductorMessage::FederationCreate { .. } => "federation_create",
      ConductorMessage::FederationUpdate { .. } => "federation_update",
      ConductorMessage::FederationDelete { .. } => "federation_delete",
      ConductorMessage::GetCaCertificate { .. } => "get_ca_certificate",
      ConductorMessage::SignCertificate { .. } => "sign_certificate",
      ConductorMessage::RotateCaCertificate { .. } => "rotate_ca_certificate",
      ConductorMessage::CredentialRotate { .. } => "credential_rotate",
    }
  }
}

/// Reply of a conductor call
#[derive(Debug, Clone, PartialEq)]
pub enum ConductorReply {
  Done,
  /// Pem encoded certificate
  Certificate(String),
}

/// Event consumed by the conductor loop
#[derive(Debug)]
pub enum ConductorEvent {
  Cast(RequestContext, ConductorMessage),
  Call(
    RequestContext,
    ConductorMessage,
    oneshot::Sender<Result<ConductorReply, MagnumError>>,
  ),
}

#[async_trait(?Send)]
pub trait ConductorApi: Send + Sync {
  /// Send `message` without waiting for its outcome
  async fn cast(
    &self,
    ctx: &RequestContext,
    message: ConductorMessage,
  ) -> Result<(), MagnumError>;

  /// Send `message` and wait for the reply
  async fn call(
    &self,
    ctx: &RequestContext,
    message: ConductorMessage,
  ) -> Result<ConductorReply, MagnumError>;
}

/// Client side of the conductor channel
#[derive(Debug, Clone)]
pub struct ConductorClient {
  sender: mpsc::UnboundedSender<ConductorEvent>,
}

impl ConductorClient {
  pub fn new(sender: mpsc::UnboundedSender<ConductorEvent>) -> Self {
    ConductorClient { sender }
  }
}

#[async_trait(?Send)]
impl ConductorApi for ConductorClient {
  async fn cast(
    &self,
    ctx: &RequestContext,
    message: ConductorMessage,
  ) -> Result<(), MagnumError> {
    log::info!("[{}] cast {}", ctx.request_id, message.method());
    log::debug!("[{}] {:?}", ctx.request_id, message);
    self
      .sender
      .unbounded_send(ConductorEvent::Cast(ctx.clone(), message))
      .map_err(|err| {
        MagnumError::internal(format!("conductor unreachable: {}", err))
      })
  }

  async fn call(
    &self,
    ctx: &RequestContext,
    message: ConductorMessage,
  ) -> Result<ConductorReply, MagnumError> {
    log::info!("[{}] call {}", ctx.request_id, message.method());
    let (tx, rx) = oneshot::channel();
    self
      .sender
      .unbounded_send(ConductorEvent::Call(ctx.clone(), message, tx))
      .map_err(|err| {
        MagnumError::internal(format!("conductor unreachable: {}", err))
      })?;
    rx.await.map_err(|_| {
      MagnumError::internal("conductor dropped the reply channel")
    })?
  }
}

#[cfg(test)]
mod test_conductor {
  use futures::StreamExt;

  use super::*;

  #[ntex::test]
  async fn cast_and_call_go_through_the_channel() {
    let (tx, mut rx) = mpsc::unbounded();
    let client = ConductorClient::new(tx);
    let ctx = RequestContext::default();
    let message = ConductorMessage::ClusterDelete {
      cluster_uuid: String::from("c1"),
    };
    client.cast(&ctx, message.clone()).await.unwrap();
    match rx.next().await {
      Some(ConductorEvent::Cast(_, received)) => assert_eq!(received, message),
      other => panic!("unexpected event {:?}", other),
    }

    let responder = async move {
      if let Some(ConductorEvent::Call(_, _, reply)) = rx.next().await {
        let _ = reply.send(Ok(ConductorReply::Certificate(String::from("pem"))));
      }
    };
    let message = ConductorMessage::GetCaCertificate {
      cluster_uuid: String::from("c1"),
      ca_cert_type: None,
    };
    let (reply, _) = futures::join!(client.call(&ctx, message), responder);
    assert_eq!(reply, Ok(ConductorReply::Certificate(String::from("pem"))));
  }

  #[ntex::test]
  async fn closed_channel_is_internal_error() {
    let (tx, rx) = mpsc::unbounded();
    drop(rx);
    let client = ConductorClient::new(tx);
    let err = client
      .cast(
        &RequestContext::default(),
        ConductorMessage::FederationDelete {
          federation_uuid: String::from("f1"),
        },
      )
      .await
      .unwrap_err();
    assert_eq!(err.status(), 500);
  }
}
