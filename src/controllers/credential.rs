//! File to handle credential routes
use ntex::util::Bytes;
use ntex::web;

use crate::errors::{HttpResponseError, MagnumError};
use crate::models::ClusterId;
use crate::services::conductor::ConductorMessage;
use crate::state::ApiState;
use crate::version::{Version, VersionError};

use super::base::{accepted, dispatch, handler, ApiCall, Versioned, VersionedMethods};
use super::cluster::{cluster_target, find_cluster};

pub const CREDENTIAL_VER: Version = Version::new(1, 12);

/// Rotate the trustee credentials of a cluster
async fn rotate(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let cluster = find_cluster(&call).await?;
  call.enforce("credential:rotate", Some(cluster_target(&cluster)))?;
  call
    .call(ConductorMessage::CredentialRotate {
      cluster_uuid: cluster.uuid.clone(),
    })
    .await?;
  accepted(&ClusterId { uuid: cluster.uuid })
}

pub fn methods() -> Result<VersionedMethods, VersionError> {
  VersionedMethods::new("CredentialsController")
    .add(Versioned::new("rotate", handler!(rotate)).min(CREDENTIAL_VER))
}

#[web::patch("/v1/credentials/{ident}")]
async fn rotate_credentials(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.credential;
  dispatch(&req, &state, methods, "rotate", &["ident"], body).await
}

pub fn ntex_config(config: &mut web::ServiceConfig) {
  config.service(rotate_credentials);
}

#[cfg(test)]
mod test_credential {
  use ntex::http::{Method, StatusCode};
  use serde_json::Value;

  use crate::controllers::cluster::test_cluster::seed;
  use crate::utils::tests::*;

  use super::*;

  #[ntex::test]
  async fn main() -> TestReturn {
    let (state, conductor) = generate_state(&[]);
    let srv = generate_server_with(crate::controllers::ntex_config, state).await;
    let uuid = seed(&srv).await?;

    let resp = request(&srv, Method::PATCH, "/v1/credentials/example", "1.11")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);

    let mut resp = request(&srv, Method::PATCH, "/v1/credentials/example", "1.12")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body = resp.json::<Value>().await?;
    assert_eq!(body["uuid"], Value::String(uuid.clone()));
    assert_eq!(
      conductor.last(),
      Some(ConductorMessage::CredentialRotate { cluster_uuid: uuid })
    );

    let resp = request(&srv, Method::PATCH, "/v1/credentials/missing", "1.12")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
  }
}
