//! File to handle certificate routes
//!
//! Signing and CA lookups are conductor calls, the reply carries the pem.
use ntex::util::Bytes;
use ntex::web;
use serde::{Serialize, Deserialize};
use serde_json::{json, Value};

use crate::errors::{HttpResponseError, MagnumError};
use crate::models::{ApiResource, Certificate, ClusterId, ClusterItem, CA_CERT_TYPES};
use crate::repositories;
use crate::services::conductor::{ConductorMessage, ConductorReply};
use crate::state::ApiState;
use crate::version::{Version, VersionError};

use super::base::{accepted, created, dispatch, handler, ok, ApiCall, Versioned, VersionedMethods};

pub const ROTATE_CA_VER: Version = Version::new(1, 5);

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CertificateQuery {
  pub(crate) ca_cert_type: Option<String>,
}

/// The trustee of the cluster may act on its certificates
fn certificate_target(cluster: &ClusterItem) -> Value {
  json!({
    "project_id": cluster.project_id,
    "user_id": cluster.user_id,
    "trustee_user_id": cluster.trustee_user_id,
  })
}

fn check_ca_cert_type(ca_cert_type: Option<&str>) -> Result<(), MagnumError> {
  match ca_cert_type {
    Some(kind) if !CA_CERT_TYPES.contains(&kind) => Err(MagnumError::invalid(format!(
      "Invalid ca_cert_type {}, expected one of {}",
      kind,
      CA_CERT_TYPES.join(", ")
    ))),
    _ => Ok(()),
  }
}

fn pem_of(reply: ConductorReply) -> Result<String, MagnumError> {
  match reply {
    ConductorReply::Certificate(pem) => Ok(pem),
    other => Err(MagnumError::internal(format!(
      "Conductor answered {:?} instead of a certificate",
      other
    ))),
  }
}

async fn find_cluster(call: &ApiCall, ident: &str) -> Result<ClusterItem, MagnumError> {
  repositories::cluster::find_by_ident(ident, &call.scope(), call.store()).await
}

async fn get_one(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let query = call.query::<CertificateQuery>()?;
  check_ca_cert_type(query.ca_cert_type.as_deref())?;
  let cluster = find_cluster(&call, &call.param("cluster_ident")?).await?;
  call.enforce("certificate:get", Some(certificate_target(&cluster)))?;
  let reply = call
    .call(ConductorMessage::GetCaCertificate {
      cluster_uuid: cluster.uuid.clone(),
      ca_cert_type: query.ca_cert_type.clone(),
    })
    .await?;
  let certificate = Certificate::new(
    &cluster.uuid,
    pem_of(reply)?,
    None,
    query.ca_cert_type,
    &call.host_url,
  );
  ok(&certificate)
}

async fn post(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let request = Certificate::from_dict(&call.dict()?)?;
  let ident = request
    .cluster_uuid
    .clone()
    .ok_or_else(|| MagnumError::invalid("Mandatory field missing: cluster_uuid"))?;
  let csr = request
    .csr
    .clone()
    .ok_or_else(|| MagnumError::invalid("Mandatory field missing: csr"))?;
  let cluster = find_cluster(&call, &ident)
    .await
    .map_err(MagnumError::into_client_error)?;
  call.enforce("certificate:create", Some(certificate_target(&cluster)))?;
  let reply = call
    .call(ConductorMessage::SignCertificate {
      cluster_uuid: cluster.uuid.clone(),
      csr: csr.clone(),
      ca_cert_type: request.ca_cert_type.clone(),
    })
    .await?;
  let certificate = Certificate::new(
    &cluster.uuid,
    pem_of(reply)?,
    Some(csr),
    request.ca_cert_type,
    &call.host_url,
  );
  let location = call.resource_url("certificates", &cluster.uuid);
  created(&location, &certificate)
}

async fn rotate_ca(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let cluster = find_cluster(&call, &call.param("cluster_ident")?).await?;
  call.enforce("certificate:rotate_ca", Some(certificate_target(&cluster)))?;
  let template =
    repositories::cluster_template::find_by_uuid(&cluster.cluster_template_id, call.store())
      .await?;
  if template.tls_disabled {
    return Err(MagnumError::NotSupported(format!(
      "Rotating the CA certificate on a non-TLS cluster is not supported: {}",
      cluster.uuid
    )));
  }
  call
    .call(ConductorMessage::RotateCaCertificate {
      cluster_uuid: cluster.uuid.clone(),
    })
    .await?;
  accepted(&ClusterId { uuid: cluster.uuid })
}

pub fn methods() -> Result<VersionedMethods, VersionError> {
  VersionedMethods::new("CertificateController")
    .add(Versioned::new("get_one", handler!(get_one)))?
    .add(Versioned::new("post", handler!(post)))?
    .add(Versioned::new("rotate_ca", handler!(rotate_ca)).min(ROTATE_CA_VER))
}

/// Get the CA certificate of a cluster
#[web::get("/v1/certificates/{cluster_ident}")]
async fn get_certificate(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.certificate;
  dispatch(&req, &state, methods, "get_one", &["cluster_ident"], Bytes::new()).await
}

/// Sign a certificate signing request with the CA of a cluster
#[web::post("/v1/certificates")]
async fn sign_certificate(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.certificate;
  dispatch(&req, &state, methods, "post", &[], body).await
}

/// Rotate the CA certificate of a cluster
#[web::patch("/v1/certificates/{cluster_ident}")]
async fn rotate_certificate(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.certificate;
  dispatch(&req, &state, methods, "rotate_ca", &["cluster_ident"], body).await
}

pub fn ntex_config(config: &mut web::ServiceConfig) {
  config.service(get_certificate);
  config.service(sign_certificate);
  config.service(rotate_certificate);
}

#[cfg(test)]
mod test_certificate {
  use ntex::http::{Method, StatusCode};
  use serde_json::{json, Value};

  use crate::controllers::cluster::test_cluster::seed;
  use crate::utils::tests::*;

  use super::*;

  async fn test_get(srv: &TestServer, conductor: &RecordingConductor, uuid: &str) -> TestReturn {
    let mut resp = request(srv, Method::GET, "/v1/certificates/example", "1.4")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.json::<Value>().await?;
    assert_eq!(body["cluster_uuid"], json!(uuid));
    assert!(body["pem"].as_str().unwrap().starts_with("-----BEGIN"));

    let resp = request(
      srv,
      Method::GET,
      "/v1/certificates/example?ca_cert_type=etcd",
      "1.4",
    )
    .send()
    .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(matches!(
      conductor.last(),
      Some(ConductorMessage::GetCaCertificate { ca_cert_type: Some(_), .. })
    ));

    let resp = request(
      srv,
      Method::GET,
      "/v1/certificates/example?ca_cert_type=ssh",
      "1.4",
    )
    .send()
    .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(srv, Method::GET, "/v1/certificates/missing", "1.4")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
  }

  async fn test_sign(srv: &TestServer, uuid: &str) -> TestReturn {
    let csr = "-----BEGIN CERTIFICATE REQUEST-----\nMIIB\n-----END CERTIFICATE REQUEST-----";
    let mut resp = request(srv, Method::POST, "/v1/certificates", "1.4")
      .send_json(&json!({ "cluster_uuid": "example", "csr": csr }))
      .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = resp.json::<Value>().await?;
    assert_eq!(body["cluster_uuid"], json!(uuid));
    assert_eq!(body["csr"], json!(csr));

    let resp = request(srv, Method::POST, "/v1/certificates", "1.4")
      .send_json(&json!({ "cluster_uuid": "example" }))
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(srv, Method::POST, "/v1/certificates", "1.4")
      .send_json(&json!({ "cluster_uuid": "missing", "csr": csr }))
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
  }

  async fn test_rotate(srv: &TestServer, conductor: &RecordingConductor) -> TestReturn {
    let resp = request(srv, Method::PATCH, "/v1/certificates/example", "1.4")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);

    let resp = request(srv, Method::PATCH, "/v1/certificates/example", "1.5")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert!(matches!(
      conductor.last(),
      Some(ConductorMessage::RotateCaCertificate { .. })
    ));
    Ok(())
  }

  async fn test_rotate_without_tls(srv: &TestServer) -> TestReturn {
    let mut template = crate::models::ClusterTemplate::sample();
    template["name"] = json!("notls");
    template["tls_disabled"] = json!(true);
    let resp = request(srv, Method::POST, "/v1/clustertemplates", "1.4")
      .send_json(&template)
      .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let mut cluster = crate::models::Cluster::sample();
    cluster["name"] = json!("plain");
    cluster["cluster_template_id"] = json!("notls");
    let resp = request(srv, Method::POST, "/v1/clusters", "1.4")
      .send_json(&cluster)
      .await?;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let resp = request(srv, Method::PATCH, "/v1/certificates/plain", "1.5")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
  }

  #[ntex::test]
  async fn main() -> TestReturn {
    let (state, conductor) = generate_state(&[]);
    let srv = generate_server_with(crate::controllers::ntex_config, state).await;
    let uuid = seed(&srv).await?;
    test_get(&srv, &conductor, &uuid).await?;
    test_sign(&srv, &uuid).await?;
    test_rotate(&srv, &conductor).await?;
    test_rotate_without_tls(&srv).await?;
    Ok(())
  }

  #[ntex::test]
  async fn foreign_users_are_denied() -> TestReturn {
    let (state, _) = generate_state(&[("certificate:get", "user_id:%(user_id)s and role:auditor")]);
    let srv = generate_server_with(crate::controllers::ntex_config, state).await;
    seed(&srv).await?;
    let resp = request(&srv, Method::GET, "/v1/certificates/example", "1.4")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    Ok(())
  }
}
