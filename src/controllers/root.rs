//! Version discovery, served whatever the requested version
use ntex::web;
use serde::{Serialize, Deserialize};

use crate::errors::{HttpResponseError, MagnumError};
use crate::models::Link;
use crate::state::ApiState;
use crate::version::{BASE_VER, CURRENT_MAX_VER};

use super::base::host_url;

/// Collections advertised by the v1 root
const COLLECTIONS: &[&str] = &[
  "clustertemplates",
  "clusters",
  "baymodels",
  "bays",
  "certificates",
  "federations",
  "quotas",
  "stats",
  "nodegroups",
  "x509keypairs",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiVersion {
  pub(crate) id: String,
  pub(crate) status: String,
  pub(crate) min_version: String,
  pub(crate) max_version: String,
  pub(crate) links: Vec<Link>,
}

impl ApiVersion {
  fn v1(host_url: &str) -> Self {
    ApiVersion {
      id: String::from("v1"),
      status: String::from("CURRENT"),
      min_version: BASE_VER.to_string(),
      max_version: CURRENT_MAX_VER.to_string(),
      links: vec![Link::make_link("self", host_url, "v1", "", true)],
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Root {
  pub(crate) name: String,
  pub(crate) description: String,
  pub(crate) versions: Vec<ApiVersion>,
  pub(crate) default_version: ApiVersion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaType {
  pub(crate) base: String,
  #[serde(rename = "type")]
  pub(crate) kind: String,
}

/// Versions of the api
#[web::get("/")]
async fn get_root(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let host_url = host_url(&req, &state);
  let v1 = ApiVersion::v1(&host_url);
  let root = Root {
    name: String::from("OpenStack Magnum API"),
    description: String::from(
      "Magnum is an OpenStack project which aims to provide container \
       cluster management.",
    ),
    versions: vec![v1.clone()],
    default_version: v1,
  };
  Ok(web::HttpResponse::Ok().json(&root))
}

/// Root of the v1 api with a link pair per collection
#[web::get("/v1")]
async fn get_v1(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let host_url = host_url(&req, &state);
  let mut body = serde_json::Map::new();
  body.insert("id".into(), serde_json::json!("v1"));
  body.insert(
    "media_types".into(),
    serde_json::to_value(vec![MediaType {
      base: String::from("application/json"),
      kind: String::from("application/vnd.openstack.magnum.v1+json"),
    }])
    .map_err(MagnumError::internal)?,
  );
  body.insert(
    "links".into(),
    serde_json::json!([
      Link::make_link("self", &host_url, "v1", "", true),
      Link::make_link(
        "describedby",
        "https://docs.openstack.org",
        "developer/magnum/dev/api-spec-v1.html",
        "",
        true,
      ),
    ]),
  );
  for collection in COLLECTIONS {
    body.insert(
      (*collection).to_owned(),
      serde_json::json!(Link::pair(&host_url, collection, "")),
    );
  }
  Ok(web::HttpResponse::Ok().json(&body))
}

pub fn ntex_config(config: &mut web::ServiceConfig) {
  config.service(get_root);
  config.service(get_v1);
}
