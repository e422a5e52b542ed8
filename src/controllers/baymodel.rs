//! File to handle baymodel routes, the legacy name of cluster templates
use ntex::util::Bytes;
use ntex::web;

use crate::errors::{HttpResponseError, MagnumError};
use crate::state::ApiState;
use crate::version::{Version, VersionError};

use super::base::{
  detail_not_found, dispatch, handler, ApiCall, Handler, Versioned, VersionedMethods,
};
use super::cluster_template::{
  create_template, delete_template, get_template, list_templates,
  update_template, TemplateKind,
};

/// Last version serving the bay and baymodel resources
pub const LEGACY_MAX_VER: Version = Version::new(1, 10);

pub const BAYMODEL: TemplateKind = TemplateKind {
  collection: "baymodels",
  policy: "baymodel",
};

async fn get_all(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  list_templates(call, &BAYMODEL, true).await
}

async fn detail(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  list_templates(call, &BAYMODEL, false).await
}

async fn get_one(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  get_template(call, &BAYMODEL).await
}

async fn post(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  create_template(call, &BAYMODEL).await
}

async fn patch(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  update_template(call, &BAYMODEL).await
}

async fn delete(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  delete_template(call, &BAYMODEL).await
}

/// Method served until the legacy resources were removed
pub fn legacy(name: &'static str, handler: Handler) -> Versioned {
  Versioned::new(name, handler).max(LEGACY_MAX_VER)
}

pub fn methods() -> Result<VersionedMethods, VersionError> {
  VersionedMethods::new("BayModelsController")
    .add(legacy("get_all", handler!(get_all)).policy("baymodel", "get_all"))?
    .add(legacy("detail", handler!(detail)).policy("baymodel", "detail"))?
    .add(legacy("get_one", handler!(get_one)))?
    .add(legacy("post", handler!(post)).policy("baymodel", "create"))?
    .add(legacy("patch", handler!(patch)))?
    .add(legacy("delete", handler!(delete)))
}

#[web::get("/v1/baymodels")]
async fn list_baymodels(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.baymodel;
  dispatch(&req, &state, methods, "get_all", &[], Bytes::new()).await
}

#[web::get("/v1/baymodels/detail")]
async fn detail_baymodels(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.baymodel;
  dispatch(&req, &state, methods, "detail", &[], Bytes::new()).await
}

#[web::get("/v1/baymodels/{ident}/detail")]
async fn detail_baymodel() -> Result<web::HttpResponse, HttpResponseError> {
  detail_not_found()
}

#[web::get("/v1/baymodels/{ident}")]
async fn inspect_baymodel(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.baymodel;
  dispatch(&req, &state, methods, "get_one", &["ident"], Bytes::new()).await
}

#[web::post("/v1/baymodels")]
async fn create_baymodel(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.baymodel;
  dispatch(&req, &state, methods, "post", &[], body).await
}

#[web::patch("/v1/baymodels/{ident}")]
async fn patch_baymodel(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.baymodel;
  dispatch(&req, &state, methods, "patch", &["ident"], body).await
}

#[web::delete("/v1/baymodels/{ident}")]
async fn delete_baymodel(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.baymodel;
  dispatch(&req, &state, methods, "delete", &["ident"], Bytes::new()).await
}

pub fn ntex_config(config: &mut web::ServiceConfig) {
  config.service(list_baymodels);
  config.service(detail_baymodels);
  config.service(detail_baymodel);
  config.service(inspect_baymodel);
  config.service(create_baymodel);
  config.service(patch_baymodel);
  config.service(delete_baymodel);
}
