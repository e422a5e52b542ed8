//! File to handle cluster template routes
//!
//! Baymodels share these handlers, only their collection and policy names
//! differ.
use ntex::util::Bytes;
use ntex::web;

use crate::errors::{HttpResponseError, MagnumError};
use crate::models::{
  ApiResource, ClusterTemplate, ClusterTemplateItem, Collection,
  JsonPatch, CLUSTER_TEMPLATE_PATCH_RULES, CLUSTER_TEMPLATE_SUMMARY,
  CLUSTER_TEMPLATE_UPDATE_ALLOWED_WHEN_IN_USE,
};
use crate::repositories;
use crate::services::driver::select_driver;
use crate::services::validation;
use crate::state::ApiState;
use crate::utils::name::generate_name;
use crate::utils::patch::{merge_into_item, patch_resource};
use crate::version::VersionError;

use super::base::{
  created, detail_not_found, dispatch, handler, no_content, ok, target,
  ApiCall, Versioned, VersionedMethods,
};

/// Names a template collection is served under
pub struct TemplateKind {
  /// Url segment and collection key
  pub(crate) collection: &'static str,
  /// Prefix of the policy rules
  pub(crate) policy: &'static str,
}

pub const CLUSTER_TEMPLATE: TemplateKind = TemplateKind {
  collection: "clustertemplates",
  policy: "cluster_template",
};

fn rule(kind: &TemplateKind, action: &str) -> String {
  format!("{}:{}", kind.policy, action)
}

fn convert(
  call: &ApiCall,
  kind: &TemplateKind,
  item: &ClusterTemplateItem,
) -> Result<ClusterTemplate, MagnumError> {
  ClusterTemplate::convert(item, &call.host_url, kind.collection)
}

/// Publishing needs its own rule, a denial is a conflict
fn check_publish(call: &ApiCall, kind: &TemplateKind) -> Result<(), MagnumError> {
  if !call.allows(&rule(kind, "publish"), None)? {
    return Err(MagnumError::Conflict(String::from(
      "Not authorized to set public or hidden flag for cluster template.",
    )));
  }
  Ok(())
}

async fn find_template(
  call: &mut ApiCall,
  kind: &TemplateKind,
  action: &str,
) -> Result<ClusterTemplateItem, MagnumError> {
  call.enforce_all_projects(&rule(kind, &format!("{}_all_projects", action)))?;
  let ident = call.param("ident")?;
  let item =
    repositories::cluster_template::find_by_ident(&ident, &call.scope(), call.store())
      .await?;
  Ok(item)
}

/// List templates, hidden ones are listed for admins only
pub async fn list_templates(
  mut call: ApiCall,
  kind: &'static TemplateKind,
  summary: bool,
) -> Result<web::HttpResponse, MagnumError> {
  let action = if summary { "get_all" } else { "detail" };
  call.enforce_all_projects(&rule(kind, &format!("{}_all_projects", action)))?;
  let pagination = call.pagination()?;
  let items = repositories::cluster_template::list(
    &call.scope(),
    call.ctx.is_admin,
    &pagination,
    call.store(),
  )
  .await?;
  let marker = items.last().map(|item| item.uuid.clone());
  let templates = items
    .iter()
    .map(|item| {
      let mut template = convert(&call, kind, item)?;
      if summary {
        template.unset_fields_except(CLUSTER_TEMPLATE_SUMMARY)?;
      }
      Ok(template)
    })
    .collect::<Result<Vec<_>, MagnumError>>()?;
  let collection = Collection::new(kind.collection, templates).with_next(
    &call.host_url,
    kind.collection,
    &pagination,
    marker,
    &[],
  );
  ok(&collection)
}

pub async fn get_template(
  mut call: ApiCall,
  kind: &'static TemplateKind,
) -> Result<web::HttpResponse, MagnumError> {
  let item = find_template(&mut call, kind, "get_one").await?;
  if !item.public {
    call.enforce(&rule(kind, "get"), Some(target(&item.project_id, &item.user_id)))?;
  }
  ok(&convert(&call, kind, &item)?)
}

/// Create a template once its references are validated
pub async fn create_template(
  call: ApiCall,
  kind: &'static TemplateKind,
) -> Result<web::HttpResponse, MagnumError> {
  let template = ClusterTemplate::from_dict(&call.dict()?)?;
  if template.public == Some(true) || template.hidden == Some(true) {
    check_publish(&call, kind)?;
  }
  let mut partial = template.clone().into_partial()?;
  let clients = call.state.clients.clone();
  validation::validate_os_resources(
    clients.as_ref(),
    &call.ctx,
    &template.as_dict()?,
    None,
  )
  .await?;
  let image =
    validation::validate_image(clients.as_ref(), &call.ctx, &partial.image_id).await?;
  validation::validate_network_driver(
    &call.state.config.cluster_template,
    partial.coe,
    partial.network_driver.as_deref(),
  )?;
  validation::validate_volume_driver(partial.coe, partial.volume_driver.as_deref())?;
  partial.driver = Some(select_driver(
    &image,
    partial.server_type,
    partial.coe,
    &call.state.config.drivers.disabled_drivers,
  )?);
  partial.cluster_distro = image.os_distro.clone();
  if partial.name.is_none() {
    partial.name = Some(generate_name("template"));
  }
  let item = repositories::cluster_template::create(
    partial,
    &call.ctx.project(),
    &call.ctx.user(),
    call.store(),
  )
  .await?;
  log::info!(
    "[{}] {} {} created",
    call.ctx.request_id,
    kind.policy,
    item.uuid
  );
  let location = call.resource_url(kind.collection, &item.uuid);
  created(&location, &convert(&call, kind, &item)?)
}

/// Patch a template, one in use may only change its name and flags
pub async fn update_template(
  mut call: ApiCall,
  kind: &'static TemplateKind,
) -> Result<web::HttpResponse, MagnumError> {
  let patch = call.json::<Vec<JsonPatch>>()?;
  let item = find_template(&mut call, kind, "update").await?;
  call.enforce(&rule(kind, "update"), Some(target(&item.project_id, &item.user_id)))?;
  let template = convert(&call, kind, &item)?;
  let patched = patch_resource(&template, &patch, &CLUSTER_TEMPLATE_PATCH_RULES)?;
  let in_use =
    repositories::cluster_template::is_in_use(&item.uuid, call.store()).await?;
  if in_use
    && patched
      .delta
      .iter()
      .any(|field| !CLUSTER_TEMPLATE_UPDATE_ALLOWED_WHEN_IN_USE.contains(&field.as_str()))
  {
    return Err(MagnumError::invalid(format!(
      "Cluster template {} is referenced by one or multiple clusters.",
      item.uuid
    )));
  }
  if patched.delta.contains("public") || patched.delta.contains("hidden") {
    check_publish(&call, kind)?;
  }
  let clients = call.state.clients.clone();
  validation::validate_os_resources_delta(
    clients.as_ref(),
    &call.ctx,
    &patched.resource.as_dict()?,
    &patched.delta,
  )
  .await?;
  let new_item = merge_into_item(&item, &patched.resource)?;
  if patched.delta.contains("coe") || patched.delta.contains("network_driver") {
    validation::validate_network_driver(
      &call.state.config.cluster_template,
      new_item.coe,
      new_item.network_driver.as_deref(),
    )?;
  }
  if patched.delta.contains("coe") || patched.delta.contains("volume_driver") {
    validation::validate_volume_driver(new_item.coe, new_item.volume_driver.as_deref())?;
  }
  let new_item =
    repositories::cluster_template::update(new_item, call.store()).await?;
  ok(&convert(&call, kind, &new_item)?)
}

/// Delete a template no cluster references
pub async fn delete_template(
  mut call: ApiCall,
  kind: &'static TemplateKind,
) -> Result<web::HttpResponse, MagnumError> {
  let item = find_template(&mut call, kind, "delete").await?;
  call.enforce(&rule(kind, "delete"), Some(target(&item.project_id, &item.user_id)))?;
  if repositories::cluster_template::is_in_use(&item.uuid, call.store()).await? {
    return Err(MagnumError::invalid(format!(
      "Cluster template {} is referenced by one or multiple clusters.",
      item.uuid
    )));
  }
  repositories::cluster_template::delete_by_uuid(&item.uuid, call.store()).await?;
  log::info!(
    "[{}] {} {} deleted",
    call.ctx.request_id,
    kind.policy,
    item.uuid
  );
  no_content()
}

async fn get_all(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  list_templates(call, &CLUSTER_TEMPLATE, true).await
}

async fn detail(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  list_templates(call, &CLUSTER_TEMPLATE, false).await
}

async fn get_one(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  get_template(call, &CLUSTER_TEMPLATE).await
}

async fn post(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  create_template(call, &CLUSTER_TEMPLATE).await
}

async fn patch(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  update_template(call, &CLUSTER_TEMPLATE).await
}

async fn delete(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  delete_template(call, &CLUSTER_TEMPLATE).await
}

pub fn methods() -> Result<VersionedMethods, VersionError> {
  VersionedMethods::new("ClusterTemplatesController")
    .add(Versioned::new("get_all", handler!(get_all)).policy("cluster_template", "get_all"))?
    .add(Versioned::new("detail", handler!(detail)).policy("cluster_template", "detail"))?
    .add(Versioned::new("get_one", handler!(get_one)))?
    .add(Versioned::new("post", handler!(post)).policy("cluster_template", "create"))?
    .add(Versioned::new("patch", handler!(patch)))?
    .add(Versioned::new("delete", handler!(delete)))
}

/// List cluster templates
#[web::get("/v1/clustertemplates")]
async fn list_cluster_templates(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster_template;
  dispatch(&req, &state, methods, "get_all", &[], Bytes::new()).await
}

/// List cluster templates with every attribute
#[web::get("/v1/clustertemplates/detail")]
async fn detail_cluster_templates(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster_template;
  dispatch(&req, &state, methods, "detail", &[], Bytes::new()).await
}

#[web::get("/v1/clustertemplates/{ident}/detail")]
async fn detail_cluster_template() -> Result<web::HttpResponse, HttpResponseError> {
  detail_not_found()
}

/// Inspect a cluster template by uuid or name
#[web::get("/v1/clustertemplates/{ident}")]
async fn inspect_cluster_template(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster_template;
  dispatch(&req, &state, methods, "get_one", &["ident"], Bytes::new()).await
}

/// Create new cluster template
#[web::post("/v1/clustertemplates")]
async fn create_cluster_template(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster_template;
  dispatch(&req, &state, methods, "post", &[], body).await
}

/// Apply a json patch to a cluster template
#[web::patch("/v1/clustertemplates/{ident}")]
async fn patch_cluster_template(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
  body: Bytes,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster_template;
  dispatch(&req, &state, methods, "patch", &["ident"], body).await
}

/// Delete a cluster template by uuid or name
#[web::delete("/v1/clustertemplates/{ident}")]
async fn delete_cluster_template(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.cluster_template;
  dispatch(&req, &state, methods, "delete", &["ident"], Bytes::new()).await
}

pub fn ntex_config(config: &mut web::ServiceConfig) {
  config.service(list_cluster_templates);
  config.service(detail_cluster_templates);
  config.service(detail_cluster_template);
  config.service(inspect_cluster_template);
  config.service(create_cluster_template);
  config.service(patch_cluster_template);
  config.service(delete_cluster_template);
}
