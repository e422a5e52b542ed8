//! File to handle stats routes
use ntex::util::Bytes;
use ntex::web;

use crate::errors::{HttpResponseError, MagnumError};
use crate::models::StatsQuery;
use crate::repositories;
use crate::state::ApiState;
use crate::version::{Version, VersionError};

use super::base::{dispatch, handler, ok, ApiCall, Versioned, VersionedMethods};

pub const STATS_VER: Version = Version::new(1, 4);

const ALLOWED_STATS: &[&str] = &["cluster"];

async fn get_all(call: ApiCall) -> Result<web::HttpResponse, MagnumError> {
  let query = call.query::<StatsQuery>()?;
  let kind = query.kind.unwrap_or_else(|| String::from("cluster"));
  if !ALLOWED_STATS.contains(&kind.to_lowercase().as_str()) {
    return Err(MagnumError::invalid(format!(
      "Invalid stats type {}, expected one of {}",
      kind,
      ALLOWED_STATS.join(", ")
    )));
  }
  let project_id = match query.project_id {
    None if call.ctx.is_admin => None,
    None => Some(call.ctx.project()),
    Some(project_id) if call.ctx.is_admin || project_id == call.ctx.project() => {
      Some(project_id)
    }
    Some(project_id) => {
      return Err(MagnumError::NotAuthorized(format!(
        "Not authorized to read the stats of project {}",
        project_id
      )))
    }
  };
  let stats = repositories::cluster::stats(project_id.as_deref(), call.store()).await?;
  ok(&stats)
}

pub fn methods() -> Result<VersionedMethods, VersionError> {
  VersionedMethods::new("StatsController").add(
    Versioned::new("get_all", handler!(get_all))
      .min(STATS_VER)
      .policy("stats", "get_all"),
  )
}

#[web::get("/v1/stats")]
async fn get_stats(
  req: web::HttpRequest,
  state: web::types::State<ApiState>,
) -> Result<web::HttpResponse, HttpResponseError> {
  let methods = &state.controllers.stats;
  dispatch(&req, &state, methods, "get_all", &[], Bytes::new()).await
}

pub fn ntex_config(config: &mut web::ServiceConfig) {
  config.service(get_stats);
}

#[cfg(test)]
mod test_stats {
  use ntex::http::{Method, StatusCode};
  use serde_json::{json, Value};

  use crate::controllers::cluster::test_cluster::seed;
  use crate::utils::tests::*;

  #[ntex::test]
  async fn main() -> TestReturn {
    let srv = generate_server(crate::controllers::ntex_config).await;
    seed(&srv).await?;

    let resp = request(&srv, Method::GET, "/v1/stats", "1.3").send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);

    let mut resp = request(&srv, Method::GET, "/v1/stats", "1.4").send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.json::<Value>().await?;
    assert_eq!(body["clusters"], json!(1));
    assert_eq!(body["nodes"], json!(3));

    let resp = request(&srv, Method::GET, "/v1/stats?project_id=p2", "1.4")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = request(&srv, Method::GET, "/v1/stats?type=node", "1.4")
      .send()
      .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let mut resp = admin_request(&srv, Method::GET, "/v1/stats", "1.4").send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.json::<Value>().await?["clusters"], json!(1));

    let mut resp = admin_request(&srv, Method::GET, "/v1/stats?project_id=p2", "1.4")
      .send()
      .await?;
    assert_eq!(resp.json::<Value>().await?["clusters"], json!(0));
    Ok(())
  }
}
