use ntex::web;

use crate::controllers;
use crate::state::ApiState;
use crate::version::{
  BASE_VER, CURRENT_MAX_VER, MAX_VERSION_HEADER, MIN_VERSION_HEADER,
};

pub async fn start(state: ApiState) -> std::io::Result<()> {
  let hosts = state.config.hosts.to_owned();
  let mut server = web::HttpServer::new(move || {
    web::App::new()
      // bind api state
      .state(state.clone())
      // Default logger middleware
      .wrap(web::middleware::Logger::default())
      // Supported microversions on every response
      .wrap(
        web::middleware::DefaultHeaders::new()
          .header(MIN_VERSION_HEADER, BASE_VER.to_string())
          .header(MAX_VERSION_HEADER, CURRENT_MAX_VER.to_string()),
      )
      .configure(controllers::ntex_config)
  });
  for host in &hosts {
    if host.starts_with("unix://") {
      let addr = host.replace("unix://", "");
      server = match server.bind_uds(&addr) {
        Err(err) => {
          log::error!("unable to bind server on {} got error {}", &addr, &err);
          std::process::exit(1);
        }
        Ok(server) => server,
      };
      log::info!("listening on {}", &host);
    } else if host.starts_with("tcp://") {
      let addr = host.replace("tcp://", "");
      server = match server.bind(&addr) {
        Err(err) => {
          log::error!("unable to bind server on {} got error {}", &addr, &err);
          std::process::exit(1);
        }
        Ok(server) => server,
      };
      log::info!("listening on {}", &host);
    } else {
      log::warn!("{} is not valid use tcp:// or unix:// as protocol", host);
    }
  }
  log::info!("http server started");
  server.run().await
}
