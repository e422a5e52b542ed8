//! magnum api
//!
//! Api of a container infrastructure control plane: clusters, their
//! templates, nodegroups and federations, behind microversioned endpoints.
use clap::Parser;

mod cli;
mod version;
mod context;
mod errors;
mod policy;
mod models;
mod repositories;
mod services;
mod events;
mod controllers;
mod state;
mod server;
mod utils;

/// magnum-api serves the container infrastructure api
///
/// # Example
/// ```sh
/// magnum-api --config-dir /etc/magnum -H tcp://0.0.0.0:9511
/// ```
#[ntex::main]
async fn main() -> std::io::Result<()> {
  // Parsing command line arguments
  let args = cli::Cli::parse();

  // Building env logger
  if std::env::var("LOG_LEVEL").is_err() {
    std::env::set_var("LOG_LEVEL", "magnum_api=info,warn,error");
  }
  env_logger::Builder::new().parse_env("LOG_LEVEL").init();

  // Merge cli args and config file with priority to args
  let config = match state::config::init(&args) {
    Err(err) => {
      log::error!("{}", err);
      std::process::exit(1);
    }
    Ok(config) => config,
  };

  let state = match state::init(config).await {
    Err(err) => {
      log::error!("{}", err);
      std::process::exit(1);
    }
    Ok(state) => state,
  };

  // start ntex http server
  server::start(state).await?;
  log::info!("shutdown");
  Ok(())
}
