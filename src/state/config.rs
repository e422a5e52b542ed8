use crate::cli::Cli;
use crate::errors::DaemonError;
use crate::models::{DaemonConfig, DaemonConfigFile};

fn merge_config(args: &Cli, config: DaemonConfigFile) -> DaemonConfig {
  let hosts = if let Some(ref hosts) = args.hosts {
    hosts.to_owned()
  } else if let Some(ref hosts) = config.hosts {
    hosts.to_owned()
  } else {
    vec![String::from("tcp://0.0.0.0:9511")]
  };

  let policy_file = if let Some(ref policy_file) = args.policy_file {
    Some(policy_file.to_owned())
  } else {
    config.policy_file.to_owned()
  };

  DaemonConfig {
    hosts,
    config_dir: args.config_dir.to_owned(),
    policy_file,
    api: config.api,
    quotas: config.quotas,
    cluster_template: config.cluster_template,
    drivers: config.drivers,
    trust: config.trust,
    inventory: config.inventory,
  }
}

fn read_config_file(config_dir: &str) -> Result<DaemonConfigFile, DaemonError> {
  let config_path = std::path::Path::new(config_dir).join("magnum.conf");

  if !config_path.exists() {
    return Ok(DaemonConfigFile::default());
  }

  let content = std::fs::read_to_string(&config_path)?;
  if content.trim().is_empty() {
    return Ok(DaemonConfigFile::default());
  }
  let config = serde_yaml::from_str::<DaemonConfigFile>(&content)?;

  Ok(config)
}

/// Init daemon config
/// It will read <config_dir>/magnum.conf
/// and merge it with the cli arguments, arguments take priority
pub fn init(args: &Cli) -> Result<DaemonConfig, DaemonError> {
  let file_config = read_config_file(&args.config_dir)?;
  Ok(merge_config(args, file_config))
}
