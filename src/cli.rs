use clap::Parser;

/// magnum api
/// container infrastructure management api
#[derive(Debug, Clone, Parser)]
#[command(about, version)]
pub(crate) struct Cli {
  /// Address to listen on, tcp://host:port or unix:///path.
  /// Default to tcp://0.0.0.0:9511
  #[arg(short = 'H', long = "host")]
  pub(crate) hosts: Option<Vec<String>>,
  /// Config dir holding magnum.conf
  #[arg(long, default_value = "/etc/magnum")]
  pub(crate) config_dir: String,
  /// Yaml policy file overriding the default rules
  #[arg(long)]
  pub(crate) policy_file: Option<String>,
}
