use serde::{Serialize, Deserialize};

/// Query string of the stats endpoint
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StatsQuery {
  pub(crate) project_id: Option<String>,
  #[serde(rename = "type")]
  pub(crate) kind: Option<String>,
}

/// Cluster and node counts of a project or of the whole deployment
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
  pub(crate) clusters: usize,
  pub(crate) nodes: i64,
}
