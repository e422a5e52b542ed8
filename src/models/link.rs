use serde::{Serialize, Deserialize};

/// Hypermedia link embedded in every resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
  pub(crate) href: String,
  pub(crate) rel: String,
}

impl Link {
  /// `<host>/v1/<resource>/<args>` or `<host>/<resource>/<args>` for bookmarks
  pub fn make_link(
    rel: &str,
    host_url: &str,
    resource: &str,
    resource_args: &str,
    bookmark: bool,
  ) -> Self {
    let base = host_url.trim_end_matches('/');
    let href = match (bookmark, resource_args.is_empty()) {
      (true, true) => format!("{}/{}", base, resource),
      (true, false) => format!("{}/{}/{}", base, resource, resource_args),
      (false, true) => format!("{}/v1/{}", base, resource),
      (false, false) => format!("{}/v1/{}/{}", base, resource, resource_args),
    };
    Link {
      href,
      rel: rel.to_owned(),
    }
  }

  /// The self and bookmark pair of a resource
  pub fn pair(host_url: &str, resource: &str, resource_args: &str) -> Vec<Self> {
    vec![
      Link::make_link("self", host_url, resource, resource_args, false),
      Link::make_link("bookmark", host_url, resource, resource_args, true),
    ]
  }
}

#[cfg(test)]
mod test_link {
  use super::*;

  #[test]
  fn self_and_bookmark() {
    let links = Link::pair("http://magnum:9511/", "clusters", "abc");
    assert_eq!(links[0].href, "http://magnum:9511/v1/clusters/abc");
    assert_eq!(links[0].rel, "self");
    assert_eq!(links[1].href, "http://magnum:9511/clusters/abc");
    assert_eq!(links[1].rel, "bookmark");
  }
}
