//! Api microversions
//!
//! A client selects the version of the api it talks to with the
//! `OpenStack-API-Version: container-infra <major>.<minor>` header.
use std::fmt;
use std::str::FromStr;

use ntex::http::HeaderMap;
use thiserror::Error;

/// Build version of the daemon
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service type expected in the microversion header
pub const SERVICE_TYPE: &str = "container-infra";
/// Microversion header
pub const VERSION_HEADER: &str = "OpenStack-API-Version";
/// Header accepted when [`VERSION_HEADER`] is absent
pub const LEGACY_VERSION_HEADER: &str = "X-OpenStack-Magnum-API-Version";
pub const MIN_VERSION_HEADER: &str = "OpenStack-API-Minimum-Version";
pub const MAX_VERSION_HEADER: &str = "OpenStack-API-Maximum-Version";

/// Oldest supported microversion, also used when the client sends none
pub const BASE_VER: Version = Version { major: 1, minor: 1 };
/// Newest supported microversion, `latest` resolves to it
pub const CURRENT_MAX_VER: Version = Version { major: 1, minor: 12 };

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
  #[error("Invalid value for {header} header: {value}")]
  InvalidHeader { header: &'static str, value: String },
  #[error("Invalid service type for {header} header: {value}")]
  InvalidService { header: &'static str, value: String },
  #[error(
    "Version {version} was requested but the minor version is not supported \
     by this service. The supported version range is: [{min}, {max}]."
  )]
  Unsupported {
    version: Version,
    min: Version,
    max: Version,
  },
  #[error("Invalid version string {0}")]
  Parse(String),
  #[error("Version {version} was requested but the method {method} is not supported for this version")]
  NoMatch { version: Version, method: String },
  #[error("Versioned methods for {0} intersect")]
  Intersection(String),
}

/// A (major, minor) api version, ordered lexicographically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
  pub(crate) major: u32,
  pub(crate) minor: u32,
}

impl Version {
  pub const fn new(major: u32, minor: u32) -> Self {
    Version { major, minor }
  }

  /// Whether this version lies within `[start, end]`, both ends inclusive
  pub fn matches(&self, start: &Version, end: &Version) -> bool {
    start <= self && self <= end
  }

  /// Extract the requested version from the request headers.
  ///
  /// A missing header yields [`BASE_VER`], `latest` yields
  /// [`CURRENT_MAX_VER`]. Anything malformed is rejected.
  pub fn from_headers(headers: &HeaderMap) -> Result<Self, VersionError> {
    if let Some(value) = headers.get(VERSION_HEADER) {
      let value = value.to_str().map_err(|_| VersionError::InvalidHeader {
        header: VERSION_HEADER,
        value: String::from("<non ascii>"),
      })?;
      return Self::parse_header(value);
    }
    if let Some(value) = headers.get(LEGACY_VERSION_HEADER) {
      let value = value.to_str().map_err(|_| VersionError::InvalidHeader {
        header: LEGACY_VERSION_HEADER,
        value: String::from("<non ascii>"),
      })?;
      return Self::parse_value(LEGACY_VERSION_HEADER, value.trim());
    }
    Ok(BASE_VER)
  }

  /// Parse `<service> <major>.<minor>` or `<service> latest`
  pub fn parse_header(value: &str) -> Result<Self, VersionError> {
    let parts = value.split_whitespace().collect::<Vec<&str>>();
    if parts.len() != 2 {
      return Err(VersionError::InvalidHeader {
        header: VERSION_HEADER,
        value: value.to_owned(),
      });
    }
    if !parts[0].eq_ignore_ascii_case(SERVICE_TYPE) {
      return Err(VersionError::InvalidService {
        header: VERSION_HEADER,
        value: value.to_owned(),
      });
    }
    Self::parse_value(VERSION_HEADER, parts[1])
  }

  fn parse_value(header: &'static str, value: &str) -> Result<Self, VersionError> {
    if value.eq_ignore_ascii_case("latest") {
      return Ok(CURRENT_MAX_VER);
    }
    let version = value.parse::<Version>().map_err(|_| {
      VersionError::InvalidHeader {
        header,
        value: value.to_owned(),
      }
    })?;
    if version.major != BASE_VER.major
      || !version.matches(&BASE_VER, &CURRENT_MAX_VER)
    {
      return Err(VersionError::Unsupported {
        version,
        min: BASE_VER,
        max: CURRENT_MAX_VER,
      });
    }
    Ok(version)
  }

  /// Header value echoed back to the client
  pub fn header_value(&self) -> String {
    format!("{} {}", SERVICE_TYPE, self)
  }
}

impl FromStr for Version {
  type Err = VersionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let parts = s.split('.').collect::<Vec<&str>>();
    if parts.len() != 2 {
      return Err(VersionError::Parse(s.to_owned()));
    }
    let major = parts[0]
      .parse::<u32>()
      .map_err(|_| VersionError::Parse(s.to_owned()))?;
    let minor = parts[1]
      .parse::<u32>()
      .map_err(|_| VersionError::Parse(s.to_owned()))?;
    Ok(Version { major, minor })
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.major, self.minor)
  }
}
