use ntex::web;
use ntex::http::StatusCode;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::version::VersionError;

/// Http response error
#[derive(Debug, Error)]
pub struct HttpResponseError {
  pub(crate) msg: String,
  pub(crate) status: StatusCode,
}

impl std::fmt::Display for HttpResponseError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{}] {}", self.status, self.msg)
  }
}

impl web::WebResponseError for HttpResponseError {
  // builds the actual response to send back when an error occurs
  fn error_response(&self, _: &web::HttpRequest) -> web::HttpResponse {
    log::debug!("Error response: {}", self);
    let err_json = json!({ "msg": self.msg });
    web::HttpResponse::build(self.status).json(&err_json)
  }
}

/// Errors raised while handling an api request.
///
/// Each variant maps to exactly one http status, see [`MagnumError::status`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MagnumError {
  /// A resource or a referenced cloud object does not exist
  #[error("{0}")]
  NotFound(String),
  /// Ambiguous name, duplicated resource or denied publication
  #[error("{0}")]
  Conflict(String),
  /// Invalid parameter, patch error, bad label, quota exceeded...
  #[error("{0}")]
  Invalid(String),
  /// Generic authorization failure
  #[error("{0}")]
  NotAuthorized(String),
  /// A policy rule denied the action
  #[error("Policy doesn't allow {0} to be performed.")]
  PolicyNotAuthorized(String),
  /// Microversion parse or match failure
  #[error("{0}")]
  NotAcceptable(String),
  /// Operation disabled for this resource
  #[error("{0}")]
  NotSupported(String),
  /// The caller may not use the referenced image
  #[error("Not authorized for image {0}.")]
  ImageNotAuthorized(String),
  /// Anything unexpected
  #[error("{0}")]
  Internal(String),
}

impl MagnumError {
  pub fn status(&self) -> StatusCode {
    match self {
      MagnumError::NotFound(_) => StatusCode::NOT_FOUND,
      MagnumError::Conflict(_) => StatusCode::CONFLICT,
      MagnumError::Invalid(_) => StatusCode::BAD_REQUEST,
      MagnumError::NotAuthorized(_) => StatusCode::FORBIDDEN,
      MagnumError::PolicyNotAuthorized(_) => StatusCode::FORBIDDEN,
      MagnumError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
      MagnumError::NotSupported(_) => StatusCode::BAD_REQUEST,
      MagnumError::ImageNotAuthorized(_) => StatusCode::BAD_REQUEST,
      MagnumError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// `<Resource> <ident> could not be found.`
  pub fn not_found(resource: &str, ident: &str) -> Self {
    MagnumError::NotFound(format!("{} {} could not be found.", resource, ident))
  }

  /// Name lookup matched more than one row
  pub fn multiple_matches(resource: &str) -> Self {
    let lower = resource.to_lowercase();
    MagnumError::Conflict(format!(
      "Multiple {}s exist with same name. Please use the {} uuid instead.",
      lower, lower
    ))
  }

  pub fn invalid<T: ToString>(msg: T) -> Self {
    MagnumError::Invalid(msg.to_string())
  }

  pub fn internal<T: ToString>(msg: T) -> Self {
    MagnumError::Internal(msg.to_string())
  }

  /// During a create the client references something that doesn't exist:
  /// that is a problem with the request body, not a missing url.
  pub fn into_client_error(self) -> Self {
    match self {
      MagnumError::NotFound(msg) => MagnumError::Invalid(msg),
      other => other,
    }
  }
}

impl From<MagnumError> for HttpResponseError {
  fn from(err: MagnumError) -> Self {
    let status = err.status();
    let msg = match &err {
      MagnumError::Internal(detail) => {
        let correlation_id = Uuid::new_v4();
        log::error!("[{}] {}", correlation_id, detail);
        format!("Internal server error (correlation id {})", correlation_id)
      }
      _ => err.to_string(),
    };
    HttpResponseError { msg, status }
  }
}

impl From<VersionError> for MagnumError {
  fn from(err: VersionError) -> Self {
    MagnumError::NotAcceptable(err.to_string())
  }
}

/// Generic Daemon error
#[derive(Debug, Error)]
pub enum DaemonError {
  /// Io error
  #[error(transparent)]
  Io(#[from] std::io::Error),
  /// Yaml config or policy file error
  #[error(transparent)]
  Yaml(#[from] serde_yaml::Error),
  /// Policy file watcher error
  #[error(transparent)]
  Notify(#[from] notify::Error),
  /// Invalid policy rule
  #[error("invalid policy rule {0}")]
  Policy(String),
  /// Versioned method registration error
  #[error(transparent)]
  Version(#[from] VersionError),
}
