//! Errors handling

use std::fmt;

use axum::response::{IntoResponse, Response};
use hyper::StatusCode;

use crate::svn::SvnError;

/// A notification that cannot be acted upon.
///
/// Both cases are the sender's fault and are answered with
/// `400 Bad Request`; nothing has been polled when one is returned.
#[derive(Debug)]
pub enum NotifyError {
    /// The `changed` parameter is absent.
    MissingChanged,
    /// The repository URL built from the request is not a valid URL.
    InvalidRepositoryUrl(SvnError),
}

impl std::error::Error for NotifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NotifyError::MissingChanged => None,
            NotifyError::InvalidRepositoryUrl(e) => Some(e),
        }
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NotifyError::MissingChanged => f.write_str("missing `changed` parameter"),
            NotifyError::InvalidRepositoryUrl(e) => {
                write!(f, "cannot build repository URL: {e}")
            }
        }
    }
}

impl IntoResponse for NotifyError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}
