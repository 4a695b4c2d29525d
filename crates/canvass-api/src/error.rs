//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure is rendered as the error envelope
//! `{"success": false, "error": <message>, "kind": <kind>}`. Store failures
//! are logged in full and reported with a generic message.

use axum::{
  Json,
  extract::rejection::{JsonRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use canvass_core::ErrorKind;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

const INTERNAL_MESSAGE: &str = "internal store failure";

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] canvass_core::Error),

  /// Unparseable body or query string.
  #[error("{0}")]
  BadRequest(String),

  #[error("invalid username or password")]
  BadCredentials,

  /// Credential hashing failed.
  #[error("credential error: {0}")]
  Credential(String),
}

impl ApiError {
  pub fn bad_request(msg: impl Into<String>) -> Self { Self::BadRequest(msg.into()) }

  /// The stable kind string reported in the envelope.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Core(e) => e.kind().into(),
      Self::BadRequest(_) => ErrorKind::Validation.into(),
      Self::BadCredentials => ErrorKind::Unauthenticated.into(),
      Self::Credential(_) => "internal",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::Core(e) => match e.kind() {
        ErrorKind::Validation | ErrorKind::InvalidState => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Transaction => StatusCode::INTERNAL_SERVER_ERROR,
      },
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::BadCredentials => StatusCode::UNAUTHORIZED,
      Self::Credential(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self::BadRequest(format!("invalid request body: {}", rejection.body_text()))
  }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self {
    Self::BadRequest(format!("invalid query string: {}", rejection.body_text()))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = if status.is_server_error() {
      error!(error = ?self, "request failed");
      INTERNAL_MESSAGE.to_owned()
    } else {
      warn!(%status, kind = self.kind(), error = %self, "request rejected");
      self.to_string()
    };
    let body = json!({ "success": false, "error": message, "kind": self.kind() });
    (status, Json(body)).into_response()
  }
}
