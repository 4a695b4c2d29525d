//! Error types for `canvass-core`.
//!
//! Every failure the core reports belongs to exactly one [`ErrorKind`]. The
//! kind is the stable, machine-checkable part of an error; the `Display`
//! output is the human-readable part.

use strum::{AsRefStr, Display, IntoStaticStr};
use thiserror::Error;

/// The stable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
  Validation,
  NotFound,
  Unauthenticated,
  Forbidden,
  InvalidState,
  Conflict,
  Transaction,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  Validation(String),

  #[error("questionnaire not found: {0}")]
  QuestionnaireNotFound(i64),

  #[error("principal not found: {0}")]
  PrincipalNotFound(i64),

  #[error("unauthenticated: {0}")]
  Unauthenticated(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("questionnaire {0} is published and cannot be edited")]
  Published(i64),

  #[error(
    "respondent {respondent_id} has already submitted questionnaire \
     {questionnaire_id}"
  )]
  AlreadySubmitted {
    questionnaire_id: i64,
    respondent_id:    i64,
  },

  #[error("username already exists: {0}")]
  UsernameTaken(String),

  #[error("email already exists: {0}")]
  EmailTaken(String),

  #[error("administrator {0} cannot be deleted")]
  AdminProtected(i64),

  /// A store failure; any multi-row write it interrupted was rolled back.
  #[error("transaction failed: {0}")]
  Transaction(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation(_) | Self::UsernameTaken(_) | Self::EmailTaken(_) => {
        ErrorKind::Validation
      }
      Self::QuestionnaireNotFound(_) | Self::PrincipalNotFound(_) => {
        ErrorKind::NotFound
      }
      Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
      Self::Forbidden(_) | Self::AdminProtected(_) => ErrorKind::Forbidden,
      Self::Published(_) => ErrorKind::InvalidState,
      Self::AlreadySubmitted { .. } => ErrorKind::Conflict,
      Self::Transaction(_) => ErrorKind::Transaction,
    }
  }

  pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }

  pub fn forbidden(msg: impl Into<String>) -> Self { Self::Forbidden(msg.into()) }

  pub fn unauthenticated(msg: impl Into<String>) -> Self {
    Self::Unauthenticated(msg.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Lifts a backend result into the core error type.
///
/// Store backends expose their own error enum; every such enum converts into
/// [`Error`], so services can propagate with `.into_core()?`.
pub trait IntoCore<T> {
  fn into_core(self) -> Result<T>;
}

impl<T, E: Into<Error>> IntoCore<T> for std::result::Result<T, E> {
  fn into_core(self) -> Result<T> { self.map_err(Into::into) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kinds_render_as_stable_snake_case() {
    assert_eq!(ErrorKind::InvalidState.as_ref(), "invalid_state");
    assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
    let kind: &'static str = ErrorKind::Conflict.into();
    assert_eq!(kind, "conflict");
  }

  #[test]
  fn business_errors_map_to_their_kinds() {
    assert_eq!(Error::Published(3).kind(), ErrorKind::InvalidState);
    assert_eq!(
      Error::AlreadySubmitted { questionnaire_id: 1, respondent_id: 2 }.kind(),
      ErrorKind::Conflict
    );
    assert_eq!(Error::AdminProtected(1).kind(), ErrorKind::Forbidden);
    assert_eq!(Error::UsernameTaken("a".into()).kind(), ErrorKind::Validation);
  }

  #[test]
  fn transaction_keeps_the_underlying_reason() {
    let err = Error::Transaction("disk I/O error".into());
    assert_eq!(err.kind(), ErrorKind::Transaction);
    assert_eq!(err.to_string(), "transaction failed: disk I/O error");
  }
}
