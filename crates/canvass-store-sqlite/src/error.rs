//! Error type for `canvass-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("questionnaire not found: {0}")]
  QuestionnaireNotFound(i64),

  #[error("principal not found: {0}")]
  PrincipalNotFound(i64),

  #[error("principal {requester_id} does not own questionnaire {questionnaire_id}")]
  NotOwner {
    questionnaire_id: i64,
    requester_id:     i64,
  },

  #[error("questionnaire {0} is published")]
  Published(i64),

  #[error(
    "duplicate submission for questionnaire {questionnaire_id} by {respondent_id}"
  )]
  DuplicateSubmission {
    questionnaire_id: i64,
    respondent_id:    i64,
  },

  #[error("question {question_id} is not part of questionnaire {questionnaire_id}")]
  ForeignQuestion {
    questionnaire_id: i64,
    question_id:      i64,
  },

  #[error("username already exists: {0}")]
  UsernameTaken(String),

  #[error("email already exists: {0}")]
  EmailTaken(String),

  #[error("administrator {0} cannot be deleted")]
  AdminProtected(i64),
}

impl Error {
  /// `SQLITE_BUSY` or `SQLITE_LOCKED`: another connection holds the lock and
  /// the unit of work may succeed if repeated.
  pub fn is_transient(&self) -> bool {
    match self {
      Self::Database(tokio_rusqlite::Error::Rusqlite(e)) => is_busy(e),
      _ => false,
    }
  }
}

pub(crate) fn is_busy(e: &rusqlite::Error) -> bool {
  matches!(
    e.sqlite_error_code(),
    Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
  )
}

pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

impl From<Error> for canvass_core::Error {
  fn from(e: Error) -> Self {
    use canvass_core::Error as Core;
    match e {
      Error::QuestionnaireNotFound(id) => Core::QuestionnaireNotFound(id),
      Error::PrincipalNotFound(id) => Core::PrincipalNotFound(id),
      Error::NotOwner { questionnaire_id, .. } => Core::forbidden(format!(
        "only the owner may edit questionnaire {questionnaire_id}"
      )),
      Error::Published(id) => Core::Published(id),
      Error::DuplicateSubmission { questionnaire_id, respondent_id } => {
        Core::AlreadySubmitted { questionnaire_id, respondent_id }
      }
      e @ Error::ForeignQuestion { .. } => Core::validation(e.to_string()),
      Error::UsernameTaken(name) => Core::UsernameTaken(name),
      Error::EmailTaken(email) => Core::EmailTaken(email),
      Error::AdminProtected(id) => Core::AdminProtected(id),
      e @ (Error::Database(_) | Error::DateParse(_)) => {
        Core::Transaction(Box::new(e))
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
