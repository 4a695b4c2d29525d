//! Submissions and answers.
//!
//! A submission records that a respondent answered a questionnaire; answers
//! carry the content. An answer row holds no submission reference: the two
//! are related only through `(respondent, question → questionnaire)`.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Submission {
  pub id:               i64,
  pub questionnaire_id: i64,
  #[serde(rename = "user_id")]
  pub respondent_id:    i64,
  pub submitted_at:     DateTime<Utc>,
  /// Diagnostic only.
  pub ip_address:       String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
  pub id:            i64,
  pub question_id:   i64,
  #[serde(rename = "user_id")]
  pub respondent_id: i64,
  pub content:       String,
  pub created_at:    DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAnswer {
  pub question_id: i64,
  pub content:     String,
}

/// Input to [`crate::recorder::Recorder::submit`].
#[derive(Debug, Clone)]
pub struct NewSubmission {
  pub questionnaire_id: i64,
  pub respondent_id:    i64,
  pub origin:           String,
  pub answers:          Vec<NewAnswer>,
}

/// A submission as persisted, with the answers written alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedSubmission {
  pub submission: Submission,
  pub answers:    Vec<Answer>,
}

/// Result of [`crate::recorder::Recorder::has_submitted`].
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionStatus {
  pub has_submitted: bool,
  pub submission:    Option<Submission>,
}

/// A submission row joined with its respondent's username, as listed by the
/// store.
#[derive(Debug, Clone)]
pub struct SubmissionEntry {
  pub submission:      Submission,
  pub respondent_name: Option<String>,
}
