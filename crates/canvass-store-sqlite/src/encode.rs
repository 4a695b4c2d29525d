//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with microsecond
//! precision and a `Z` suffix, so string order is chronological order. Rows
//! are first read into `Raw*` structs on the connection thread and decoded
//! afterwards.

use canvass_core::{
  principal::Principal,
  questionnaire::{Question, Questionnaire, QuestionnaireSummary, TimeWindow},
  submission::{Answer, Submission, SubmissionEntry},
};
use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current instant at the precision the store keeps.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

fn count(n: i64) -> u64 { u64::try_from(n).unwrap_or_default() }

// ─── Column lists ────────────────────────────────────────────────────────────

pub const PRINCIPAL_COLUMNS: &str =
  "id, username, password_hash, email, phone, is_admin, created_at, updated_at";

pub const QUESTIONNAIRE_COLUMNS: &str = "q.id, q.title, q.description, \
   q.created_by, q.start_time, q.end_time, q.is_published, q.created_at, \
   q.updated_at";

pub const QUESTION_COLUMNS: &str = "id, questionnaire_id, title, kind, \
   required, options, sort, created_at, updated_at";

pub const SUBMISSION_COLUMNS: &str =
  "s.id, s.questionnaire_id, s.user_id, s.submitted_at, s.ip_address";

pub const ANSWER_COLUMNS: &str =
  "a.id, a.question_id, a.user_id, a.content, a.created_at";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `principals` row.
pub struct RawPrincipal {
  pub id:            i64,
  pub username:      String,
  pub password_hash: String,
  pub email:         Option<String>,
  pub phone:         Option<String>,
  pub is_admin:      bool,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawPrincipal {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      username:      row.get(1)?,
      password_hash: row.get(2)?,
      email:         row.get(3)?,
      phone:         row.get(4)?,
      is_admin:      row.get(5)?,
      created_at:    row.get(6)?,
      updated_at:    row.get(7)?,
    })
  }

  pub fn into_principal(self) -> Result<Principal> {
    Ok(Principal {
      id:            self.id,
      username:      self.username,
      password_hash: self.password_hash,
      email:         self.email,
      phone:         self.phone,
      is_admin:      self.is_admin,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values of a `questionnaires` row, selected with
/// [`QUESTIONNAIRE_COLUMNS`].
pub struct RawQuestionnaire {
  pub id:           i64,
  pub title:        String,
  pub description:  String,
  pub created_by:   i64,
  pub start_time:   Option<String>,
  pub end_time:     Option<String>,
  pub is_published: bool,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawQuestionnaire {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      title:        row.get(1)?,
      description:  row.get(2)?,
      created_by:   row.get(3)?,
      start_time:   row.get(4)?,
      end_time:     row.get(5)?,
      is_published: row.get(6)?,
      created_at:   row.get(7)?,
      updated_at:   row.get(8)?,
    })
  }

  pub fn into_questionnaire(self) -> Result<Questionnaire> {
    Ok(Questionnaire {
      id:           self.id,
      title:        self.title,
      description:  self.description,
      created_by:   self.created_by,
      window:       TimeWindow {
        start_time: decode_opt_dt(self.start_time.as_deref())?,
        end_time:   decode_opt_dt(self.end_time.as_deref())?,
      },
      is_published: self.is_published,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

/// A listing row: questionnaire columns followed by the owner's username and
/// the question and submission counts.
pub struct RawSummary {
  pub questionnaire:    RawQuestionnaire,
  pub creator_name:     Option<String>,
  pub question_count:   i64,
  pub submission_count: i64,
}

impl RawSummary {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      questionnaire:    RawQuestionnaire::from_row(row)?,
      creator_name:     row.get(9)?,
      question_count:   row.get(10)?,
      submission_count: row.get(11)?,
    })
  }

  pub fn into_summary(self) -> Result<QuestionnaireSummary> {
    Ok(QuestionnaireSummary {
      questionnaire:    self.questionnaire.into_questionnaire()?,
      creator_name:     self.creator_name,
      question_count:   count(self.question_count),
      submission_count: count(self.submission_count),
    })
  }
}

pub struct RawQuestion {
  pub id:               i64,
  pub questionnaire_id: i64,
  pub title:            String,
  pub kind:             String,
  pub required:         bool,
  pub options:          String,
  pub sort:             i64,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawQuestion {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:               row.get(0)?,
      questionnaire_id: row.get(1)?,
      title:            row.get(2)?,
      kind:             row.get(3)?,
      required:         row.get(4)?,
      options:          row.get(5)?,
      sort:             row.get(6)?,
      created_at:       row.get(7)?,
      updated_at:       row.get(8)?,
    })
  }

  pub fn into_question(self) -> Result<Question> {
    Ok(Question {
      id:               self.id,
      questionnaire_id: self.questionnaire_id,
      title:            self.title,
      kind:             self.kind,
      required:         self.required,
      options:          self.options,
      sort:             self.sort,
      created_at:       decode_dt(&self.created_at)?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawSubmission {
  pub id:               i64,
  pub questionnaire_id: i64,
  pub user_id:          i64,
  pub submitted_at:     String,
  pub ip_address:       String,
}

impl RawSubmission {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:               row.get(0)?,
      questionnaire_id: row.get(1)?,
      user_id:          row.get(2)?,
      submitted_at:     row.get(3)?,
      ip_address:       row.get(4)?,
    })
  }

  pub fn into_submission(self) -> Result<Submission> {
    Ok(Submission {
      id:               self.id,
      questionnaire_id: self.questionnaire_id,
      respondent_id:    self.user_id,
      submitted_at:     decode_dt(&self.submitted_at)?,
      ip_address:       self.ip_address,
    })
  }
}

/// A submission row followed by the respondent's username.
pub struct RawSubmissionEntry {
  pub submission:      RawSubmission,
  pub respondent_name: Option<String>,
}

impl RawSubmissionEntry {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      submission:      RawSubmission::from_row(row)?,
      respondent_name: row.get(5)?,
    })
  }

  pub fn into_entry(self) -> Result<SubmissionEntry> {
    Ok(SubmissionEntry {
      submission:      self.submission.into_submission()?,
      respondent_name: self.respondent_name,
    })
  }
}

pub struct RawAnswer {
  pub id:          i64,
  pub question_id: i64,
  pub user_id:     i64,
  pub content:     String,
  pub created_at:  String,
}

impl RawAnswer {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      question_id: row.get(1)?,
      user_id:     row.get(2)?,
      content:     row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_answer(self) -> Result<Answer> {
    Ok(Answer {
      id:            self.id,
      question_id:   self.question_id,
      respondent_id: self.user_id,
      content:       self.content,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  #[test]
  fn timestamps_are_fixed_width_and_sortable() {
    let a = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let b = a + chrono::Duration::microseconds(1);
    let (ea, eb) = (encode_dt(a), encode_dt(b));
    assert_eq!(ea, "2024-01-02T03:04:05.000000Z");
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn garbage_timestamp_is_a_parse_error() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }
}
