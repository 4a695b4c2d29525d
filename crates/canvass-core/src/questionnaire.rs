//! Questionnaires and their ordered questions.
//!
//! A questionnaire owns its questions outright: they are created with it,
//! replaced wholesale when it is edited, and destroyed with it. Once a
//! questionnaire is published its structure is frozen; only the published
//! flag itself may still change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Questionnaire ───────────────────────────────────────────────────────────

/// The open/close window of a questionnaire. Either bound may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
  pub start_time: Option<DateTime<Utc>>,
  pub end_time:   Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Questionnaire {
  pub id:           i64,
  pub title:        String,
  pub description:  String,
  /// Identifier of the owning principal.
  pub created_by:   i64,
  #[serde(flatten)]
  pub window:       TimeWindow,
  pub is_published: bool,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

// ─── Question ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Question {
  pub id:               i64,
  pub questionnaire_id: i64,
  pub title:            String,
  /// Caller-defined kind tag (single choice, free text, rating, ...). Opaque
  /// to the core.
  #[serde(rename = "type")]
  pub kind:             String,
  pub required:         bool,
  /// Serialised choice list. Opaque to the core.
  pub options:          String,
  /// Display position; unique within the questionnaire.
  pub sort:             i64,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

/// A question as supplied by a caller. Its position is not accepted from the
/// caller; it is the index of the question in the submitted sequence.
#[derive(Debug, Clone)]
pub struct NewQuestion {
  pub title:    String,
  pub kind:     String,
  pub required: bool,
  pub options:  String,
}

/// A question with its position assigned, ready to be written.
#[derive(Debug, Clone)]
pub struct QuestionDraft {
  pub position: i64,
  pub title:    String,
  pub kind:     String,
  pub required: bool,
  pub options:  String,
}

impl QuestionDraft {
  /// Assign positions `0..n` in input order.
  pub fn positioned(questions: Vec<NewQuestion>) -> Vec<Self> {
    questions
      .into_iter()
      .enumerate()
      .map(|(i, q)| Self {
        position: i as i64,
        title:    q.title,
        kind:     q.kind,
        required: q.required,
        options:  q.options,
      })
      .collect()
  }
}

// ─── Write inputs ────────────────────────────────────────────────────────────

/// Input to [`crate::lifecycle::Lifecycle::create`].
#[derive(Debug, Clone)]
pub struct CreateQuestionnaire {
  pub owner_id:    i64,
  pub title:       String,
  pub description: String,
  pub window:      TimeWindow,
  pub published:   bool,
  pub questions:   Vec<NewQuestion>,
}

/// Input to [`crate::lifecycle::Lifecycle::update`]. The published flag is
/// deliberately absent: it only changes through `set_published`.
#[derive(Debug, Clone)]
pub struct EditQuestionnaire {
  pub title:       String,
  pub description: String,
  pub window:      TimeWindow,
  pub questions:   Vec<NewQuestion>,
}

/// What the store writes on create: scalar fields plus positioned questions.
#[derive(Debug, Clone)]
pub struct QuestionnaireDraft {
  pub owner_id:    i64,
  pub title:       String,
  pub description: String,
  pub window:      TimeWindow,
  pub published:   bool,
  pub questions:   Vec<QuestionDraft>,
}

/// What the store writes on update: replacement scalars and question set.
#[derive(Debug, Clone)]
pub struct QuestionnaireRevision {
  pub requester_id: i64,
  pub title:        String,
  pub description:  String,
  pub window:       TimeWindow,
  pub questions:    Vec<QuestionDraft>,
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// A questionnaire together with its questions, ordered by position.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionnaireDetail {
  pub questionnaire: Questionnaire,
  pub questions:     Vec<Question>,
}

/// A listing row: the questionnaire decorated with its owner's display name
/// and simple counts.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionnaireSummary {
  #[serde(flatten)]
  pub questionnaire:    Questionnaire,
  /// `None` when the owner no longer resolves.
  pub creator_name:     Option<String>,
  pub question_count:   u64,
  pub submission_count: u64,
}

/// Which questionnaires a listing may include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
  #[default]
  All,
  /// Published questionnaires plus everything owned by this principal.
  PublishedOrOwnedBy(i64),
}

/// Rows removed by a cascading questionnaire delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
  pub questions:   u64,
  pub answers:     u64,
  pub submissions: u64,
}

impl std::ops::AddAssign for CascadeReport {
  fn add_assign(&mut self, rhs: Self) {
    self.questions += rhs.questions;
    self.answers += rhs.answers;
    self.submissions += rhs.submissions;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn q(title: &str) -> NewQuestion {
    NewQuestion {
      title:    title.into(),
      kind:     "text".into(),
      required: false,
      options:  String::new(),
    }
  }

  #[test]
  fn positions_follow_input_order() {
    let drafts = QuestionDraft::positioned(vec![q("c"), q("a"), q("b")]);
    let got: Vec<_> =
      drafts.iter().map(|d| (d.position, d.title.as_str())).collect();
    assert_eq!(got, vec![(0, "c"), (1, "a"), (2, "b")]);
  }
}
