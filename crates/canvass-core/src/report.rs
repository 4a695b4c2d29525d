//! Read-only aggregates: listings, result sets, and system-wide counts.
//!
//! Counts are best-effort. A count query that fails is logged and reported
//! as zero so a dashboard stays available while the store is degraded.

use std::{
  collections::{HashMap, HashSet},
  sync::Arc,
};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::warn;

use crate::{
  Error, IntoCore as _, Result,
  page::{Page, PageRequest},
  questionnaire::{Question, Questionnaire, QuestionnaireSummary, Visibility},
  store::{SurveyStore, Tally},
  submission::{Answer, Submission, SubmissionEntry},
};

/// Width of the "recent submissions" window.
pub const RECENT_WINDOW_DAYS: i64 = 7;

// ─── Result sets ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Respondent {
  pub id:       i64,
  pub username: Option<String>,
}

/// One submission with the answers its respondent gave to this
/// questionnaire's questions.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResult {
  pub submission: Submission,
  #[serde(rename = "user")]
  pub respondent: Respondent,
  pub answers:    Vec<Answer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionnaireResults {
  pub questionnaire:     Questionnaire,
  pub questions:         Vec<Question>,
  pub submissions:       Vec<SubmissionResult>,
  pub total_submissions: usize,
}

/// Pair each submission with its respondent's answers.
///
/// An answer belongs to a submission when its question is one of
/// `questions` and its respondent is the submission's respondent. Answers
/// are not linked to submissions in storage, so this is always a
/// set-intersection over the question ids.
pub fn reconstruct(
  questions: &[Question],
  submissions: Vec<SubmissionEntry>,
  answers: Vec<Answer>,
) -> Vec<SubmissionResult> {
  let question_ids: HashSet<i64> = questions.iter().map(|q| q.id).collect();

  let mut by_respondent: HashMap<i64, Vec<Answer>> = HashMap::new();
  for answer in answers {
    if question_ids.contains(&answer.question_id) {
      by_respondent.entry(answer.respondent_id).or_default().push(answer);
    }
  }

  submissions
    .into_iter()
    .map(|entry| {
      let respondent_id = entry.submission.respondent_id;
      let mut answers = by_respondent.remove(&respondent_id).unwrap_or_default();
      answers.sort_by_key(|a| a.id);
      SubmissionResult {
        submission: entry.submission,
        respondent: Respondent {
          id:       respondent_id,
          username: entry.respondent_name,
        },
        answers,
      }
    })
    .collect()
}

/// Load and assemble the result set of one questionnaire.
pub(crate) async fn assemble_results<S: SurveyStore>(
  store: &S,
  questionnaire_id: i64,
) -> Result<QuestionnaireResults> {
  let questionnaire = store
    .get_questionnaire(questionnaire_id)
    .await
    .into_core()?
    .ok_or(Error::QuestionnaireNotFound(questionnaire_id))?;
  let questions = store.list_questions(questionnaire_id).await.into_core()?;
  let submissions = store.list_submissions(questionnaire_id).await.into_core()?;
  let answers = store
    .answers_for_questionnaire(questionnaire_id)
    .await
    .into_core()?;

  let submissions = reconstruct(&questions, submissions, answers);
  Ok(QuestionnaireResults {
    questionnaire,
    questions,
    total_submissions: submissions.len(),
    submissions,
  })
}

// ─── Statistics ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UserStatistics {
  pub total_users:  u64,
  pub admin_users:  u64,
  pub normal_users: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuestionnaireStatistics {
  pub total_questionnaires:       u64,
  pub published_questionnaires:   u64,
  pub unpublished_questionnaires: u64,
  pub total_questions:            u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubmissionStatistics {
  pub total_submissions:              u64,
  pub total_answers:                  u64,
  pub recent_submissions:             u64,
  pub average_answers_per_submission: f64,
}

/// System-wide counts for the administrator dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemStats {
  pub user_statistics:          UserStatistics,
  pub questionnaire_statistics: QuestionnaireStatistics,
  pub submission_statistics:    SubmissionStatistics,
}

/// The raw counts behind [`SystemStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
  pub principals:               u64,
  pub administrators:           u64,
  pub questionnaires:           u64,
  pub published_questionnaires: u64,
  pub questions:                u64,
  pub submissions:              u64,
  pub answers:                  u64,
  pub recent_submissions:       u64,
}

impl From<Counts> for SystemStats {
  fn from(c: Counts) -> Self {
    SystemStats {
      user_statistics:          UserStatistics {
        total_users:  c.principals,
        admin_users:  c.administrators,
        normal_users: c.principals.saturating_sub(c.administrators),
      },
      questionnaire_statistics: QuestionnaireStatistics {
        total_questionnaires:       c.questionnaires,
        published_questionnaires:   c.published_questionnaires,
        unpublished_questionnaires: c
          .questionnaires
          .saturating_sub(c.published_questionnaires),
        total_questions:            c.questions,
      },
      submission_statistics:    SubmissionStatistics {
        total_submissions:              c.submissions,
        total_answers:                  c.answers,
        recent_submissions:             c.recent_submissions,
        average_answers_per_submission: answers_per_submission(
          c.answers,
          c.submissions,
        ),
      },
    }
  }
}

/// Mean answers per submission; zero when there are no submissions.
pub fn answers_per_submission(answers: u64, submissions: u64) -> f64 {
  if submissions == 0 {
    0.0
  } else {
    answers as f64 / submissions as f64
  }
}

/// The unauthenticated dashboard summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PublicStats {
  pub user_count:          u64,
  pub questionnaire_count: u64,
  pub submission_count:    u64,
}

// ─── Aggregator ──────────────────────────────────────────────────────────────

pub struct Reports<S> {
  store: Arc<S>,
}

impl<S> Clone for Reports<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: SurveyStore> Reports<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// All questionnaires, newest first, with owner names and counts.
  pub async fn questionnaires(
    &self,
    page: PageRequest,
  ) -> Result<Page<QuestionnaireSummary>> {
    let (total, items) = self
      .store
      .list_questionnaires(Visibility::All, page)
      .await
      .into_core()?;
    Ok(page.into_page(total, items))
  }

  /// Per-questionnaire submission detail with respondent names and answers.
  pub async fn submission_details(
    &self,
    questionnaire_id: i64,
  ) -> Result<QuestionnaireResults> {
    assemble_results(self.store.as_ref(), questionnaire_id).await
  }

  pub async fn system_stats(&self, now: DateTime<Utc>) -> SystemStats {
    let since = now - Duration::days(RECENT_WINDOW_DAYS);
    let counts = Counts {
      principals:               self.count(Tally::Principals).await,
      administrators:           self.count(Tally::Administrators).await,
      questionnaires:           self.count(Tally::Questionnaires).await,
      published_questionnaires: self
        .count(Tally::PublishedQuestionnaires)
        .await,
      questions:                self.count(Tally::Questions).await,
      submissions:              self.count(Tally::Submissions).await,
      answers:                  self.count(Tally::Answers).await,
      recent_submissions:       self.count(Tally::SubmissionsSince(since)).await,
    };
    counts.into()
  }

  pub async fn public_stats(&self) -> PublicStats {
    PublicStats {
      user_count:          self.count(Tally::Principals).await,
      questionnaire_count: self.count(Tally::Questionnaires).await,
      submission_count:    self.count(Tally::Submissions).await,
    }
  }

  /// A count that degrades to zero on failure.
  pub async fn count(&self, tally: Tally) -> u64 {
    match self.store.tally(tally).await {
      Ok(n) => n,
      Err(e) => {
        warn!(?tally, error = %e, "count query failed; reporting zero");
        0
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  fn question(id: i64, questionnaire_id: i64) -> Question {
    Question {
      id,
      questionnaire_id,
      title: format!("q{id}"),
      kind: "text".into(),
      required: false,
      options: String::new(),
      sort: id,
      created_at: at(0),
      updated_at: at(0),
    }
  }

  fn entry(id: i64, respondent_id: i64, name: &str) -> SubmissionEntry {
    SubmissionEntry {
      submission:      Submission {
        id,
        questionnaire_id: 1,
        respondent_id,
        submitted_at: at(id),
        ip_address: "127.0.0.1".into(),
      },
      respondent_name: Some(name.into()),
    }
  }

  fn answer(id: i64, question_id: i64, respondent_id: i64) -> Answer {
    Answer {
      id,
      question_id,
      respondent_id,
      content: format!("a{id}"),
      created_at: at(id),
    }
  }

  #[test]
  fn answers_are_matched_by_respondent_and_question_set() {
    let questions = vec![question(10, 1), question(11, 1)];
    let submissions = vec![entry(1, 42, "alice"), entry(2, 43, "bob")];
    let answers = vec![
      answer(100, 10, 42),
      answer(101, 11, 42),
      answer(102, 10, 43),
      // A question of some other questionnaire.
      answer(103, 99, 42),
      // A respondent without a submission here.
      answer(104, 10, 44),
    ];

    let results = reconstruct(&questions, submissions, answers);
    assert_eq!(results.len(), 2);

    let alice: Vec<_> = results[0].answers.iter().map(|a| a.id).collect();
    assert_eq!(alice, vec![100, 101]);
    assert_eq!(results[0].respondent.username.as_deref(), Some("alice"));

    let bob: Vec<_> = results[1].answers.iter().map(|a| a.id).collect();
    assert_eq!(bob, vec![102]);
  }

  #[test]
  fn submission_without_answers_gets_an_empty_list() {
    let results =
      reconstruct(&[question(10, 1)], vec![entry(1, 42, "alice")], vec![]);
    assert_eq!(results.len(), 1);
    assert!(results[0].answers.is_empty());
  }

  #[test]
  fn ratio_is_zero_without_submissions() {
    assert_eq!(answers_per_submission(0, 0), 0.0);
    assert_eq!(answers_per_submission(12, 0), 0.0);
    assert_eq!(answers_per_submission(9, 3), 3.0);
  }

  #[test]
  fn derived_counts_saturate() {
    let stats = SystemStats::from(Counts {
      principals: 5,
      administrators: 2,
      questionnaires: 1,
      published_questionnaires: 3,
      ..Counts::default()
    });
    assert_eq!(stats.user_statistics.normal_users, 3);
    assert_eq!(stats.questionnaire_statistics.unpublished_questionnaires, 0);
    assert_eq!(stats.submission_statistics.average_answers_per_submission, 0.0);
    assert!(!stats.submission_statistics.average_answers_per_submission.is_nan());
  }
}
