//! The `SurveyStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `canvass-store-sqlite`). Every multi-row write is a single method, and a
//! backend must run it as one transaction: either every row it touches is
//! committed or none is. Business rules that depend on current row state
//! (ownership, publication lock, duplicate submission) are re-checked inside
//! that transaction; the services in this crate check them first only to
//! fail fast with a precise error.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  page::PageRequest,
  principal::{NewPrincipal, Principal, PrincipalUpdate},
  questionnaire::{
    CascadeReport, Question, Questionnaire, QuestionnaireDetail,
    QuestionnaireDraft, QuestionnaireRevision, QuestionnaireSummary, Visibility,
  },
  submission::{
    Answer, NewSubmission, RecordedSubmission, Submission, SubmissionEntry,
  },
};

// ─── Count query ─────────────────────────────────────────────────────────────

/// A single row count, as consumed by [`SurveyStore::tally`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
  Principals,
  Administrators,
  Questionnaires,
  PublishedQuestionnaires,
  Questions,
  Submissions,
  Answers,
  /// Submissions with `submitted_at` strictly after the instant.
  SubmissionsSince(DateTime<Utc>),
  QuestionnairesOwnedBy(i64),
  SubmissionsBy(i64),
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Canvass entity store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait SurveyStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  // ── Principals ────────────────────────────────────────────────────────

  /// Persist a new principal. Fails if the username or email is taken.
  fn add_principal(
    &self,
    input: NewPrincipal,
  ) -> impl Future<Output = Result<Principal, Self::Error>> + Send + '_;

  fn get_principal(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Principal>, Self::Error>> + Send + '_;

  fn find_principal<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<Principal>, Self::Error>> + Send + 'a;

  /// Principals newest first, with the total count.
  fn list_principals(
    &self,
    page: PageRequest,
  ) -> impl Future<Output = Result<(u64, Vec<Principal>), Self::Error>> + Send + '_;

  /// Returns `None` if the principal does not exist.
  fn update_principal(
    &self,
    id: i64,
    update: PrincipalUpdate,
  ) -> impl Future<Output = Result<Option<Principal>, Self::Error>> + Send + '_;

  /// Replace the stored credential hash. Returns `false` if the principal
  /// does not exist.
  fn set_password_hash(
    &self,
    id: i64,
    password_hash: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete a non-administrator principal together with every questionnaire
  /// it owns (full cascade) and every submission and answer it made.
  ///
  /// Fails if the principal is unknown or is an administrator.
  fn delete_principal(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<CascadeReport, Self::Error>> + Send + '_;

  // ── Questionnaires: atomic writes ────────────────────────────────────

  /// Write a questionnaire and all its questions in one transaction.
  ///
  /// Fails if the owner does not exist.
  fn create_questionnaire(
    &self,
    draft: QuestionnaireDraft,
  ) -> impl Future<Output = Result<QuestionnaireDetail, Self::Error>> + Send + '_;

  /// Update scalar fields and fully replace the question set of `id` in one
  /// transaction. Existing submissions and their answers are removed with
  /// the old questions.
  ///
  /// Fails if the questionnaire is missing, is not owned by
  /// `revision.requester_id`, or is published at the time of the write.
  fn replace_questionnaire(
    &self,
    id: i64,
    revision: QuestionnaireRevision,
  ) -> impl Future<Output = Result<QuestionnaireDetail, Self::Error>> + Send + '_;

  /// Set the published flag. Fails if the questionnaire is missing.
  fn set_published(
    &self,
    id: i64,
    published: bool,
  ) -> impl Future<Output = Result<Questionnaire, Self::Error>> + Send + '_;

  /// Delete questions, answers of those questions, submissions, then the
  /// questionnaire itself, in one transaction.
  fn delete_questionnaire(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<CascadeReport, Self::Error>> + Send + '_;

  // ── Questionnaires: reads ────────────────────────────────────────────

  fn get_questionnaire(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Questionnaire>, Self::Error>> + Send + '_;

  /// Questions of a questionnaire ordered by position.
  fn list_questions(
    &self,
    questionnaire_id: i64,
  ) -> impl Future<Output = Result<Vec<Question>, Self::Error>> + Send + '_;

  /// Questionnaires newest first, decorated for listings, with the total
  /// count matching `visibility`.
  fn list_questionnaires(
    &self,
    visibility: Visibility,
    page: PageRequest,
  ) -> impl Future<Output = Result<(u64, Vec<QuestionnaireSummary>), Self::Error>>
  + Send
  + '_;

  // ── Submissions ───────────────────────────────────────────────────────

  /// Write one submission and all its answers in one transaction.
  ///
  /// Fails if the questionnaire is missing, the respondent already has a
  /// submission for it, or an answer names a question of another
  /// questionnaire.
  fn record_submission(
    &self,
    input: NewSubmission,
  ) -> impl Future<Output = Result<RecordedSubmission, Self::Error>> + Send + '_;

  fn find_submission(
    &self,
    questionnaire_id: i64,
    respondent_id: i64,
  ) -> impl Future<Output = Result<Option<Submission>, Self::Error>> + Send + '_;

  /// Submissions of a questionnaire, newest first, with respondent names.
  fn list_submissions(
    &self,
    questionnaire_id: i64,
  ) -> impl Future<Output = Result<Vec<SubmissionEntry>, Self::Error>> + Send + '_;

  /// Every answer whose question belongs to the questionnaire.
  fn answers_for_questionnaire(
    &self,
    questionnaire_id: i64,
  ) -> impl Future<Output = Result<Vec<Answer>, Self::Error>> + Send + '_;

  // ── Counts ────────────────────────────────────────────────────────────

  fn tally(
    &self,
    tally: Tally,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
