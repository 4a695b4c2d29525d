//! Submission recording and per-questionnaire results.
//!
//! Answers are stored as given: they are not checked against the question's
//! `required` flag or kind tag.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
  Error, IntoCore as _, Result,
  report::{QuestionnaireResults, assemble_results},
  store::SurveyStore,
  submission::{NewSubmission, RecordedSubmission, SubmissionStatus},
};

pub struct Recorder<S> {
  store: Arc<S>,
}

impl<S> Clone for Recorder<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: SurveyStore> Recorder<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Record one respondent's answer set for a questionnaire.
  ///
  /// A second submission for the same `(questionnaire, respondent)` pair is
  /// rejected with [`Error::AlreadySubmitted`], whether the duplicate is
  /// detected by the lookup or by the store's uniqueness constraint.
  pub async fn submit(&self, input: NewSubmission) -> Result<RecordedSubmission> {
    if input.questionnaire_id <= 0 || input.respondent_id <= 0 {
      return Err(Error::validation(format!(
        "invalid questionnaire id or respondent id: {}, {}",
        input.questionnaire_id, input.respondent_id
      )));
    }

    let questionnaire_id = input.questionnaire_id;
    let respondent_id = input.respondent_id;

    if self
      .store
      .get_questionnaire(questionnaire_id)
      .await
      .into_core()?
      .is_none()
    {
      return Err(Error::QuestionnaireNotFound(questionnaire_id));
    }

    let recorded = match self.store.record_submission(input).await.into_core() {
      Ok(r) => r,
      Err(e @ Error::AlreadySubmitted { .. }) => {
        warn!(questionnaire_id, respondent_id, "duplicate submission rejected");
        return Err(e);
      }
      Err(e) => return Err(e),
    };

    info!(
      questionnaire_id,
      respondent_id,
      submission_id = recorded.submission.id,
      answers = recorded.answers.len(),
      "submission recorded"
    );
    Ok(recorded)
  }

  /// Whether the respondent has a submission for the questionnaire.
  pub async fn has_submitted(
    &self,
    questionnaire_id: i64,
    respondent_id: i64,
  ) -> Result<SubmissionStatus> {
    let submission = self
      .store
      .find_submission(questionnaire_id, respondent_id)
      .await
      .into_core()?;
    debug!(
      questionnaire_id,
      respondent_id,
      has_submitted = submission.is_some(),
      "submission status checked"
    );
    Ok(SubmissionStatus { has_submitted: submission.is_some(), submission })
  }

  /// Every submission of the questionnaire with its respondent's answers.
  pub async fn results(&self, questionnaire_id: i64) -> Result<QuestionnaireResults> {
    assemble_results(self.store.as_ref(), questionnaire_id).await
  }
}
