//! Questionnaire lifecycle: create, edit, publish, delete.
//!
//! Each write is one store transaction. The checks performed here (input
//! shape, existence, ownership, publication lock) make rejections precise
//! and cheap; the store repeats the state-dependent ones inside the write
//! transaction, so a publish that lands between this pre-check and the write
//! still turns the edit into `InvalidState`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
  Error, IntoCore as _, Result,
  page::{Page, PageRequest},
  questionnaire::{
    CascadeReport, CreateQuestionnaire, EditQuestionnaire, Questionnaire,
    QuestionDraft, QuestionnaireDetail, QuestionnaireDraft,
    QuestionnaireRevision, QuestionnaireSummary, Visibility,
  },
  store::SurveyStore,
};

const NO_QUESTIONS: &str = "at least one question required";

pub struct Lifecycle<S> {
  store: Arc<S>,
}

impl<S> Clone for Lifecycle<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: SurveyStore> Lifecycle<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Create a questionnaire with its questions. Question positions are the
  /// input indices.
  pub async fn create(
    &self,
    input: CreateQuestionnaire,
  ) -> Result<QuestionnaireDetail> {
    if input.owner_id <= 0 {
      return Err(Error::validation(format!(
        "invalid owner id: {}",
        input.owner_id
      )));
    }
    if input.questions.is_empty() {
      return Err(Error::validation(NO_QUESTIONS));
    }
    if self.store.get_principal(input.owner_id).await.into_core()?.is_none() {
      return Err(unknown_owner(input.owner_id));
    }

    let draft = QuestionnaireDraft {
      owner_id:    input.owner_id,
      title:       input.title,
      description: input.description,
      window:      input.window,
      published:   input.published,
      questions:   QuestionDraft::positioned(input.questions),
    };

    let detail = self
      .store
      .create_questionnaire(draft)
      .await
      .into_core()
      .map_err(|e| match e {
        Error::PrincipalNotFound(id) => unknown_owner(id),
        other => other,
      })?;

    info!(
      questionnaire_id = detail.questionnaire.id,
      owner_id = detail.questionnaire.created_by,
      questions = detail.questions.len(),
      "questionnaire created"
    );
    Ok(detail)
  }

  /// Replace the scalar fields and the whole question set of an unpublished
  /// questionnaire. Only the owner may edit; there is no administrator
  /// override on this path.
  pub async fn update(
    &self,
    id: i64,
    requester_id: i64,
    edit: EditQuestionnaire,
  ) -> Result<QuestionnaireDetail> {
    if edit.questions.is_empty() {
      return Err(Error::validation(NO_QUESTIONS));
    }

    let current = self.questionnaire(id).await?;
    if current.created_by != requester_id {
      warn!(
        questionnaire_id = id,
        requester_id,
        owner_id = current.created_by,
        "edit rejected: not the owner"
      );
      return Err(not_owner(id));
    }
    if current.is_published {
      warn!(questionnaire_id = id, "edit rejected: questionnaire is published");
      return Err(Error::Published(id));
    }

    let revision = QuestionnaireRevision {
      requester_id,
      title: edit.title,
      description: edit.description,
      window: edit.window,
      questions: QuestionDraft::positioned(edit.questions),
    };

    let detail = self
      .store
      .replace_questionnaire(id, revision)
      .await
      .into_core()
      .map_err(|e| match e {
        Error::Forbidden(_) => not_owner(id),
        other => other,
      })?;

    info!(
      questionnaire_id = id,
      questions = detail.questions.len(),
      "questionnaire updated"
    );
    Ok(detail)
  }

  /// Toggle publication. Always permitted, idempotent, and never touches the
  /// question set.
  pub async fn set_published(
    &self,
    id: i64,
    published: bool,
  ) -> Result<Questionnaire> {
    let questionnaire =
      self.store.set_published(id, published).await.into_core()?;
    info!(questionnaire_id = id, published, "publication state changed");
    Ok(questionnaire)
  }

  /// Delete a questionnaire with its questions, their answers, and its
  /// submissions, atomically.
  pub async fn delete(&self, id: i64) -> Result<CascadeReport> {
    let report = self.store.delete_questionnaire(id).await.into_core()?;
    info!(
      questionnaire_id = id,
      questions = report.questions,
      answers = report.answers,
      submissions = report.submissions,
      "questionnaire deleted"
    );
    Ok(report)
  }

  pub async fn get(&self, id: i64) -> Result<QuestionnaireDetail> {
    let questionnaire = self.questionnaire(id).await?;
    let questions = self.store.list_questions(id).await.into_core()?;
    Ok(QuestionnaireDetail { questionnaire, questions })
  }

  /// List questionnaires, newest first. With a requester hint, only those
  /// that are published or owned by the requester are included.
  pub async fn list(
    &self,
    requester: Option<i64>,
    page: PageRequest,
  ) -> Result<Page<QuestionnaireSummary>> {
    let visibility = requester
      .filter(|id| *id > 0)
      .map(Visibility::PublishedOrOwnedBy)
      .unwrap_or_default();
    let (total, items) = self
      .store
      .list_questionnaires(visibility, page)
      .await
      .into_core()?;
    debug!(?visibility, total, returned = items.len(), "questionnaires listed");
    Ok(page.into_page(total, items))
  }

  /// The questionnaire row alone, without its questions.
  pub async fn questionnaire(&self, id: i64) -> Result<Questionnaire> {
    self
      .store
      .get_questionnaire(id)
      .await
      .into_core()?
      .ok_or(Error::QuestionnaireNotFound(id))
  }
}

fn unknown_owner(id: i64) -> Error {
  Error::validation(format!("invalid owner id: {id} is not a known principal"))
}

fn not_owner(id: i64) -> Error {
  Error::forbidden(format!("only the owner may edit questionnaire {id}"))
}
