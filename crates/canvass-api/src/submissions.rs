//! Handlers for submitting to and reading results of a questionnaire.

use axum::{extract::State, response::Response};
use canvass_core::{
  guard::{Capability, authorize},
  store::SurveyStore,
  submission::{NewAnswer, NewSubmission},
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
  AppState, envelope,
  error::ApiError,
  extract::{
    ClientAddr, CurrentPrincipal, IdParam, JsonBody, QueryParams, lenient,
    required_id,
  },
  questionnaires::opaque,
};

// ─── Submit ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnswerBody {
  pub question_id: i64,
  #[serde(default)]
  pub content:     Value,
}

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
  pub questionnaire_id: i64,
  pub user_id:          Option<i64>,
  #[serde(default)]
  pub answers:          Vec<AnswerBody>,
}

/// `POST /questionnaire/submit`
pub async fn submit<S: SurveyStore>(
  State(state): State<AppState<S>>,
  CurrentPrincipal(principal): CurrentPrincipal,
  ClientAddr(origin): ClientAddr,
  JsonBody(body): JsonBody<SubmitBody>,
) -> Result<Response, ApiError> {
  let respondent_id = body.user_id.unwrap_or(principal.id);
  authorize(&principal, Capability::Respond { respondent: respondent_id })?;

  let answers = body
    .answers
    .into_iter()
    .map(|a| NewAnswer { question_id: a.question_id, content: opaque(a.content) })
    .collect();
  let recorded = state
    .recorder
    .submit(NewSubmission {
      questionnaire_id: body.questionnaire_id,
      respondent_id,
      origin,
      answers,
    })
    .await?;
  Ok(envelope::created("submission recorded", recorded))
}

// ─── Check ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CheckParams {
  pub questionnaire_id: Option<String>,
  pub user_id:          Option<String>,
}

/// `GET /questionnaire/check-submission?questionnaire_id=`
///
/// Always answers for the caller; a `user_id` naming anyone else is
/// forbidden.
pub async fn check<S: SurveyStore>(
  State(state): State<AppState<S>>,
  CurrentPrincipal(principal): CurrentPrincipal,
  QueryParams(params): QueryParams<CheckParams>,
) -> Result<Response, ApiError> {
  let questionnaire_id =
    required_id(&params.questionnaire_id, "questionnaire id")?;
  if let Some(respondent) = lenient(&params.user_id) {
    authorize(&principal, Capability::Respond { respondent })?;
  }
  let status = state
    .recorder
    .has_submitted(questionnaire_id, principal.id)
    .await?;
  Ok(envelope::ok("submission status", status))
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// `GET /questionnaire/results?id=`
pub async fn results<S: SurveyStore>(
  State(state): State<AppState<S>>,
  CurrentPrincipal(principal): CurrentPrincipal,
  QueryParams(params): QueryParams<IdParam>,
) -> Result<Response, ApiError> {
  let id = required_id(&params.id, "questionnaire id")?;
  let owner = state.lifecycle.questionnaire(id).await?.created_by;
  authorize(&principal, Capability::ViewResults { owner })?;
  let results = state.recorder.results(id).await?;
  Ok(envelope::ok("questionnaire results", results))
}
