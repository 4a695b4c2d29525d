//! Handlers for `/questionnaire` endpoints other than submissions.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/questionnaire/create` | 201; `created_by` must be the caller |
//! | `GET`    | `/questionnaire/list` | `?page=&page_size=&user_id=` |
//! | `GET`    | `/questionnaire/detail?id=` | 404 if not found |
//! | `PUT`    | `/questionnaire/update` | owner only, unpublished only |
//! | `PUT`    | `/questionnaire/update-status` | owner only |
//! | `DELETE` | `/questionnaire/delete?id=` | owner only; cascades |
//! | `GET`    | `/questionnaire/stats` | public counts |

use axum::{extract::State, response::Response};
use canvass_core::{
  guard::{Capability, authorize},
  questionnaire::{CreateQuestionnaire, EditQuestionnaire, NewQuestion, TimeWindow},
  store::SurveyStore,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
  AppState, envelope,
  error::ApiError,
  extract::{
    CurrentPrincipal, IdParam, JsonBody, PageParams, QueryParams, lenient,
    required_id,
  },
};

// ─── Bodies ──────────────────────────────────────────────────────────────────

/// A question as sent by clients. Any `sort` field is ignored: positions
/// follow the order of the list.
#[derive(Debug, Deserialize)]
pub struct QuestionBody {
  pub title:    String,
  #[serde(rename = "type")]
  pub kind:     String,
  #[serde(default)]
  pub required: bool,
  #[serde(default)]
  pub options:  Value,
}

impl From<QuestionBody> for NewQuestion {
  fn from(q: QuestionBody) -> Self {
    Self {
      title:    q.title,
      kind:     q.kind,
      required: q.required,
      options:  opaque(q.options),
    }
  }
}

/// Store a client-supplied JSON value verbatim: strings as-is, anything else
/// as its JSON text, `null` as empty.
pub(crate) fn opaque(value: Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s,
    other => other.to_string(),
  }
}

fn questions(body: Vec<QuestionBody>) -> Vec<NewQuestion> {
  body.into_iter().map(Into::into).collect()
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub title:        String,
  #[serde(default)]
  pub description:  String,
  pub created_by:   Option<i64>,
  pub start_time:   Option<DateTime<Utc>>,
  pub end_time:     Option<DateTime<Utc>>,
  #[serde(default)]
  pub is_published: bool,
  #[serde(default)]
  pub questions:    Vec<QuestionBody>,
}

/// `POST /questionnaire/create`
pub async fn create<S: SurveyStore>(
  State(state): State<AppState<S>>,
  CurrentPrincipal(principal): CurrentPrincipal,
  JsonBody(body): JsonBody<CreateBody>,
) -> Result<Response, ApiError> {
  let owner_id = body.created_by.unwrap_or(principal.id);
  authorize(&principal, Capability::Author { owner: owner_id })?;

  let detail = state
    .lifecycle
    .create(CreateQuestionnaire {
      owner_id,
      title: body.title,
      description: body.description,
      window: TimeWindow { start_time: body.start_time, end_time: body.end_time },
      published: body.is_published,
      questions: questions(body.questions),
    })
    .await?;
  Ok(envelope::created("questionnaire created", detail))
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListHint {
  pub user_id: Option<String>,
}

/// `GET /questionnaire/list[?page=&page_size=&user_id=]`
pub async fn list<S: SurveyStore>(
  State(state): State<AppState<S>>,
  QueryParams(paging): QueryParams<PageParams>,
  QueryParams(hint): QueryParams<ListHint>,
) -> Result<Response, ApiError> {
  let page = state
    .lifecycle
    .list(lenient(&hint.user_id), paging.request())
    .await?;
  Ok(envelope::listing("questionnaires", page))
}

// ─── Detail ──────────────────────────────────────────────────────────────────

/// `GET /questionnaire/detail?id=`
pub async fn detail<S: SurveyStore>(
  State(state): State<AppState<S>>,
  QueryParams(params): QueryParams<IdParam>,
) -> Result<Response, ApiError> {
  let id = required_id(&params.id, "questionnaire id")?;
  let detail = state.lifecycle.get(id).await?;
  Ok(envelope::ok("questionnaire", detail))
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub id:          i64,
  pub title:       String,
  #[serde(default)]
  pub description: String,
  pub start_time:  Option<DateTime<Utc>>,
  pub end_time:    Option<DateTime<Utc>>,
  #[serde(default)]
  pub questions:   Vec<QuestionBody>,
}

/// `PUT /questionnaire/update`
///
/// Any `is_published` in the body is ignored; publication only changes
/// through `update-status`.
pub async fn update<S: SurveyStore>(
  State(state): State<AppState<S>>,
  CurrentPrincipal(principal): CurrentPrincipal,
  JsonBody(body): JsonBody<UpdateBody>,
) -> Result<Response, ApiError> {
  let detail = state
    .lifecycle
    .update(body.id, principal.id, EditQuestionnaire {
      title:       body.title,
      description: body.description,
      window:      TimeWindow {
        start_time: body.start_time,
        end_time:   body.end_time,
      },
      questions:   questions(body.questions),
    })
    .await?;
  Ok(envelope::ok("questionnaire updated", detail))
}

// ─── Publication ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub id:           i64,
  pub is_published: bool,
}

/// `PUT /questionnaire/update-status`
pub async fn update_status<S: SurveyStore>(
  State(state): State<AppState<S>>,
  CurrentPrincipal(principal): CurrentPrincipal,
  JsonBody(body): JsonBody<StatusBody>,
) -> Result<Response, ApiError> {
  let current = state.lifecycle.questionnaire(body.id).await?;
  authorize(&principal, Capability::Edit { owner: current.created_by })?;
  let questionnaire =
    state.lifecycle.set_published(body.id, body.is_published).await?;
  Ok(envelope::ok("publication state updated", questionnaire))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /questionnaire/delete?id=`
pub async fn remove<S: SurveyStore>(
  State(state): State<AppState<S>>,
  CurrentPrincipal(principal): CurrentPrincipal,
  QueryParams(params): QueryParams<IdParam>,
) -> Result<Response, ApiError> {
  let id = required_id(&params.id, "questionnaire id")?;
  let current = state.lifecycle.questionnaire(id).await?;
  authorize(&principal, Capability::Edit { owner: current.created_by })?;
  let removed = state.lifecycle.delete(id).await?;
  Ok(envelope::ok("questionnaire deleted", removed))
}

// ─── Public ──────────────────────────────────────────────────────────────────

/// `GET /questionnaire/stats`
pub async fn stats<S: SurveyStore>(
  State(state): State<AppState<S>>,
) -> Response {
  envelope::ok("statistics", state.reports.public_stats().await)
}

/// `GET /health`
pub async fn health() -> Response {
  envelope::ok("ok", json!({ "status": "up" }))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn options_are_kept_verbatim() {
    assert_eq!(opaque(Value::Null), "");
    assert_eq!(opaque(json!("[\"a\",\"b\"]")), "[\"a\",\"b\"]");
    assert_eq!(opaque(json!(["a", "b"])), "[\"a\",\"b\"]");
    assert_eq!(opaque(json!(3)), "3");
  }
}
