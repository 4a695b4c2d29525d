//! Handlers for `/admin` endpoints. Every handler takes an [`Administrator`],
//! so non-administrators are refused before any work is done.

use axum::{extract::State, response::Response};
use canvass_core::{principal::PrincipalUpdate, store::SurveyStore};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::{
  AppState, envelope,
  error::ApiError,
  extract::{
    Administrator, IdParam, JsonBody, PageParams, QueryParams, required_id,
  },
};

// ─── Principals ──────────────────────────────────────────────────────────────

/// `GET /admin/users[?page=&page_size=]`
pub async fn users<S: SurveyStore>(
  State(state): State<AppState<S>>,
  _: Administrator,
  QueryParams(paging): QueryParams<PageParams>,
) -> Result<Response, ApiError> {
  let page = state.directory.list(paging.request()).await?;
  Ok(envelope::listing("users", page))
}

/// `GET /admin/user/detail?id=`
pub async fn user_detail<S: SurveyStore>(
  State(state): State<AppState<S>>,
  _: Administrator,
  QueryParams(params): QueryParams<IdParam>,
) -> Result<Response, ApiError> {
  let id = required_id(&params.id, "user id")?;
  let detail = state.directory.detail(id).await?;
  Ok(envelope::ok("user", detail))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserBody {
  pub id:       i64,
  pub email:    Option<String>,
  pub phone:    Option<String>,
  /// Left unchanged when absent.
  pub is_admin: Option<bool>,
}

/// `PUT /admin/user/update`
pub async fn update_user<S: SurveyStore>(
  State(state): State<AppState<S>>,
  Administrator(admin): Administrator,
  JsonBody(body): JsonBody<UpdateUserBody>,
) -> Result<Response, ApiError> {
  let is_admin = match body.is_admin {
    Some(flag) => flag,
    None => state.directory.principal(body.id).await?.is_admin,
  };
  let principal = state
    .directory
    .update(body.id, PrincipalUpdate {
      email: body.email,
      phone: body.phone,
      is_admin,
    })
    .await?;
  info!(admin_id = admin.id, principal_id = body.id, "user updated by admin");
  Ok(envelope::ok("user updated", principal))
}

/// `DELETE /admin/user/delete?id=`
pub async fn delete_user<S: SurveyStore>(
  State(state): State<AppState<S>>,
  Administrator(admin): Administrator,
  QueryParams(params): QueryParams<IdParam>,
) -> Result<Response, ApiError> {
  let id = required_id(&params.id, "user id")?;
  let removed = state.directory.delete(id).await?;
  info!(admin_id = admin.id, principal_id = id, "user deleted by admin");
  Ok(envelope::ok("user deleted", removed))
}

// ─── Questionnaires ──────────────────────────────────────────────────────────

/// `GET /admin/questionnaires[?page=&page_size=]`
pub async fn questionnaires<S: SurveyStore>(
  State(state): State<AppState<S>>,
  _: Administrator,
  QueryParams(paging): QueryParams<PageParams>,
) -> Result<Response, ApiError> {
  let page = state.reports.questionnaires(paging.request()).await?;
  Ok(envelope::listing("questionnaires", page))
}

/// `GET /admin/questionnaire/submissions?id=`
pub async fn submissions<S: SurveyStore>(
  State(state): State<AppState<S>>,
  _: Administrator,
  QueryParams(params): QueryParams<IdParam>,
) -> Result<Response, ApiError> {
  let id = required_id(&params.id, "questionnaire id")?;
  let details = state.reports.submission_details(id).await?;
  Ok(envelope::ok("submissions", details))
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// `GET /admin/statistics`
pub async fn statistics<S: SurveyStore>(
  State(state): State<AppState<S>>,
  _: Administrator,
) -> Response {
  envelope::ok("statistics", state.reports.system_stats(Utc::now()).await)
}
