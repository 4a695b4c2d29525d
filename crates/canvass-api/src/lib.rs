//! JSON REST API for Canvass.
//!
//! Exposes an axum [`Router`] backed by any
//! [`canvass_core::store::SurveyStore`]. TLS and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", canvass_api::api_router(state))
//! ```

pub mod credentials;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod token;

mod admin;
mod questionnaires;
mod submissions;
mod users;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use canvass_core::{
  directory::Directory, guard::AccessGuard, lifecycle::Lifecycle,
  recorder::Recorder, report::Reports, store::SurveyStore,
};

pub use error::ApiError;
pub use token::SignedTokens;

/// Services shared by every handler.
pub struct AppState<S> {
  pub lifecycle: Lifecycle<S>,
  pub recorder:  Recorder<S>,
  pub reports:   Reports<S>,
  pub directory: Directory<S>,
  pub guard:     AccessGuard<S>,
  pub tokens:    Arc<SignedTokens>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      lifecycle: self.lifecycle.clone(),
      recorder:  self.recorder.clone(),
      reports:   self.reports.clone(),
      directory: self.directory.clone(),
      guard:     self.guard.clone(),
      tokens:    Arc::clone(&self.tokens),
    }
  }
}

impl<S: SurveyStore> AppState<S> {
  pub fn new(store: Arc<S>, tokens: SignedTokens) -> Self {
    let tokens = Arc::new(tokens);
    Self {
      lifecycle: Lifecycle::new(Arc::clone(&store)),
      recorder:  Recorder::new(Arc::clone(&store)),
      reports:   Reports::new(Arc::clone(&store)),
      directory: Directory::new(Arc::clone(&store)),
      guard:     AccessGuard::new(store, tokens.clone()),
      tokens,
    }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: SurveyStore + 'static,
{
  Router::new()
    .route("/health", get(questionnaires::health))
    // Principals
    .route("/user/register", post(users::register::<S>))
    .route("/user/login", post(users::login::<S>))
    // Questionnaires
    .route("/questionnaire/create", post(questionnaires::create::<S>))
    .route("/questionnaire/list", get(questionnaires::list::<S>))
    .route("/questionnaire/detail", get(questionnaires::detail::<S>))
    .route("/questionnaire/update", put(questionnaires::update::<S>))
    .route(
      "/questionnaire/update-status",
      put(questionnaires::update_status::<S>),
    )
    .route("/questionnaire/delete", delete(questionnaires::remove::<S>))
    .route("/questionnaire/stats", get(questionnaires::stats::<S>))
    // Submissions
    .route("/questionnaire/submit", post(submissions::submit::<S>))
    .route(
      "/questionnaire/check-submission",
      get(submissions::check::<S>),
    )
    .route("/questionnaire/results", get(submissions::results::<S>))
    // Administration
    .route("/admin/users", get(admin::users::<S>))
    .route("/admin/user/detail", get(admin::user_detail::<S>))
    .route("/admin/user/update", put(admin::update_user::<S>))
    .route("/admin/user/delete", delete(admin::delete_user::<S>))
    .route("/admin/questionnaires", get(admin::questionnaires::<S>))
    .route(
      "/admin/questionnaire/submissions",
      get(admin::submissions::<S>),
    )
    .route("/admin/statistics", get(admin::statistics::<S>))
    .with_state(state)
}
