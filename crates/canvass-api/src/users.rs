//! Handlers for `/user` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/user/register` | 201 with the new principal |
//! | `POST` | `/user/login` | 200 with a bearer token |

use axum::{extract::State, response::Response};
use canvass_core::{principal::NewPrincipal, store::SurveyStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
  AppState,
  credentials::{hash_password, verify_password},
  envelope,
  error::ApiError,
  extract::JsonBody,
};

// ─── Register ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub username: String,
  pub password: String,
  #[serde(default)]
  pub email:    Option<String>,
  #[serde(default)]
  pub phone:    Option<String>,
}

/// `POST /user/register`
pub async fn register<S: SurveyStore>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<RegisterBody>,
) -> Result<Response, ApiError> {
  if body.password.is_empty() {
    return Err(ApiError::bad_request("password must not be empty"));
  }
  let password_hash = hash_password(&body.password)?;
  let principal = state
    .directory
    .register(NewPrincipal {
      username: body.username,
      password_hash,
      email: body.email,
      phone: body.phone,
      is_admin: false,
    })
    .await?;
  Ok(envelope::created("registered", principal))
}

// ─── Login ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub username: String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct Session {
  pub token:    String,
  pub user_id:  i64,
  pub username: String,
  pub email:    Option<String>,
  pub is_admin: bool,
}

/// `POST /user/login`
///
/// An unknown username and a wrong password fail identically.
pub async fn login<S: SurveyStore>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<LoginBody>,
) -> Result<Response, ApiError> {
  let principal = state
    .directory
    .find_by_username(body.username.trim())
    .await?
    .filter(|p| verify_password(&body.password, &p.password_hash));
  let Some(principal) = principal else {
    warn!(username = %body.username, "login rejected");
    return Err(ApiError::BadCredentials);
  };

  let session = Session {
    token:    state.tokens.issue(&principal.username),
    user_id:  principal.id,
    username: principal.username,
    email:    principal.email,
    is_admin: principal.is_admin,
  };
  info!(user_id = session.user_id, "login succeeded");
  Ok(envelope::ok("logged in", session))
}
