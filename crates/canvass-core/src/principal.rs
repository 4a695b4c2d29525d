//! Principals: the accounts that author questionnaires and respond to them.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registered account. The credential hash never leaves the process: it is
/// skipped during serialisation.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
  pub id:            i64,
  pub username:      String,
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub email:         Option<String>,
  pub phone:         Option<String>,
  pub is_admin:      bool,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

/// Input to [`crate::store::SurveyStore::add_principal`]. The secret arrives
/// already hashed; the core never handles plaintext.
#[derive(Debug, Clone)]
pub struct NewPrincipal {
  pub username:      String,
  pub password_hash: String,
  pub email:         Option<String>,
  pub phone:         Option<String>,
  pub is_admin:      bool,
}

/// Administrative profile update. All three fields are replaced.
#[derive(Debug, Clone)]
pub struct PrincipalUpdate {
  pub email:    Option<String>,
  pub phone:    Option<String>,
  pub is_admin: bool,
}

/// A principal plus activity counts, for the administrator view.
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalDetail {
  #[serde(rename = "user")]
  pub principal:           Principal,
  pub questionnaire_count: u64,
  pub submission_count:    u64,
}
