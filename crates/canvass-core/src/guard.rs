//! Access guard: resolves a bearer credential to a principal and decides
//! whether that principal may perform an action.
//!
//! Credential formats are not known here. The transport layer supplies a
//! [`CredentialVerifier`] that turns an opaque token into a username.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
  Error, IntoCore as _, Result, principal::Principal, store::SurveyStore,
};

const BEARER: &str = "Bearer";

/// Verifies an opaque bearer credential and yields the username it was issued
/// for.
pub trait CredentialVerifier: Send + Sync {
  fn username_for(&self, credential: &str) -> Result<String>;
}

/// What a principal is trying to do, with the ownership facts the decision
/// depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
  /// Administrative operations.
  Administer,
  /// Create content on behalf of `owner`.
  Author { owner: i64 },
  /// Edit, publish, unpublish or delete `owner`'s questionnaire.
  /// Administrators get no override.
  Edit { owner: i64 },
  /// Read the results of `owner`'s questionnaire.
  ViewResults { owner: i64 },
  /// Submit or query a submission as `respondent`.
  Respond { respondent: i64 },
}

impl Capability {
  pub fn permits(&self, principal: &Principal) -> bool {
    match *self {
      Self::Administer => principal.is_admin,
      Self::Author { owner } | Self::Edit { owner } => principal.id == owner,
      Self::ViewResults { owner } => principal.id == owner || principal.is_admin,
      Self::Respond { respondent } => principal.id == respondent,
    }
  }
}

pub struct AccessGuard<S> {
  store:    Arc<S>,
  verifier: Arc<dyn CredentialVerifier>,
}

impl<S> Clone for AccessGuard<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      verifier: Arc::clone(&self.verifier),
    }
  }
}

impl<S: SurveyStore> AccessGuard<S> {
  pub fn new(store: Arc<S>, verifier: Arc<dyn CredentialVerifier>) -> Self {
    Self { store, verifier }
  }

  /// Resolve an `Authorization` header value to a principal.
  ///
  /// A missing header, a scheme other than `Bearer`, an empty or rejected
  /// credential, and a credential naming an unknown user all fail with
  /// [`Error::Unauthenticated`].
  pub async fn authenticate(&self, header: Option<&str>) -> Result<Principal> {
    let header =
      header.ok_or_else(|| Error::unauthenticated("missing credential"))?;
    let credential = bearer_credential(header)?;

    let username = self.verifier.username_for(credential).map_err(|e| {
      debug!(error = %e, "credential rejected");
      Error::unauthenticated("invalid or expired credential")
    })?;

    match self.store.find_principal(&username).await.into_core()? {
      Some(principal) => Ok(principal),
      None => {
        warn!(%username, "credential names an unknown user");
        Err(Error::unauthenticated("user not found"))
      }
    }
  }

  /// Check a capability for an already-authenticated principal.
  pub fn authorize(&self, principal: &Principal, capability: Capability) -> Result<()> {
    authorize(principal, capability)
  }
}

/// Reject with [`Error::Forbidden`] unless `capability` permits `principal`.
pub fn authorize(principal: &Principal, capability: Capability) -> Result<()> {
  if capability.permits(principal) {
    return Ok(());
  }
  debug!(principal_id = principal.id, ?capability, "access denied");
  Err(Error::forbidden(match capability {
    Capability::Administer => "administrator privileges required",
    Capability::Author { .. } => "cannot create on behalf of another user",
    Capability::Edit { .. } => "only the owner may modify this questionnaire",
    Capability::ViewResults { .. } => {
      "only the owner or an administrator may view these results"
    }
    Capability::Respond { .. } => "cannot act on behalf of another user",
  }))
}

fn bearer_credential(header: &str) -> Result<&str> {
  let mut parts = header.trim().splitn(2, ' ');
  let scheme = parts.next().unwrap_or_default();
  let credential = parts.next().map(str::trim).unwrap_or_default();
  if scheme != BEARER {
    return Err(Error::unauthenticated("malformed authorization header"));
  }
  if credential.is_empty() {
    return Err(Error::unauthenticated("empty credential"));
  }
  Ok(credential)
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::ErrorKind;

  fn principal(id: i64, is_admin: bool) -> Principal {
    Principal {
      id,
      username: format!("user{id}"),
      password_hash: String::new(),
      email: None,
      phone: None,
      is_admin,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn only_admins_administer() {
    assert!(Capability::Administer.permits(&principal(1, true)));
    assert!(!Capability::Administer.permits(&principal(2, false)));
  }

  #[test]
  fn edit_has_no_admin_override() {
    let admin = principal(1, true);
    assert!(!Capability::Edit { owner: 7 }.permits(&admin));
    assert!(Capability::Edit { owner: 7 }.permits(&principal(7, false)));
  }

  #[test]
  fn results_visible_to_owner_or_admin() {
    let cap = Capability::ViewResults { owner: 7 };
    assert!(cap.permits(&principal(7, false)));
    assert!(cap.permits(&principal(1, true)));
    assert!(!cap.permits(&principal(9, false)));
  }

  #[test]
  fn respond_only_as_self() {
    let cap = Capability::Respond { respondent: 42 };
    assert!(cap.permits(&principal(42, false)));
    assert!(!cap.permits(&principal(1, true)));
  }

  #[test]
  fn denial_is_forbidden() {
    let err = authorize(&principal(9, false), Capability::Author { owner: 7 })
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
  }

  #[test]
  fn header_parsing() {
    assert_eq!(bearer_credential("Bearer abc").unwrap(), "abc");
    assert_eq!(bearer_credential("  Bearer   abc ").unwrap(), "abc");
    for bad in ["Basic abc", "Bearer", "Bearer   ", "abc", ""] {
      let err = bearer_credential(bad).unwrap_err();
      assert_eq!(err.kind(), ErrorKind::Unauthenticated, "{bad:?}");
    }
  }
}
