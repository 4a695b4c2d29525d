//! Principal directory: registration, lookup, and administrative user
//! management.
//!
//! Secrets arrive here already hashed. Administrators cannot be deleted
//! through [`Directory::delete`].

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
  Error, IntoCore as _, Result,
  page::{Page, PageRequest},
  principal::{NewPrincipal, Principal, PrincipalDetail, PrincipalUpdate},
  questionnaire::CascadeReport,
  store::{SurveyStore, Tally},
};

pub struct Directory<S> {
  store: Arc<S>,
}

impl<S> Clone for Directory<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: SurveyStore> Directory<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub async fn register(&self, input: NewPrincipal) -> Result<Principal> {
    let username = input.username.trim().to_owned();
    if username.is_empty() {
      return Err(Error::validation("username is required"));
    }
    if input.password_hash.is_empty() {
      return Err(Error::validation("password is required"));
    }
    if self.store.find_principal(&username).await.into_core()?.is_some() {
      return Err(Error::UsernameTaken(username));
    }

    let principal = self
      .store
      .add_principal(NewPrincipal {
        username,
        email: input.email.filter(|e| !e.trim().is_empty()),
        ..input
      })
      .await
      .into_core()?;
    info!(
      principal_id = principal.id,
      username = %principal.username,
      is_admin = principal.is_admin,
      "principal registered"
    );
    Ok(principal)
  }

  pub async fn principal(&self, id: i64) -> Result<Principal> {
    self
      .store
      .get_principal(id)
      .await
      .into_core()?
      .ok_or(Error::PrincipalNotFound(id))
  }

  pub async fn find_by_username(&self, username: &str) -> Result<Option<Principal>> {
    self.store.find_principal(username).await.into_core()
  }

  /// Principals, newest first.
  pub async fn list(&self, page: PageRequest) -> Result<Page<Principal>> {
    let (total, items) = self.store.list_principals(page).await.into_core()?;
    Ok(page.into_page(total, items))
  }

  /// A principal with the number of questionnaires it owns and submissions
  /// it has made.
  pub async fn detail(&self, id: i64) -> Result<PrincipalDetail> {
    let principal = self.principal(id).await?;
    let questionnaire_count = self
      .store
      .tally(Tally::QuestionnairesOwnedBy(id))
      .await
      .into_core()?;
    let submission_count =
      self.store.tally(Tally::SubmissionsBy(id)).await.into_core()?;
    Ok(PrincipalDetail { principal, questionnaire_count, submission_count })
  }

  pub async fn update(&self, id: i64, update: PrincipalUpdate) -> Result<Principal> {
    let update = PrincipalUpdate {
      email: update.email.filter(|e| !e.trim().is_empty()),
      ..update
    };
    let principal = self
      .store
      .update_principal(id, update)
      .await
      .into_core()?
      .ok_or(Error::PrincipalNotFound(id))?;
    info!(principal_id = id, is_admin = principal.is_admin, "principal updated");
    Ok(principal)
  }

  /// Delete a principal with everything it owns and every submission it
  /// made. Administrators are refused.
  pub async fn delete(&self, id: i64) -> Result<CascadeReport> {
    let principal = self.principal(id).await?;
    if principal.is_admin {
      warn!(principal_id = id, "refusing to delete an administrator");
      return Err(Error::AdminProtected(id));
    }
    let report = self.store.delete_principal(id).await.into_core()?;
    info!(
      principal_id = id,
      questions = report.questions,
      answers = report.answers,
      submissions = report.submissions,
      "principal deleted"
    );
    Ok(report)
  }

  pub async fn reset_password(&self, id: i64, password_hash: String) -> Result<()> {
    if password_hash.is_empty() {
      return Err(Error::validation("password is required"));
    }
    if !self.store.set_password_hash(id, password_hash).await.into_core()? {
      return Err(Error::PrincipalNotFound(id));
    }
    info!(principal_id = id, "password reset");
    Ok(())
  }

  /// Create `username` as an administrator, or promote it and replace its
  /// credential hash if it already exists.
  pub async fn ensure_admin(
    &self,
    username: &str,
    password_hash: String,
  ) -> Result<Principal> {
    match self.find_by_username(username).await? {
      Some(existing) => {
        self.reset_password(existing.id, password_hash).await?;
        self
          .update(existing.id, PrincipalUpdate {
            email:    existing.email,
            phone:    existing.phone,
            is_admin: true,
          })
          .await
      }
      None => {
        self
          .register(NewPrincipal {
            username: username.to_owned(),
            password_hash,
            email: None,
            phone: None,
            is_admin: true,
          })
          .await
      }
    }
  }

  /// Create the bootstrap administrator if the directory has none. Returns
  /// the created principal, or `None` when an administrator already exists.
  pub async fn bootstrap_admin(
    &self,
    username: &str,
    password_hash: String,
  ) -> Result<Option<Principal>> {
    if self.store.tally(Tally::Administrators).await.into_core()? > 0 {
      return Ok(None);
    }
    self.ensure_admin(username, password_hash).await.map(Some)
  }
}
