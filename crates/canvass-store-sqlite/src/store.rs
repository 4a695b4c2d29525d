//! [`SqliteStore`]: the SQLite implementation of [`SurveyStore`].
//!
//! Each write method is one `BEGIN IMMEDIATE` transaction run on the
//! connection thread. Rules that depend on current row state are decided
//! inside that transaction and returned as `Ok(Err(..))` from the closure, so
//! they roll the transaction back without being mistaken for a database
//! failure and are never retried.

use std::{path::Path, time::Duration};

use canvass_core::{
  page::PageRequest,
  principal::{NewPrincipal, Principal, PrincipalUpdate},
  questionnaire::{
    CascadeReport, Question, QuestionDraft, Questionnaire, QuestionnaireDetail,
    QuestionnaireDraft, QuestionnaireRevision, QuestionnaireSummary, Visibility,
  },
  store::{SurveyStore, Tally},
  submission::{
    Answer, NewSubmission, RecordedSubmission, Submission, SubmissionEntry,
  },
};
use rusqlite::{
  Connection, OptionalExtension as _, TransactionBehavior, types::Value,
};
use tracing::{debug, warn};

use crate::{
  Error, Result,
  encode::{
    ANSWER_COLUMNS, PRINCIPAL_COLUMNS, QUESTION_COLUMNS, QUESTIONNAIRE_COLUMNS,
    RawAnswer, RawPrincipal, RawQuestion, RawQuestionnaire, RawSubmission,
    RawSubmissionEntry, RawSummary, SUBMISSION_COLUMNS, encode_dt, now,
  },
  error::is_unique_violation,
  schema::{PRAGMAS, SCHEMA, SCHEMA_VERSION},
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Tuning for lock contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
  /// How many times a unit of work is repeated after `SQLITE_BUSY` or
  /// `SQLITE_LOCKED`.
  pub busy_retries:     u32,
  /// Linear backoff step between repeats.
  pub retry_backoff_ms: u64,
  /// SQLite's own wait for a lock before reporting `SQLITE_BUSY`.
  pub busy_timeout_ms:  u64,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self { busy_retries: 3, retry_backoff_ms: 25, busy_timeout_ms: 5000 }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Canvass store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  options:         StoreOptions,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  pub async fn open_with(
    path: impl AsRef<Path>,
    options: StoreOptions,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, options };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, options: StoreOptions::default() };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let busy_timeout = Duration::from_millis(self.options.busy_timeout_ms);
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(PRAGMAS)?;
        let version: i64 =
          conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        if version < SCHEMA_VERSION {
          conn.execute_batch(SCHEMA)?;
        }
        Ok(version)
      })
      .await
      .map(|version| debug!(from_version = version, "schema ready"))?;
    Ok(())
  }

  /// Run `f` on the connection thread, repeating it with linear backoff
  /// while it fails with a transient lock error.
  async fn call<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Connection) -> tokio_rusqlite::Result<T>
      + Clone
      + Send
      + 'static,
    T: Send + 'static,
  {
    let mut attempt = 0;
    loop {
      match self.conn.call(f.clone()).await.map_err(Error::from) {
        Err(e) if e.is_transient() && attempt < self.options.busy_retries => {
          attempt += 1;
          let backoff = Duration::from_millis(
            self.options.retry_backoff_ms.saturating_mul(u64::from(attempt)),
          );
          warn!(attempt, ?backoff, error = %e, "store busy; retrying");
          tokio::time::sleep(backoff).await;
        }
        result => return result,
      }
    }
  }
}

// ─── Connection-thread helpers ───────────────────────────────────────────────

fn principal_exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS(SELECT 1 FROM principals WHERE id = ?1)",
    [id],
    |r| r.get(0),
  )
}

fn select_principal(
  conn: &Connection,
  id: i64,
) -> rusqlite::Result<Option<RawPrincipal>> {
  conn
    .query_row(
      &format!("SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE id = ?1"),
      [id],
      RawPrincipal::from_row,
    )
    .optional()
}

fn select_questionnaire(
  conn: &Connection,
  id: i64,
) -> rusqlite::Result<Option<RawQuestionnaire>> {
  conn
    .query_row(
      &format!(
        "SELECT {QUESTIONNAIRE_COLUMNS} FROM questionnaires q WHERE q.id = ?1"
      ),
      [id],
      RawQuestionnaire::from_row,
    )
    .optional()
}

fn select_questions(
  conn: &Connection,
  questionnaire_id: i64,
) -> rusqlite::Result<Vec<RawQuestion>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {QUESTION_COLUMNS} FROM questions
     WHERE questionnaire_id = ?1
     ORDER BY sort"
  ))?;
  let rows = stmt
    .query_map([questionnaire_id], RawQuestion::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn select_detail(
  conn: &Connection,
  id: i64,
) -> rusqlite::Result<Option<(RawQuestionnaire, Vec<RawQuestion>)>> {
  let Some(questionnaire) = select_questionnaire(conn, id)? else {
    return Ok(None);
  };
  Ok(Some((questionnaire, select_questions(conn, id)?)))
}

fn question_ids(
  conn: &Connection,
  questionnaire_id: i64,
) -> rusqlite::Result<Vec<i64>> {
  let mut stmt =
    conn.prepare("SELECT id FROM questions WHERE questionnaire_id = ?1")?;
  let ids = stmt
    .query_map([questionnaire_id], |r| r.get(0))?
    .collect::<rusqlite::Result<Vec<i64>>>()?;
  Ok(ids)
}

/// The questionnaire a question belongs to, if the question exists.
fn question_owner(conn: &Connection, question_id: i64) -> rusqlite::Result<Option<i64>> {
  conn
    .query_row(
      "SELECT questionnaire_id FROM questions WHERE id = ?1",
      [question_id],
      |r| r.get(0),
    )
    .optional()
}

fn delete_answers_of(conn: &Connection, question_ids: &[i64]) -> rusqlite::Result<u64> {
  let mut stmt = conn.prepare("DELETE FROM answers WHERE question_id = ?1")?;
  let mut removed = 0;
  for id in question_ids {
    removed += stmt.execute([id])? as u64;
  }
  Ok(removed)
}

fn insert_questions(
  conn: &Connection,
  questionnaire_id: i64,
  questions: &[QuestionDraft],
  at: &str,
) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare(
    "INSERT INTO questions (
       questionnaire_id, title, kind, required, options, sort,
       created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
  )?;
  for q in questions {
    stmt.execute(rusqlite::params![
      questionnaire_id,
      q.title,
      q.kind,
      q.required,
      q.options,
      q.position,
      at,
    ])?;
  }
  Ok(())
}

/// Remove a questionnaire and everything hanging off it.
///
/// Order: questions, answers of those questions, submissions, the
/// questionnaire. Question ids are captured first so the answer step still
/// sees every answer; the deferred answer → question reference is settled at
/// commit.
fn cascade_questionnaire(conn: &Connection, id: i64) -> rusqlite::Result<CascadeReport> {
  let ids = question_ids(conn, id)?;
  let questions =
    conn.execute("DELETE FROM questions WHERE questionnaire_id = ?1", [id])?;
  let answers = delete_answers_of(conn, &ids)?;
  let submissions =
    conn.execute("DELETE FROM submissions WHERE questionnaire_id = ?1", [id])?;
  conn.execute("DELETE FROM questionnaires WHERE id = ?1", [id])?;
  Ok(CascadeReport {
    questions: questions as u64,
    answers,
    submissions: submissions as u64,
  })
}

fn principal_conflict(
  e: &rusqlite::Error,
  username: String,
  email: Option<String>,
) -> Error {
  let on_email = matches!(
    e,
    rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("principals.email")
  );
  match (on_email, email) {
    (true, Some(email)) => Error::EmailTaken(email),
    _ => Error::UsernameTaken(username),
  }
}

fn decode_detail(
  (questionnaire, questions): (RawQuestionnaire, Vec<RawQuestion>),
) -> Result<QuestionnaireDetail> {
  Ok(QuestionnaireDetail {
    questionnaire: questionnaire.into_questionnaire()?,
    questions:     questions
      .into_iter()
      .map(RawQuestion::into_question)
      .collect::<Result<_>>()?,
  })
}

// ─── SurveyStore impl ────────────────────────────────────────────────────────

impl SurveyStore for SqliteStore {
  type Error = Error;

  // ── Principals ────────────────────────────────────────────────────────────

  async fn add_principal(&self, input: NewPrincipal) -> Result<Principal> {
    let at = encode_dt(now());

    let raw = self
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO principals (
             username, password_hash, email, phone, is_admin,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
          rusqlite::params![
            input.username,
            input.password_hash,
            input.email,
            input.phone,
            input.is_admin,
            at,
          ],
        );
        match inserted {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => {
            return Ok(Err(principal_conflict(&e, input.username, input.email)));
          }
          Err(e) => return Err(e.into()),
        }
        let id = conn.last_insert_rowid();
        Ok(select_principal(conn, id)?.ok_or(Error::PrincipalNotFound(id)))
      })
      .await??;

    raw.into_principal()
  }

  async fn get_principal(&self, id: i64) -> Result<Option<Principal>> {
    let raw = self.call(move |conn| Ok(select_principal(conn, id)?)).await?;
    raw.map(RawPrincipal::into_principal).transpose()
  }

  async fn find_principal(&self, username: &str) -> Result<Option<Principal>> {
    let username = username.to_owned();

    let raw = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE username = ?1"
              ),
              [&username],
              RawPrincipal::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPrincipal::into_principal).transpose()
  }

  async fn list_principals(&self, page: PageRequest) -> Result<(u64, Vec<Principal>)> {
    let (limit, offset) = (page.limit(), page.offset());

    let (total, raws) = self
      .call(move |conn| {
        let total: i64 =
          conn.query_row("SELECT COUNT(*) FROM principals", [], |r| r.get(0))?;
        let mut stmt = conn.prepare(&format!(
          "SELECT {PRINCIPAL_COLUMNS} FROM principals
           ORDER BY id DESC
           LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt
          .query_map([limit, offset], RawPrincipal::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total, rows))
      })
      .await?;

    let principals = raws
      .into_iter()
      .map(RawPrincipal::into_principal)
      .collect::<Result<_>>()?;
    Ok((total as u64, principals))
  }

  async fn update_principal(
    &self,
    id: i64,
    update: PrincipalUpdate,
  ) -> Result<Option<Principal>> {
    let at = encode_dt(now());

    let raw = self
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE principals
           SET email = ?1, phone = ?2, is_admin = ?3, updated_at = ?4
           WHERE id = ?5",
          rusqlite::params![update.email, update.phone, update.is_admin, at, id],
        );
        match changed {
          Ok(0) => return Ok(Ok(None)),
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => {
            return Ok(Err(Error::EmailTaken(update.email.unwrap_or_default())));
          }
          Err(e) => return Err(e.into()),
        }
        Ok(Ok(select_principal(conn, id)?))
      })
      .await??;

    raw.map(RawPrincipal::into_principal).transpose()
  }

  async fn set_password_hash(&self, id: i64, password_hash: String) -> Result<bool> {
    let at = encode_dt(now());

    let changed = self
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE principals SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
          rusqlite::params![password_hash, at, id],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn delete_principal(&self, id: i64) -> Result<CascadeReport> {
    self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let is_admin: Option<bool> = tx
          .query_row("SELECT is_admin FROM principals WHERE id = ?1", [id], |r| {
            r.get(0)
          })
          .optional()?;
        match is_admin {
          None => return Ok(Err(Error::PrincipalNotFound(id))),
          Some(true) => return Ok(Err(Error::AdminProtected(id))),
          Some(false) => {}
        }

        let owned: Vec<i64> = {
          let mut stmt =
            tx.prepare("SELECT id FROM questionnaires WHERE created_by = ?1")?;
          stmt
            .query_map([id], |r| r.get(0))?
            .collect::<rusqlite::Result<_>>()?
        };

        let mut report = CascadeReport::default();
        for questionnaire_id in owned {
          report += cascade_questionnaire(&tx, questionnaire_id)?;
        }
        report.answers +=
          tx.execute("DELETE FROM answers WHERE user_id = ?1", [id])? as u64;
        report.submissions +=
          tx.execute("DELETE FROM submissions WHERE user_id = ?1", [id])? as u64;
        tx.execute("DELETE FROM principals WHERE id = ?1", [id])?;

        tx.commit()?;
        Ok(Ok(report))
      })
      .await?
  }

  // ── Questionnaires: atomic writes ────────────────────────────────────────

  async fn create_questionnaire(
    &self,
    draft: QuestionnaireDraft,
  ) -> Result<QuestionnaireDetail> {
    let at = encode_dt(now());
    let start_time = draft.window.start_time.map(encode_dt);
    let end_time = draft.window.end_time.map(encode_dt);

    let raw = self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !principal_exists(&tx, draft.owner_id)? {
          return Ok(Err(Error::PrincipalNotFound(draft.owner_id)));
        }

        tx.execute(
          "INSERT INTO questionnaires (
             title, description, created_by, start_time, end_time,
             is_published, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
          rusqlite::params![
            draft.title,
            draft.description,
            draft.owner_id,
            start_time,
            end_time,
            draft.published,
            at,
          ],
        )?;
        let id = tx.last_insert_rowid();
        insert_questions(&tx, id, &draft.questions, &at)?;

        let Some(detail) = select_detail(&tx, id)? else {
          return Ok(Err(Error::QuestionnaireNotFound(id)));
        };
        tx.commit()?;
        Ok(Ok(detail))
      })
      .await??;

    decode_detail(raw)
  }

  async fn replace_questionnaire(
    &self,
    id: i64,
    revision: QuestionnaireRevision,
  ) -> Result<QuestionnaireDetail> {
    let at = encode_dt(now());
    let start_time = revision.window.start_time.map(encode_dt);
    let end_time = revision.window.end_time.map(encode_dt);

    let raw = self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(current) = select_questionnaire(&tx, id)? else {
          return Ok(Err(Error::QuestionnaireNotFound(id)));
        };
        if current.created_by != revision.requester_id {
          return Ok(Err(Error::NotOwner {
            questionnaire_id: id,
            requester_id:     revision.requester_id,
          }));
        }
        if current.is_published {
          return Ok(Err(Error::Published(id)));
        }

        tx.execute(
          "UPDATE questionnaires
           SET title = ?1, description = ?2, start_time = ?3, end_time = ?4,
               updated_at = ?5
           WHERE id = ?6",
          rusqlite::params![
            revision.title,
            revision.description,
            start_time,
            end_time,
            at,
            id,
          ],
        )?;

        // Responses to the replaced questions go with them, so respondents
        // can answer the new set.
        let old = question_ids(&tx, id)?;
        let answers = delete_answers_of(&tx, &old)?;
        let submissions =
          tx.execute("DELETE FROM submissions WHERE questionnaire_id = ?1", [id])?;
        if submissions > 0 {
          debug!(
            questionnaire_id = id,
            answers,
            submissions,
            "responses cleared by edit"
          );
        }
        tx.execute("DELETE FROM questions WHERE questionnaire_id = ?1", [id])?;
        insert_questions(&tx, id, &revision.questions, &at)?;

        let Some(detail) = select_detail(&tx, id)? else {
          return Ok(Err(Error::QuestionnaireNotFound(id)));
        };
        tx.commit()?;
        Ok(Ok(detail))
      })
      .await??;

    decode_detail(raw)
  }

  async fn set_published(&self, id: i64, published: bool) -> Result<Questionnaire> {
    let at = encode_dt(now());

    let raw = self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
          "UPDATE questionnaires SET is_published = ?1, updated_at = ?2
           WHERE id = ?3",
          rusqlite::params![published, at, id],
        )?;
        if changed == 0 {
          return Ok(Err(Error::QuestionnaireNotFound(id)));
        }
        let Some(raw) = select_questionnaire(&tx, id)? else {
          return Ok(Err(Error::QuestionnaireNotFound(id)));
        };
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await??;

    raw.into_questionnaire()
  }

  async fn delete_questionnaire(&self, id: i64) -> Result<CascadeReport> {
    self
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if select_questionnaire(&tx, id)?.is_none() {
          return Ok(Err(Error::QuestionnaireNotFound(id)));
        }
        let report = cascade_questionnaire(&tx, id)?;
        tx.commit()?;
        Ok(Ok(report))
      })
      .await?
  }

  // ── Questionnaires: reads ────────────────────────────────────────────────

  async fn get_questionnaire(&self, id: i64) -> Result<Option<Questionnaire>> {
    let raw = self.call(move |conn| Ok(select_questionnaire(conn, id)?)).await?;
    raw.map(RawQuestionnaire::into_questionnaire).transpose()
  }

  async fn list_questions(&self, questionnaire_id: i64) -> Result<Vec<Question>> {
    let raws = self
      .call(move |conn| Ok(select_questions(conn, questionnaire_id)?))
      .await?;
    raws.into_iter().map(RawQuestion::into_question).collect()
  }

  async fn list_questionnaires(
    &self,
    visibility: Visibility,
    page: PageRequest,
  ) -> Result<(u64, Vec<QuestionnaireSummary>)> {
    let viewer = match visibility {
      Visibility::All => None,
      Visibility::PublishedOrOwnedBy(id) => Some(id),
    };
    let (limit, offset) = (page.limit(), page.offset());

    let (total, raws) = self
      .call(move |conn| {
        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM questionnaires q
           WHERE (?1 IS NULL OR q.is_published = 1 OR q.created_by = ?1)",
          [viewer],
          |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {QUESTIONNAIRE_COLUMNS},
             p.username,
             (SELECT COUNT(*) FROM questions   WHERE questionnaire_id = q.id),
             (SELECT COUNT(*) FROM submissions WHERE questionnaire_id = q.id)
           FROM questionnaires q
           LEFT JOIN principals p ON p.id = q.created_by
           WHERE (?1 IS NULL OR q.is_published = 1 OR q.created_by = ?1)
           ORDER BY q.created_at DESC, q.id DESC
           LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![viewer, limit, offset],
            RawSummary::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total, rows))
      })
      .await?;

    let summaries = raws
      .into_iter()
      .map(RawSummary::into_summary)
      .collect::<Result<_>>()?;
    Ok((total as u64, summaries))
  }

  // ── Submissions ───────────────────────────────────────────────────────────

  async fn record_submission(
    &self,
    input: NewSubmission,
  ) -> Result<RecordedSubmission> {
    let at = encode_dt(now());

    let (submission, answers) = self
      .call(move |conn| {
        let questionnaire_id = input.questionnaire_id;
        let respondent_id = input.respondent_id;
        let duplicate =
          Error::DuplicateSubmission { questionnaire_id, respondent_id };

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if select_questionnaire(&tx, questionnaire_id)?.is_none() {
          return Ok(Err(Error::QuestionnaireNotFound(questionnaire_id)));
        }
        let prior: Option<i64> = tx
          .query_row(
            "SELECT id FROM submissions
             WHERE questionnaire_id = ?1 AND user_id = ?2",
            [questionnaire_id, respondent_id],
            |r| r.get(0),
          )
          .optional()?;
        if prior.is_some() {
          return Ok(Err(duplicate));
        }
        for answer in &input.answers {
          // Unknown ids are left to the answers foreign key.
          if let Some(owner) = question_owner(&tx, answer.question_id)?
            && owner != questionnaire_id
          {
            return Ok(Err(Error::ForeignQuestion {
              questionnaire_id,
              question_id: answer.question_id,
            }));
          }
        }

        let inserted = tx.execute(
          "INSERT INTO submissions (questionnaire_id, user_id, submitted_at, ip_address)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![questionnaire_id, respondent_id, at, input.origin],
        );
        match inserted {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => return Ok(Err(duplicate)),
          Err(e) => return Err(e.into()),
        }
        let submission = RawSubmission {
          id: tx.last_insert_rowid(),
          questionnaire_id,
          user_id: respondent_id,
          submitted_at: at.clone(),
          ip_address: input.origin,
        };

        let mut answers = Vec::with_capacity(input.answers.len());
        {
          let mut stmt = tx.prepare(
            "INSERT INTO answers (question_id, user_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for answer in input.answers {
            stmt.execute(rusqlite::params![
              answer.question_id,
              respondent_id,
              answer.content,
              at,
            ])?;
            answers.push(RawAnswer {
              id:          tx.last_insert_rowid(),
              question_id: answer.question_id,
              user_id:     respondent_id,
              content:     answer.content,
              created_at:  at.clone(),
            });
          }
        }

        tx.commit()?;
        Ok(Ok((submission, answers)))
      })
      .await??;

    Ok(RecordedSubmission {
      submission: submission.into_submission()?,
      answers:    answers
        .into_iter()
        .map(RawAnswer::into_answer)
        .collect::<Result<_>>()?,
    })
  }

  async fn find_submission(
    &self,
    questionnaire_id: i64,
    respondent_id: i64,
  ) -> Result<Option<Submission>> {
    let raw = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SUBMISSION_COLUMNS} FROM submissions s
                 WHERE s.questionnaire_id = ?1 AND s.user_id = ?2"
              ),
              [questionnaire_id, respondent_id],
              RawSubmission::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubmission::into_submission).transpose()
  }

  async fn list_submissions(
    &self,
    questionnaire_id: i64,
  ) -> Result<Vec<SubmissionEntry>> {
    let raws = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBMISSION_COLUMNS}, p.username
           FROM submissions s
           LEFT JOIN principals p ON p.id = s.user_id
           WHERE s.questionnaire_id = ?1
           ORDER BY s.submitted_at DESC, s.id DESC"
        ))?;
        let rows = stmt
          .query_map([questionnaire_id], RawSubmissionEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubmissionEntry::into_entry).collect()
  }

  async fn answers_for_questionnaire(
    &self,
    questionnaire_id: i64,
  ) -> Result<Vec<Answer>> {
    let raws = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ANSWER_COLUMNS}
           FROM answers a
           JOIN questions q ON q.id = a.question_id
           WHERE q.questionnaire_id = ?1
           ORDER BY a.id"
        ))?;
        let rows = stmt
          .query_map([questionnaire_id], RawAnswer::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAnswer::into_answer).collect()
  }

  // ── Counts ────────────────────────────────────────────────────────────────

  async fn tally(&self, tally: Tally) -> Result<u64> {
    let (sql, arg): (&'static str, Option<Value>) = match tally {
      Tally::Principals => ("SELECT COUNT(*) FROM principals", None),
      Tally::Administrators => {
        ("SELECT COUNT(*) FROM principals WHERE is_admin = 1", None)
      }
      Tally::Questionnaires => ("SELECT COUNT(*) FROM questionnaires", None),
      Tally::PublishedQuestionnaires => {
        ("SELECT COUNT(*) FROM questionnaires WHERE is_published = 1", None)
      }
      Tally::Questions => ("SELECT COUNT(*) FROM questions", None),
      Tally::Submissions => ("SELECT COUNT(*) FROM submissions", None),
      Tally::Answers => ("SELECT COUNT(*) FROM answers", None),
      Tally::SubmissionsSince(since) => (
        "SELECT COUNT(*) FROM submissions WHERE submitted_at > ?1",
        Some(Value::Text(encode_dt(since))),
      ),
      Tally::QuestionnairesOwnedBy(id) => (
        "SELECT COUNT(*) FROM questionnaires WHERE created_by = ?1",
        Some(Value::Integer(id)),
      ),
      Tally::SubmissionsBy(id) => (
        "SELECT COUNT(*) FROM submissions WHERE user_id = ?1",
        Some(Value::Integer(id)),
      ),
    };

    let n: i64 = self
      .call(move |conn| {
        let n = match &arg {
          Some(v) => conn.query_row(sql, [v], |r| r.get(0))?,
          None => conn.query_row(sql, [], |r| r.get(0))?,
        };
        Ok(n)
      })
      .await?;

    Ok(n as u64)
  }
}
