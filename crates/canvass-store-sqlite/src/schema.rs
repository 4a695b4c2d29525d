//! SQL schema for the Canvass SQLite store.
//!
//! [`PRAGMAS`] run on every open. [`SCHEMA`] runs only while
//! `PRAGMA user_version` is below [`SCHEMA_VERSION`]; future migrations will
//! be gated on that number.

pub const SCHEMA_VERSION: i64 = 1;

/// Connection-level settings.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS principals (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT    NOT NULL UNIQUE,
    password_hash TEXT    NOT NULL,
    email         TEXT    UNIQUE,
    phone         TEXT,
    is_admin      INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT    NOT NULL,
    updated_at    TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS questionnaires (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    title         TEXT    NOT NULL,
    description   TEXT    NOT NULL DEFAULT '',
    created_by    INTEGER NOT NULL REFERENCES principals(id),
    start_time    TEXT,
    end_time      TEXT,
    is_published  INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT    NOT NULL,
    updated_at    TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS questions (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    questionnaire_id INTEGER NOT NULL REFERENCES questionnaires(id),
    title            TEXT    NOT NULL,
    kind             TEXT    NOT NULL,   -- caller-defined; opaque here
    required         INTEGER NOT NULL DEFAULT 0,
    options          TEXT    NOT NULL DEFAULT '',
    sort             INTEGER NOT NULL,
    created_at       TEXT    NOT NULL,
    updated_at       TEXT    NOT NULL,
    UNIQUE (questionnaire_id, sort)
);

-- At most one submission per (questionnaire, respondent).
CREATE TABLE IF NOT EXISTS submissions (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    questionnaire_id INTEGER NOT NULL REFERENCES questionnaires(id),
    user_id          INTEGER NOT NULL REFERENCES principals(id),
    submitted_at     TEXT    NOT NULL,
    ip_address       TEXT    NOT NULL DEFAULT '',
    UNIQUE (questionnaire_id, user_id)
);

-- Answers carry no submission reference. The question reference is checked
-- at commit so a cascade may remove questions before their answers.
CREATE TABLE IF NOT EXISTS answers (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    question_id INTEGER NOT NULL
                REFERENCES questions(id) DEFERRABLE INITIALLY DEFERRED,
    user_id     INTEGER NOT NULL REFERENCES principals(id),
    content     TEXT    NOT NULL,
    created_at  TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS questionnaires_owner_idx   ON questionnaires(created_by);
CREATE INDEX IF NOT EXISTS questionnaires_created_idx ON questionnaires(created_at);
CREATE INDEX IF NOT EXISTS submissions_user_idx       ON submissions(user_id);
CREATE INDEX IF NOT EXISTS submissions_at_idx         ON submissions(submitted_at);
CREATE INDEX IF NOT EXISTS answers_question_idx       ON answers(question_id);
CREATE INDEX IF NOT EXISTS answers_user_idx           ON answers(user_id);

PRAGMA user_version = 1;
";
