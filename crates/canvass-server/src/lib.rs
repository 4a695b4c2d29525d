//! Process-level wiring for the Canvass server: configuration and the
//! top-level HTTP router.

use std::path::PathBuf;

use axum::{
  Router,
  http::{Method, header},
};
use canvass_api::{
  AppState, SignedTokens, api_router,
  token::TokenError,
};
use canvass_core::store::SurveyStore;
use canvass_store_sqlite::StoreOptions;
use serde::Deserialize;
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CANVASS_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                          String,
  #[serde(default = "default_port")]
  pub port:                          u16,
  #[serde(default = "default_store_path")]
  pub store_path:                    PathBuf,
  /// Signing secret for bearer tokens; at least
  /// [`canvass_api::token::MIN_SECRET_LEN`] bytes.
  pub token_secret:                  String,
  #[serde(default = "default_token_ttl")]
  pub token_ttl_secs:                u64,
  #[serde(default)]
  pub busy_retries:                  Option<u32>,
  #[serde(default)]
  pub retry_backoff_ms:              Option<u64>,
  #[serde(default)]
  pub busy_timeout_ms:               Option<u64>,
  /// Created as an administrator on startup when the store has none.
  #[serde(default)]
  pub bootstrap_admin_username:      Option<String>,
  /// Argon2 PHC string, as printed by `--hash-password`.
  #[serde(default)]
  pub bootstrap_admin_password_hash: Option<String>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("canvass.db") }

fn default_token_ttl() -> u64 { 86_400 }

impl ServerConfig {
  /// Store tuning, with unset fields taken from [`StoreOptions::default`].
  pub fn store_options(&self) -> StoreOptions {
    let defaults = StoreOptions::default();
    StoreOptions {
      busy_retries:     self.busy_retries.unwrap_or(defaults.busy_retries),
      retry_backoff_ms: self.retry_backoff_ms.unwrap_or(defaults.retry_backoff_ms),
      busy_timeout_ms:  self.busy_timeout_ms.unwrap_or(defaults.busy_timeout_ms),
    }
  }

  /// The token signer, refusing an empty or short `token_secret`.
  pub fn signed_tokens(&self) -> Result<SignedTokens, TokenError> {
    SignedTokens::new(&self.token_secret, self.token_ttl_secs)
  }

  /// Both bootstrap fields, when both are set and non-empty.
  pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
    let username = self.bootstrap_admin_username.as_deref()?.trim();
    let hash = self.bootstrap_admin_password_hash.as_deref()?.trim();
    (!username.is_empty() && !hash.is_empty()).then_some((username, hash))
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: the JSON API under `/api`, with request tracing and
/// CORS.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: SurveyStore + 'static,
{
  let cors = CorsLayer::new()
    .allow_origin(Any)
    .allow_methods([
      Method::GET,
      Method::POST,
      Method::PUT,
      Method::DELETE,
      Method::OPTIONS,
    ])
    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

  Router::new()
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
    .layer(cors)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
  };
  use canvass_store_sqlite::SqliteStore;
  use config::{Config, File, FileFormat};
  use tower::ServiceExt as _;

  use super::*;

  const SECRET: &str = "server-test-secret-0123456789abcdef";

  fn parse(toml: &str) -> ServerConfig {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()
      .and_then(Config::try_deserialize)
      .expect("config")
  }

  #[test]
  fn defaults_fill_missing_fields() {
    let cfg = parse(r#"token_secret = "s""#);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.store_path, PathBuf::from("canvass.db"));
    assert_eq!(cfg.token_ttl_secs, 86_400);
    assert_eq!(cfg.store_options(), StoreOptions::default());
    assert!(cfg.bootstrap_admin().is_none());
  }

  #[test]
  fn overrides_and_bootstrap() {
    let cfg = parse(
      r#"
        token_secret = "s"
        port = 9000
        busy_retries = 7
        bootstrap_admin_username = "root"
        bootstrap_admin_password_hash = "$argon2id$stub"
      "#,
    );
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.store_options().busy_retries, 7);
    assert_eq!(cfg.store_options().retry_backoff_ms, 25);
    assert_eq!(cfg.bootstrap_admin(), Some(("root", "$argon2id$stub")));
  }

  #[test]
  fn weak_token_secrets_are_refused() {
    for secret in ["", "short"] {
      let cfg = parse(&format!(r#"token_secret = "{secret}""#));
      assert_eq!(cfg.signed_tokens().err(), Some(TokenError::WeakSecret));
    }
    let cfg = parse(&format!(r#"token_secret = "{SECRET}""#));
    assert!(cfg.signed_tokens().is_ok());
  }

  #[test]
  fn token_secret_is_required() {
    let result = Config::builder()
      .add_source(File::from_str("port = 1", FileFormat::Toml))
      .build()
      .and_then(Config::try_deserialize::<ServerConfig>);
    assert!(result.is_err());
  }

  async fn app() -> Router {
    let store = SqliteStore::open_in_memory().await.expect("store");
    let tokens = parse(&format!(r#"token_secret = "{SECRET}""#))
      .signed_tokens()
      .expect("tokens");
    router(AppState::new(Arc::new(store), tokens))
  }

  #[tokio::test]
  async fn api_is_nested_under_prefix() {
    let res = app()
      .await
      .oneshot(Request::get("/api/health").body(Body::empty()).expect("request"))
      .await
      .expect("response");
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body");
    let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["success"], true);

    let res = app()
      .await
      .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
      .await
      .expect("response");
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn preflight_is_answered() {
    let req = Request::options("/api/questionnaire/create")
      .header(header::ORIGIN, "http://localhost:3000")
      .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
      .body(Body::empty())
      .expect("request");
    let res = app().await.oneshot(req).await.expect("response");
    assert!(res.status().is_success());
    assert_eq!(
      res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).map(|v| v.as_bytes()),
      Some(&b"*"[..])
    );
  }
}
