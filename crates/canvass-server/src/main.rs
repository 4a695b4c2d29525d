//! canvass-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the JSON API under `/api`.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `bootstrap_admin_password_hash`:
//!
//! ```
//! cargo run -p canvass-server -- --hash-password
//! ```

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use canvass_api::{AppState, credentials::hash_password};
use canvass_core::directory::Directory;
use canvass_server::ServerConfig;
use canvass_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Canvass questionnaire server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Create or reset the named administrator with a password entered on
  /// stdin, then exit.
  #[arg(long, value_name = "USERNAME")]
  reset_admin: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = rpassword_or_stdin()?;
    println!("{}", hash(&password)?);
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("CANVASS"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  let tokens = server_cfg
    .signed_tokens()
    .context("invalid token_secret")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open_with(&store_path, server_cfg.store_options())
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);
  let directory = Directory::new(Arc::clone(&store));

  // Helper mode: reset an administrator and exit.
  if let Some(username) = cli.reset_admin {
    let password = rpassword_or_stdin()?;
    let admin = directory
      .ensure_admin(&username, hash(&password)?)
      .await
      .with_context(|| format!("failed to reset administrator {username:?}"))?;
    tracing::info!(
      principal_id = admin.id,
      username = %admin.username,
      "administrator reset"
    );
    return Ok(());
  }

  if let Some((username, password_hash)) = server_cfg.bootstrap_admin() {
    let created = directory
      .bootstrap_admin(username, password_hash.to_owned())
      .await
      .context("failed to bootstrap administrator")?;
    if let Some(admin) = created {
      tracing::info!(
        principal_id = admin.id,
        username = %admin.username,
        "bootstrap administrator created"
      );
    }
  }

  let app = canvass_server::router(AppState::new(store, tokens));
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
    .await
    .context("server error")?;

  Ok(())
}

fn hash(password: &str) -> anyhow::Result<String> {
  anyhow::ensure!(!password.is_empty(), "password must not be empty");
  hash_password(password).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))
}

/// Read one password line from stdin.
fn rpassword_or_stdin() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
