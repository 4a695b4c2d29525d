//! Signed, expiring bearer tokens.
//!
//! A token is `base64url(username "\n" issued_unix "\n" nonce) "." hex(mac)`
//! where `mac` is HMAC-SHA256 under the shared secret over the encoded
//! payload.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as B64};
use canvass_core::guard::CredentialVerifier;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Shortest accepted signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
  #[error("malformed token")]
  Malformed,
  #[error("bad token signature")]
  BadSignature,
  #[error("token expired")]
  Expired,
  #[error("token secret must be at least {MIN_SECRET_LEN} bytes")]
  WeakSecret,
}

/// Issues and verifies tokens with a shared secret.
pub struct SignedTokens {
  key: HmacSha256,
  ttl: Duration,
}

impl SignedTokens {
  /// Fails with [`TokenError::WeakSecret`] for secrets shorter than
  /// [`MIN_SECRET_LEN`].
  pub fn new(secret: impl AsRef<[u8]>, ttl_secs: u64) -> Result<Self, TokenError> {
    let secret = secret.as_ref();
    if secret.len() < MIN_SECRET_LEN {
      return Err(TokenError::WeakSecret);
    }
    let key = <HmacSha256 as Mac>::new_from_slice(secret)
      .map_err(|_| TokenError::WeakSecret)?;
    let ttl_secs = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
    Ok(Self {
      key,
      ttl: Duration::try_seconds(ttl_secs).unwrap_or(Duration::MAX),
    })
  }

  pub fn issue(&self, username: &str) -> String {
    self.issue_at(username, Utc::now())
  }

  pub fn issue_at(&self, username: &str, at: DateTime<Utc>) -> String {
    let payload =
      format!("{username}\n{}\n{}", at.timestamp(), Uuid::new_v4().simple());
    let encoded = B64.encode(payload);
    let mac = hex::encode(self.mac(&encoded).finalize().into_bytes());
    format!("{encoded}.{mac}")
  }

  pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
    let (encoded, mac) = token.split_once('.').ok_or(TokenError::Malformed)?;
    let mac = hex::decode(mac).map_err(|_| TokenError::Malformed)?;
    self
      .mac(encoded)
      .verify_slice(&mac)
      .map_err(|_| TokenError::BadSignature)?;

    let payload = B64.decode(encoded).map_err(|_| TokenError::Malformed)?;
    let payload = String::from_utf8(payload).map_err(|_| TokenError::Malformed)?;

    // Split from the right: the username is the only free-form part.
    let mut parts = payload.rsplitn(3, '\n');
    let (Some(_nonce), Some(issued), Some(username)) =
      (parts.next(), parts.next(), parts.next())
    else {
      return Err(TokenError::Malformed);
    };
    let issued: i64 = issued.parse().map_err(|_| TokenError::Malformed)?;
    let issued =
      DateTime::from_timestamp(issued, 0).ok_or(TokenError::Malformed)?;

    if now.signed_duration_since(issued) > self.ttl {
      return Err(TokenError::Expired);
    }
    Ok(username.to_owned())
  }

  fn mac(&self, encoded: &str) -> HmacSha256 {
    let mut mac = self.key.clone();
    mac.update(encoded.as_bytes());
    mac
  }
}

impl CredentialVerifier for SignedTokens {
  fn username_for(&self, credential: &str) -> canvass_core::Result<String> {
    self
      .verify_at(credential, Utc::now())
      .map_err(|e| canvass_core::Error::unauthenticated(e.to_string()))
  }
}
