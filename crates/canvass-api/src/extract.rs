//! Request extractors shared by the handlers.

use std::{convert::Infallible, net::SocketAddr};

use axum::{
  extract::{ConnectInfo, FromRequest, FromRequestParts},
  http::{HeaderMap, header, request::Parts},
};
use canvass_core::{
  guard::{Capability, authorize},
  page::PageRequest,
  principal::Principal,
  store::SurveyStore,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

// ─── Body and query wrappers ─────────────────────────────────────────────────

/// `axum::Json` with rejections rendered as validation errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// `axum::extract::Query` with rejections rendered as validation errors.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

/// `?page=&page_size=` as sent by clients. Values are parsed leniently: an
/// unparseable value is treated as absent and then clamped.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub page:      Option<String>,
  pub page_size: Option<String>,
}

impl PageParams {
  pub fn request(&self) -> PageRequest {
    PageRequest::new(lenient(&self.page), lenient(&self.page_size))
  }
}

/// `?id=`
#[derive(Debug, Default, Deserialize)]
pub struct IdParam {
  pub id: Option<String>,
}

pub fn lenient(raw: &Option<String>) -> Option<i64> {
  raw.as_deref().and_then(|s| s.trim().parse().ok())
}

/// Parse a required positive identifier from a query value.
pub fn required_id(raw: &Option<String>, name: &str) -> Result<i64, ApiError> {
  lenient(raw)
    .filter(|id| *id > 0)
    .ok_or_else(|| ApiError::bad_request(format!("invalid {name}")))
}

// ─── Principals ──────────────────────────────────────────────────────────────

/// The principal named by the request's bearer credential.
pub struct CurrentPrincipal(pub Principal);

impl<S> FromRequestParts<AppState<S>> for CurrentPrincipal
where
  S: SurveyStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let authorization = parts
      .headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok());
    let principal = state.guard.authenticate(authorization).await?;
    Ok(Self(principal))
  }
}

/// An authenticated principal holding the administrator flag.
pub struct Administrator(pub Principal);

impl<S> FromRequestParts<AppState<S>> for Administrator
where
  S: SurveyStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let CurrentPrincipal(principal) =
      CurrentPrincipal::from_request_parts(parts, state).await?;
    authorize(&principal, Capability::Administer)?;
    Ok(Self(principal))
  }
}

// ─── Origin address ──────────────────────────────────────────────────────────

/// The best-known client address: `X-Forwarded-For`, then `X-Real-IP`, then
/// the peer address, else `"unknown"`. Diagnostic only.
pub struct ClientAddr(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
  type Rejection = Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let peer = parts
      .extensions
      .get::<ConnectInfo<SocketAddr>>()
      .map(|ConnectInfo(addr)| *addr);
    Ok(Self(client_addr(&parts.headers, peer)))
  }
}

fn client_addr(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
  let first = |name: &str| {
    headers
      .get(name)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.split(',').next())
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(str::to_owned)
  };
  first("x-forwarded-for")
    .or_else(|| first("x-real-ip"))
    .or_else(|| peer.map(|addr| addr.ip().to_string()))
    .unwrap_or_else(|| "unknown".to_owned())
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (k, v) in pairs {
      map.insert(*k, HeaderValue::from_static(*v));
    }
    map
  }

  #[test]
  fn forwarded_for_wins() {
    let h = headers(&[
      ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
      ("x-real-ip", "198.51.100.2"),
    ]);
    let peer = "127.0.0.1:9000".parse().ok();
    assert_eq!(client_addr(&h, peer), "203.0.113.7");
  }

  #[test]
  fn real_ip_then_peer_then_unknown() {
    let h = headers(&[("x-real-ip", "198.51.100.2")]);
    assert_eq!(client_addr(&h, None), "198.51.100.2");

    let peer = "127.0.0.1:9000".parse().ok();
    assert_eq!(client_addr(&HeaderMap::new(), peer), "127.0.0.1");
    assert_eq!(client_addr(&HeaderMap::new(), None), "unknown");
  }

  #[test]
  fn lenient_paging() {
    let p = PageParams { page: Some("abc".into()), page_size: Some("500".into()) };
    assert_eq!(p.request(), PageRequest::new(Some(1), Some(10)));
    assert!(required_id(&Some("0".into()), "id").is_err());
    assert_eq!(required_id(&Some(" 12 ".into()), "id").unwrap(), 12);
  }
}
