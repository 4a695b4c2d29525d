//! Success envelopes: `{"success": true, "message": ..., "data": ...}`.
//!
//! Listings add `total`, `page` and `page_size` next to `data`.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use canvass_core::page::Page;
use serde::Serialize;

#[derive(Serialize)]
struct Envelope<'a, T> {
  success: bool,
  message: &'a str,
  data:    T,
}

#[derive(Serialize)]
struct Listing<'a, T> {
  success:   bool,
  message:   &'a str,
  data:      Vec<T>,
  total:     u64,
  page:      i64,
  page_size: i64,
}

fn respond<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
  (status, Json(Envelope { success: true, message, data })).into_response()
}

/// `200 OK`
pub fn ok<T: Serialize>(message: &str, data: T) -> Response {
  respond(StatusCode::OK, message, data)
}

/// `201 Created`
pub fn created<T: Serialize>(message: &str, data: T) -> Response {
  respond(StatusCode::CREATED, message, data)
}

/// `200 OK` with paging fields.
pub fn listing<T: Serialize>(message: &str, page: Page<T>) -> Response {
  let body = Listing {
    success: true,
    message,
    data: page.items,
    total: page.total,
    page: page.page,
    page_size: page.page_size,
  };
  (StatusCode::OK, Json(body)).into_response()
}
