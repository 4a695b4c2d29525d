//! Router tests driven through `tower::ServiceExt::oneshot` against an
//! in-memory SQLite store.

use std::sync::Arc;

use axum::{
  Router,
  body::{Body, to_bytes},
  http::{Method, Request, StatusCode, header},
};
use canvass_core::principal::NewPrincipal;
use canvass_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{AppState, SignedTokens, api_router, credentials::hash_password};

const PASSWORD: &str = "correct horse";

struct Harness {
  router: Router,
  state:  AppState<SqliteStore>,
  hash:   String,
}

impl Harness {
  async fn new() -> Self {
    let store = SqliteStore::open_in_memory()
      .await
      .expect("in-memory store");
    let tokens = SignedTokens::new("router-test-secret-0123456789abcdef", 3600)
      .expect("token secret");
    let state = AppState::new(Arc::new(store), tokens);
    Self {
      router: api_router(state.clone()),
      state,
      hash: hash_password(PASSWORD).expect("hash"),
    }
  }

  async fn call(
    &self,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
      req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
      Some(v) => {
        req = req.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    self.send(req.body(body).expect("request")).await
  }

  async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
    let res = self.router.clone().oneshot(req).await.expect("response");
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
  }

  /// Create a principal directly and log it in over HTTP.
  async fn user(&self, username: &str, is_admin: bool) -> (i64, String) {
    let principal = self
      .state
      .directory
      .register(NewPrincipal {
        username: username.into(),
        password_hash: self.hash.clone(),
        email: None,
        phone: None,
        is_admin,
      })
      .await
      .expect("register");
    let (status, body) = self
      .call(
        Method::POST,
        "/user/login",
        None,
        Some(json!({ "username": username, "password": PASSWORD })),
      )
      .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let token = body["data"]["token"].as_str().expect("token").to_owned();
    (principal.id, token)
  }

  async fn create(&self, token: &str, body: Value) -> (StatusCode, Value) {
    self
      .call(Method::POST, "/questionnaire/create", Some(token), Some(body))
      .await
  }
}

fn questionnaire(title: &str) -> Value {
  json!({
    "title": title,
    "description": "weekly check-in",
    "questions": [
      { "title": "Mood?", "type": "single", "required": true, "options": ["good", "bad"] },
      { "title": "Notes", "type": "text", "options": "" },
    ],
  })
}

fn question_ids(detail: &Value) -> Vec<i64> {
  detail["data"]["questions"]
    .as_array()
    .expect("questions")
    .iter()
    .map(|q| q["id"].as_i64().expect("question id"))
    .collect()
}

// ─── Public surface ──────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_public() {
  let h = Harness::new().await;
  let (status, body) = h.call(Method::GET, "/health", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["success"], true);
}

#[tokio::test]
async fn register_then_login() {
  let h = Harness::new().await;
  let (status, body) = h
    .call(
      Method::POST,
      "/user/register",
      None,
      Some(json!({ "username": "alice", "password": "pw", "email": "a@example.com" })),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  assert_eq!(body["data"]["username"], "alice");
  assert!(body["data"].get("password_hash").is_none());

  let (status, body) = h
    .call(
      Method::POST,
      "/user/register",
      None,
      Some(json!({ "username": "alice", "password": "other" })),
    )
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["kind"], "validation");

  let (status, body) = h
    .call(
      Method::POST,
      "/user/login",
      None,
      Some(json!({ "username": "alice", "password": "pw" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"]["username"], "alice");
  assert_eq!(body["data"]["is_admin"], false);
  assert!(body["data"]["token"].as_str().is_some_and(|t| !t.is_empty()));

  let (status, body) = h
    .call(
      Method::POST,
      "/user/login",
      None,
      Some(json!({ "username": "alice", "password": "wrong" })),
    )
    .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["success"], false);
  assert_eq!(body["kind"], "unauthenticated");
}

#[tokio::test]
async fn writes_require_a_valid_token() {
  let h = Harness::new().await;
  let (status, body) = h
    .call(Method::POST, "/questionnaire/create", None, Some(questionnaire("q")))
    .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["kind"], "unauthenticated");

  let (status, _) = h.create("token_alice_20240101", questionnaire("q")).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
  let h = Harness::new().await;
  let (_, token) = h.user("alice", false).await;
  let req = Request::builder()
    .method(Method::POST)
    .uri("/questionnaire/create")
    .header(header::AUTHORIZATION, format!("Bearer {token}"))
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from("{not json"))
    .expect("request");
  let (status, body) = h.send(req).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["success"], false);
  assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn missing_query_id_is_a_validation_error() {
  let h = Harness::new().await;
  let (status, body) =
    h.call(Method::GET, "/questionnaire/detail?id=abc", None, None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["kind"], "validation");

  let (status, body) =
    h.call(Method::GET, "/questionnaire/detail?id=999", None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["kind"], "not_found");
}

// ─── Questionnaire lifecycle ─────────────────────────────────────────────────

#[tokio::test]
async fn create_submit_duplicate_delete() {
  let h = Harness::new().await;
  let (_, owner) = h.user("owner", false).await;
  let (respondent_id, respondent) = h.user("respondent", false).await;

  let (status, created) = h.create(&owner, questionnaire("check-in")).await;
  assert_eq!(status, StatusCode::CREATED, "{created}");
  let id = created["data"]["questionnaire"]["id"].as_i64().expect("id");
  let qids = question_ids(&created);
  assert_eq!(created["data"]["questions"][0]["sort"], 0);
  assert_eq!(created["data"]["questions"][1]["sort"], 1);
  assert_eq!(created["data"]["questions"][0]["options"], "[\"good\",\"bad\"]");

  let submission = json!({
    "questionnaire_id": id,
    "user_id": respondent_id,
    "answers": [
      { "question_id": qids[0], "content": "good" },
      { "question_id": qids[1], "content": "fine" },
    ],
  });
  let (status, body) = h
    .call(
      Method::POST,
      "/questionnaire/submit",
      Some(&respondent),
      Some(submission.clone()),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");

  let (status, body) = h
    .call(Method::POST, "/questionnaire/submit", Some(&respondent), Some(submission))
    .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["kind"], "conflict");

  let uri = format!("/questionnaire/check-submission?questionnaire_id={id}");
  let (status, body) = h.call(Method::GET, &uri, Some(&respondent), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"]["has_submitted"], true);

  let uri = format!("/questionnaire/delete?id={id}");
  let (status, body) = h.call(Method::DELETE, &uri, Some(&owner), None).await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"], json!({ "questions": 2, "answers": 2, "submissions": 1 }));

  let uri = format!("/questionnaire/detail?id={id}");
  let (status, _) = h.call(Method::GET, &uri, None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (_, stats) = h.call(Method::GET, "/questionnaire/stats", None, None).await;
  assert_eq!(stats["data"]["questionnaire_count"], 0);
  assert_eq!(stats["data"]["submission_count"], 0);
  assert_eq!(stats["data"]["user_count"], 2);
}

#[tokio::test]
async fn acting_for_someone_else_is_forbidden() {
  let h = Harness::new().await;
  let (owner_id, owner) = h.user("owner", false).await;
  let (other_id, other) = h.user("other", false).await;

  let mut body = questionnaire("q");
  body["created_by"] = json!(owner_id);
  let (status, body) = h.create(&other, body).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["kind"], "forbidden");

  let (_, created) = h.create(&owner, questionnaire("q")).await;
  let id = created["data"]["questionnaire"]["id"].as_i64().expect("id");
  let (status, body) = h
    .call(
      Method::POST,
      "/questionnaire/submit",
      Some(&owner),
      Some(json!({ "questionnaire_id": id, "user_id": other_id, "answers": [] })),
    )
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["kind"], "forbidden");
}

#[tokio::test]
async fn only_the_owner_edits_and_only_while_unpublished() {
  let h = Harness::new().await;
  let (_, owner) = h.user("owner", false).await;
  let (_, other) = h.user("other", false).await;
  let (_, admin) = h.user("root", true).await;

  let (_, created) = h.create(&owner, questionnaire("draft")).await;
  let id = created["data"]["questionnaire"]["id"].as_i64().expect("id");
  let old_ids = question_ids(&created);

  let edit = json!({
    "id": id,
    "title": "revised",
    "questions": [{ "title": "Only one", "type": "text" }],
  });
  for token in [&other, &admin] {
    let (status, body) = h
      .call(Method::PUT, "/questionnaire/update", Some(token), Some(edit.clone()))
      .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
  }

  let (status, updated) = h
    .call(Method::PUT, "/questionnaire/update", Some(&owner), Some(edit.clone()))
    .await;
  assert_eq!(status, StatusCode::OK, "{updated}");
  assert_eq!(updated["data"]["questionnaire"]["title"], "revised");
  let new_ids = question_ids(&updated);
  assert_eq!(new_ids.len(), 1);
  assert!(!old_ids.contains(&new_ids[0]));

  let status_body = json!({ "id": id, "is_published": true });
  let (status, _) = h
    .call(
      Method::PUT,
      "/questionnaire/update-status",
      Some(&other),
      Some(status_body.clone()),
    )
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, body) = h
    .call(Method::PUT, "/questionnaire/update-status", Some(&owner), Some(status_body))
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"]["is_published"], true);

  let (status, body) = h
    .call(Method::PUT, "/questionnaire/update", Some(&owner), Some(edit))
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["kind"], "invalid_state");
}

#[tokio::test]
async fn listing_clamps_page_size_and_honours_the_hint() {
  let h = Harness::new().await;
  let (owner_id, owner) = h.user("owner", false).await;
  let (other_id, _) = h.user("other", false).await;

  h.create(&owner, questionnaire("hidden")).await;
  let mut published = questionnaire("public");
  published["is_published"] = json!(true);
  h.create(&owner, published).await;

  let (status, body) = h
    .call(Method::GET, "/questionnaire/list?page=0&page_size=500", None, None)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["page"], 1);
  assert_eq!(body["page_size"], 10);
  assert_eq!(body["total"], 2);
  assert_eq!(body["data"][0]["title"], "public");
  assert_eq!(body["data"][0]["creator_name"], "owner");
  assert_eq!(body["data"][0]["question_count"], 2);

  let uri = format!("/questionnaire/list?user_id={other_id}");
  let (_, body) = h.call(Method::GET, &uri, None, None).await;
  assert_eq!(body["total"], 1);

  let uri = format!("/questionnaire/list?user_id={owner_id}");
  let (_, body) = h.call(Method::GET, &uri, None, None).await;
  assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn results_are_for_owner_or_admin() {
  let h = Harness::new().await;
  let (_, owner) = h.user("owner", false).await;
  let (respondent_id, respondent) = h.user("respondent", false).await;
  let (_, admin) = h.user("root", true).await;

  let (_, created) = h.create(&owner, questionnaire("q")).await;
  let id = created["data"]["questionnaire"]["id"].as_i64().expect("id");
  let qids = question_ids(&created);
  h.call(
    Method::POST,
    "/questionnaire/submit",
    Some(&respondent),
    Some(json!({
      "questionnaire_id": id,
      "answers": [{ "question_id": qids[0], "content": "bad" }],
    })),
  )
  .await;

  let uri = format!("/questionnaire/results?id={id}");
  let (status, _) = h.call(Method::GET, &uri, Some(&respondent), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  for token in [&owner, &admin] {
    let (status, body) = h.call(Method::GET, &uri, Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_submissions"], 1);
    let submission = &body["data"]["submissions"][0];
    assert_eq!(submission["user"]["id"], respondent_id);
    assert_eq!(submission["user"]["username"], "respondent");
    assert_eq!(submission["answers"][0]["content"], "bad");
  }
}

// ─── Administration ──────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_routes_require_the_flag() {
  let h = Harness::new().await;
  let (_, user) = h.user("user", false).await;
  let (_, admin) = h.user("root", true).await;

  for uri in ["/admin/users", "/admin/questionnaires", "/admin/statistics"] {
    let (status, body) = h.call(Method::GET, uri, Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    assert_eq!(body["kind"], "forbidden");
    let (status, _) = h.call(Method::GET, uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    let (status, _) = h.call(Method::GET, uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{uri}");
  }

  let (_, body) = h
    .call(Method::GET, "/admin/users?page_size=1", Some(&admin), None)
    .await;
  assert_eq!(body["total"], 2);
  assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

  let (_, body) = h.call(Method::GET, "/admin/statistics", Some(&admin), None).await;
  let stats = &body["data"];
  assert_eq!(stats["user_statistics"]["admin_users"], 1);
  assert_eq!(stats["user_statistics"]["normal_users"], 1);
  assert_eq!(stats["submission_statistics"]["average_answers_per_submission"], 0.0);
}

#[tokio::test]
async fn admin_manages_users_but_not_other_admins() {
  let h = Harness::new().await;
  let (user_id, user) = h.user("user", false).await;
  let (admin_id, admin) = h.user("root", true).await;
  h.create(&user, questionnaire("mine")).await;

  let uri = format!("/admin/user/detail?id={user_id}");
  let (status, body) = h.call(Method::GET, &uri, Some(&admin), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"]["user"]["username"], "user");
  assert_eq!(body["data"]["questionnaire_count"], 1);

  let (status, body) = h
    .call(
      Method::PUT,
      "/admin/user/update",
      Some(&admin),
      Some(json!({ "id": user_id, "email": "u@example.com", "phone": "555" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"]["email"], "u@example.com");
  assert_eq!(body["data"]["is_admin"], false);

  let uri = format!("/admin/user/delete?id={admin_id}");
  let (status, body) = h.call(Method::DELETE, &uri, Some(&admin), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["kind"], "forbidden");

  let uri = format!("/admin/user/delete?id={user_id}");
  let (status, body) = h.call(Method::DELETE, &uri, Some(&admin), None).await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["questions"], 2);

  let (status, _) = h.create(&user, questionnaire("gone")).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_update_without_the_flag_keeps_it() {
  let h = Harness::new().await;
  let (_, admin) = h.user("root", true).await;
  let (other_id, _) = h.user("deputy", true).await;
  let (user_id, _) = h.user("user", false).await;

  let (status, body) = h
    .call(
      Method::PUT,
      "/admin/user/update",
      Some(&admin),
      Some(json!({ "id": other_id, "email": "deputy@example.com" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["email"], "deputy@example.com");
  assert_eq!(body["data"]["is_admin"], true);

  let uri = format!("/admin/user/delete?id={other_id}");
  let (status, _) = h.call(Method::DELETE, &uri, Some(&admin), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, body) = h
    .call(
      Method::PUT,
      "/admin/user/update",
      Some(&admin),
      Some(json!({ "id": user_id, "is_admin": true })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"]["is_admin"], true);

  let (status, body) = h
    .call(
      Method::PUT,
      "/admin/user/update",
      Some(&admin),
      Some(json!({ "id": 9999 })),
    )
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["kind"], "not_found");
}
