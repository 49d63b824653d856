//! Router tests against an in-memory SQLite store.

use std::sync::Arc;

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use census_core::policy::OrchestrationPolicy;
use census_store_sqlite::SqliteStore;
use rand_core::OsRng;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{ApiState, AuthConfig, api_router, auth::ROLE_HEADER};

async fn make_state() -> ApiState<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(b"secret", &salt)
    .unwrap()
    .to_string();

  ApiState {
    store:  Arc::new(store),
    policy: Arc::new(OrchestrationPolicy::default()),
    auth:   Arc::new(AuthConfig {
      username:      "admin".to_string(),
      password_hash: hash,
    }),
  }
}

fn admin() -> (header::HeaderName, String) {
  let encoded = B64.encode("admin:secret");
  (header::AUTHORIZATION, format!("Basic {encoded}"))
}

fn role(name: &str) -> (header::HeaderName, String) {
  (header::HeaderName::from_static(ROLE_HEADER), name.to_string())
}

async fn send(
  state:   &ApiState<SqliteStore>,
  method:  &str,
  uri:     &str,
  headers: Vec<(header::HeaderName, String)>,
  body:    Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  for (k, v) in headers {
    builder = builder.header(k, v);
  }
  let body = match body {
    Some(json) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(json.to_string())
    }
    None => Body::empty(),
  };
  let resp = api_router(state.clone())
    .oneshot(builder.body(body).unwrap())
    .await
    .unwrap();

  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
  };
  (status, value)
}

async fn create(state: &ApiState<SqliteStore>, ty: &str, records: Value) -> (StatusCode, Value) {
  send(
    state,
    "POST",
    &format!("/{ty}/facts"),
    vec![],
    Some(json!({ "academic_year": "2024-25", "records": records })),
  )
  .await
}

fn group(scope: &str, gender: Value, count: i64) -> Value {
  json!({ "scope": scope, "subcategory_id": 5, "gender": gender, "count": count })
}

// ── Catalog & facts ──────────────────────────────────────────────────────────

#[tokio::test]
async fn dimensions_lists_catalog() {
  let state = make_state().await;
  let (status, body) = send(&state, "GET", "/dimensions", vec![], None).await;
  assert_eq!(status, StatusCode::OK);
  let names: Vec<_> = body
    .as_array()
    .unwrap()
    .iter()
    .map(|s| s["name"].as_str().unwrap().to_string())
    .collect();
  assert!(names.contains(&"PwBD".to_string()));
  assert!(names.contains(&"OBC".to_string()));
}

#[tokio::test]
async fn create_then_read_back() {
  let state = make_state().await;
  let (status, body) = create(
    &state,
    "non-teaching-staff",
    json!([group("Group B", json!("Male"), 3), group("Group B", json!(2), 1)]),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  assert_eq!(body.as_array().unwrap().len(), 2);

  let (status, body) = send(
    &state,
    "GET",
    "/non-teaching-staff/facts?academic_year=2024-25&scope=Group%20B",
    vec![],
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let rows = body.as_array().unwrap();
  assert_eq!(rows.len(), 2);
  assert!(rows.iter().all(|r| r["subcategory"] == "PwBD"));
  assert!(rows.iter().any(|r| r["gender"] == "Female" && r["count"] == 1));
}

#[tokio::test]
async fn column_records_expand_to_one_row_per_gender() {
  let state = make_state().await;
  let (status, body) = create(
    &state,
    "teaching-staff",
    json!([{ "scope": "Physics", "subcategory_id": 1, "male": 4, "female": 2 }]),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  let rows = body.as_array().unwrap();
  assert_eq!(rows.len(), 2, "zero transgender column must not create a row");
}

#[tokio::test]
async fn create_rejects_non_positive_count() {
  let state = make_state().await;
  let (status, body) = create(
    &state,
    "non-teaching-staff",
    json!([group("Group B", json!("Male"), 3), group("Group B", json!("Female"), 0)]),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].is_string());

  let (_, rows) = send(
    &state,
    "GET",
    "/non-teaching-staff/facts?academic_year=2024-25",
    vec![],
    None,
  )
  .await;
  assert_eq!(rows, json!([]));
}

#[tokio::test]
async fn create_rejects_unknown_gender() {
  let state = make_state().await;
  let (status, _) = create(
    &state,
    "non-teaching-staff",
    json!([group("Group B", json!("unspecified"), 3)]),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_rejects_count_above_cap() {
  let state = make_state().await;
  let (status, body) = create(
    &state,
    "non-teaching-staff",
    json!([group("Group B", json!("Male"), i64::MAX)]),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

  let (status, _) = create(
    &state,
    "teaching-staff",
    json!([{ "scope": "Physics", "subcategory_id": 1, "male": 1, "female": i64::MAX }]),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, body) = send(
    &state,
    "GET",
    "/non-teaching-staff/summary?academic_year=2024-25",
    vec![],
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([]));
}

#[tokio::test]
async fn create_twice_is_a_conflict() {
  let state = make_state().await;
  let records = json!([group("Group B", json!("Male"), 3)]);
  let (status, _) = create(&state, "non-teaching-staff", records.clone()).await;
  assert_eq!(status, StatusCode::CREATED);
  let (status, body) = create(&state, "non-teaching-staff", records).await;
  assert_eq!(status, StatusCode::CONFLICT, "{body}");

  let (_, body) = send(
    &state,
    "GET",
    "/non-teaching-staff/summary?academic_year=2024-25",
    vec![],
    None,
  )
  .await;
  assert_eq!(body[0]["male"], 3);
  assert_eq!(body[0]["total"], 3);
}

#[tokio::test]
async fn department_rows_must_carry_roster_degree_level() {
  let state = make_state().await;
  let social = |level: Value| {
    json!([{
      "scope": "Social Work",
      "subcategory_id": 1,
      "gender": "Male",
      "count": 2,
      "degree_level": level,
    }])
  };

  let (status, body) = create(&state, "department-enrollment", social(json!("UG"))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
  let (status, _) = create(&state, "department-enrollment", social(Value::Null)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  let (status, body) = create(&state, "department-enrollment", social(json!("PG"))).await;
  assert_eq!(status, StatusCode::CREATED, "{body}");

  // Scopes off the roster are not checked.
  let (status, _) = create(&state, "department-enrollment", json!([{
    "scope": "Zoology", "subcategory_id": 1, "gender": "Male", "count": 1,
  }]))
  .await;
  assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn bad_academic_year_is_rejected() {
  let state = make_state().await;
  let (status, _) = send(
    &state,
    "GET",
    "/teaching-staff/facts?academic_year=2024-26",
    vec![],
    None,
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_unknown_row_is_not_found() {
  let state = make_state().await;
  let (status, _) = send(
    &state,
    "PUT",
    "/teaching-staff/facts",
    vec![],
    Some(json!({
      "academic_year": "2024-25",
      "records": [{ "row_id": uuid::Uuid::new_v4(), "count": 2 }],
    })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_year_needs_admin() {
  let state = make_state().await;
  create(&state, "teaching-staff", json!([group("Physics", json!("Male"), 1)])).await;

  let uri = "/teaching-staff/facts?academic_year=2024-25";
  let (status, _) = send(&state, "DELETE", uri, vec![role("office")], None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, body) = send(&state, "DELETE", uri, vec![admin()], None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["deleted"], 1);
}

// ── Summary & completion ─────────────────────────────────────────────────────

#[tokio::test]
async fn summary_zero_fills_category() {
  let state = make_state().await;
  create(
    &state,
    "non-teaching-staff",
    json!([group("Group B", json!("Male"), 3), group("Group B", json!("Female"), 1)]),
  )
  .await;

  let (status, body) = send(
    &state,
    "GET",
    "/non-teaching-staff/summary?academic_year=2024-25&category=Special%20Category",
    vec![],
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(
    body[0],
    json!({ "subcategory": "PwBD", "male": 3, "female": 1, "transgender": 0, "total": 4 })
  );
  assert_eq!(body.as_array().unwrap().len(), 3);
  assert_eq!(body[1]["total"], 0);
}

#[tokio::test]
async fn summary_by_scope_reports_every_roster_scope() {
  let state = make_state().await;
  let uri = "/non-teaching-staff/summary?academic_year=2024-25\
             &by_scope=true&category=Special%20Category";

  let (status, body) = send(&state, "GET", uri, vec![], None).await;
  assert_eq!(status, StatusCode::OK);
  let totals = body.as_array().unwrap();
  assert_eq!(totals.len(), 9, "three groups times three special subcategories");
  assert!(totals.iter().all(|t| t["total"] == 0));
  assert_eq!(totals[0]["scope"], "Group B");
  assert_eq!(totals[8]["scope"], "Group D");

  create(&state, "non-teaching-staff", json!([group("Group C", json!("Male"), 2)])).await;
  let (_, body) = send(&state, "GET", uri, vec![], None).await;
  assert_eq!(body.as_array().unwrap().len(), 9);
  assert_eq!(body[3], json!({
    "scope": "Group C", "subcategory": "PwBD",
    "male": 2, "female": 0, "transgender": 0, "total": 2,
  }));
}

#[tokio::test]
async fn summary_unknown_category_is_bad_request() {
  let state = make_state().await;
  let (status, _) = send(
    &state,
    "GET",
    "/teaching-staff/summary?academic_year=2024-25&category=Caste",
    vec![],
    None,
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn completion_reports_each_group() {
  let state = make_state().await;
  create(&state, "non-teaching-staff", json!([group("Group B", json!("Male"), 3)])).await;

  let (status, body) = send(
    &state,
    "GET",
    "/non-teaching-staff/completion?academic_year=2024-25",
    vec![],
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["can_finalize"], false);
  assert_eq!(body["scopes"]["Group B"], "Completed");
  assert_eq!(body["scopes"]["Group C"], "Incompleted");
}

// ── Ledger ───────────────────────────────────────────────────────────────────

async fn fill_all_groups(state: &ApiState<SqliteStore>) {
  let (status, _) = create(
    state,
    "non-teaching-staff",
    json!([
      group("Group B", json!("Male"), 3),
      group("Group C", json!("Female"), 2),
      group("Group D", json!("Transgender"), 1),
    ]),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
}

fn final_body() -> Option<Value> {
  Some(json!({ "academic_year": "2024-25", "status": "Completed" }))
}

#[tokio::test]
async fn final_submit_waits_for_every_group() {
  let state = make_state().await;
  create(&state, "non-teaching-staff", json!([group("Group B", json!("Female"), 1)])).await;

  let uri = "/non-teaching-staff/final-submit";
  let (status, body) = send(&state, "POST", uri, vec![], final_body()).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].as_str().unwrap().contains("Group C"));

  fill_all_groups(&state).await;
  let (status, body) = send(&state, "POST", uri, vec![], final_body()).await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  assert_eq!(body["is_locked"], true);

  let (status, _) = send(&state, "POST", uri, vec![], final_body()).await;
  assert_eq!(status, StatusCode::CONFLICT, "locked record must reject resubmission");
}

#[tokio::test]
async fn final_submit_requires_completed_status() {
  let state = make_state().await;
  let (status, _) = send(
    &state,
    "POST",
    "/teaching-staff/final-submit",
    vec![],
    Some(json!({ "academic_year": "2024-25", "status": "Incompleted" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lock_blocks_writes_until_admin_unlocks() {
  let state = make_state().await;
  fill_all_groups(&state).await;

  let (_, record) = send(
    &state,
    "POST",
    "/non-teaching-staff/final-submit",
    vec![],
    final_body(),
  )
  .await;
  let id = record["id"].as_str().unwrap().to_string();

  let (_, lock) = send(
    &state,
    "GET",
    "/non-teaching-staff/lock?academic_year=2024-25&scope=Group%20B",
    vec![],
    None,
  )
  .await;
  assert_eq!(lock["is_locked"], true);

  let (_, rows) = send(
    &state,
    "GET",
    "/non-teaching-staff/facts?academic_year=2024-25&scope=Group%20B",
    vec![],
    None,
  )
  .await;
  let row_id = rows[0]["row_id"].clone();
  let update = json!({
    "academic_year": "2024-25",
    "records": [{ "row_id": row_id, "count": 5 }],
  });

  let (status, _) = send(&state, "PUT", "/non-teaching-staff/facts", vec![], Some(update.clone())).await;
  assert_eq!(status, StatusCode::CONFLICT);
  let (status, _) = create(&state, "non-teaching-staff", json!([group("Group C", json!(1), 1)])).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let lock_uri = format!("/submissions/{id}/lock");
  let (status, body) = send(
    &state,
    "PATCH",
    &lock_uri,
    vec![admin()],
    Some(json!({ "locked": false })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["is_locked"], false);

  let (status, body) = send(&state, "PUT", "/non-teaching-staff/facts", vec![], Some(update)).await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body[0]["count"], 5);
}

#[tokio::test]
async fn lock_toggle_requires_admin_credentials() {
  let state = make_state().await;
  fill_all_groups(&state).await;
  let (_, record) = send(
    &state,
    "POST",
    "/non-teaching-staff/final-submit",
    vec![],
    final_body(),
  )
  .await;
  let uri = format!("/submissions/{}/lock", record["id"].as_str().unwrap());
  let body = Some(json!({ "locked": false }));

  let (status, _) = send(&state, "PATCH", &uri, vec![role("principal")], body.clone()).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = send(&state, "PATCH", &uri, vec![role("admin")], body.clone()).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let bad = (header::AUTHORIZATION, format!("Basic {}", B64.encode("admin:nope")));
  let mut builder = Request::builder().method("PATCH").uri(&uri);
  builder = builder
    .header(bad.0, bad.1)
    .header(header::CONTENT_TYPE, "application/json");
  let resp = api_router(state.clone())
    .oneshot(builder.body(Body::from(r#"{"locked":false}"#)).unwrap())
    .await
    .unwrap();
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn submissions_list_includes_defaults() {
  let state = make_state().await;
  create(&state, "teaching-staff", json!([group("Physics", json!("Male"), 1)])).await;
  let (status, _) = send(
    &state,
    "POST",
    "/teaching-staff/final-submit",
    vec![],
    final_body(),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, body) = send(&state, "GET", "/submissions?academic_year=2024-25", vec![], None).await;
  assert_eq!(status, StatusCode::OK);
  let records = body.as_array().unwrap();
  assert_eq!(records.len(), 5);

  let teaching = records
    .iter()
    .find(|r| r["submission_type"] == "teaching-staff")
    .unwrap();
  assert_eq!(teaching["is_locked"], true);
  let id = teaching["id"].as_str().unwrap().to_string();

  let defaults: Vec<_> = records
    .iter()
    .filter(|r| r["id"].as_str().unwrap().starts_with("default-"))
    .collect();
  assert_eq!(defaults.len(), 4);

  let (status, _) = send(&state, "DELETE", &format!("/submissions/{id}"), vec![admin()], None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (_, body) = send(&state, "GET", "/submissions?academic_year=2024-25", vec![], None).await;
  let teaching = body
    .as_array()
    .unwrap()
    .iter()
    .find(|r| r["submission_type"] == "teaching-staff")
    .unwrap()
    .clone();
  assert_eq!(teaching["id"], "default-teaching-staff");
  assert_eq!(teaching["is_locked"], false);
}

#[tokio::test]
async fn default_ids_cannot_be_deleted() {
  let state = make_state().await;
  let (status, _) = send(
    &state,
    "DELETE",
    "/submissions/default-teaching-staff",
    vec![admin()],
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}
