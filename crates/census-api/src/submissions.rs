//! Handlers for the submission ledger.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/{type}/lock` | `?academic_year` required; optional `scope` |
//! | `POST`   | `/{type}/final-submit` | Body: [`FinalSubmitBody`]; returns 201 + locked record |
//! | `GET`    | `/submissions` | `?academic_year`; one record per type, defaults included |
//! | `PATCH`  | `/submissions/{id}/lock` | Body: `{"locked": bool}`; admin only |
//! | `DELETE` | `/submissions/{id}` | admin only |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use census_core::{
  completion::CompletionEvaluator,
  fact::{AcademicYear, CompletionStatus, SubmissionType},
  ledger::{
    LedgerAction, NewSubmission, SubmissionId, SubmissionRecord,
    SubmissionState, current_or_default, locks_scope,
  },
  roster::ScopeRequirement,
  store::CensusStore,
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;

use crate::{ApiState, auth::Actor, error::ApiError, facts::YearParams};

// ─── Lock checks ──────────────────────────────────────────────────────────────

/// Fail with 409 if any of `scopes` is covered by a locked record.
pub(crate) async fn ensure_unlocked<'a, S: CensusStore>(
  store: &S,
  academic_year: &AcademicYear,
  submission_type: SubmissionType,
  scopes: impl IntoIterator<Item = &'a str>,
) -> Result<(), ApiError> {
  let mut scopes: Vec<&str> = scopes.into_iter().collect();
  scopes.sort_unstable();
  scopes.dedup();

  let records = store
    .list_submissions(academic_year.clone(), submission_type)
    .await
    .map_err(ApiError::from_store)?;

  if let Some(scope) = scopes.into_iter().find(|s| locks_scope(&records, Some(*s))) {
    return Err(ApiError::Conflict(format!(
      "{submission_type} {academic_year} is locked for {scope}"
    )));
  }
  Ok(())
}

#[derive(Debug, Deserialize)]
pub struct LockParams {
  pub academic_year: AcademicYear,
  pub scope:         Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LockState {
  pub academic_year:   AcademicYear,
  pub submission_type: SubmissionType,
  pub scope:           Option<String>,
  pub is_locked:       bool,
}

/// `GET /{type}/lock?academic_year=2024-25[&scope=Group B]`
pub async fn is_locked<S: CensusStore>(
  State(state): State<ApiState<S>>,
  Path(submission_type): Path<SubmissionType>,
  Query(params): Query<LockParams>,
) -> Result<Json<LockState>, ApiError> {
  let records = state
    .store
    .list_submissions(params.academic_year.clone(), submission_type)
    .await
    .map_err(ApiError::from_store)?;

  let is_locked = match params.scope.as_deref() {
    Some(scope) => locks_scope(&records, Some(scope)),
    None => records.iter().any(|r| r.scope.is_none() && r.is_locked),
  };

  Ok(Json(LockState {
    academic_year: params.academic_year,
    submission_type,
    scope: params.scope,
    is_locked,
  }))
}

// ─── Final submit ─────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /{type}/final-submit`.
#[derive(Debug, Deserialize)]
pub struct FinalSubmitBody {
  pub academic_year: AcademicYear,
  pub status:        CompletionStatus,
  /// Omit to finalise the whole type.
  pub scope:         Option<String>,
}

/// `POST /{type}/final-submit`: records and locks the submission.
///
/// A whole-type submission needs every roster scope Completed; a scoped one
/// needs just that scope. Either way the policy is asked before writing.
pub async fn final_submit<S: CensusStore>(
  State(state): State<ApiState<S>>,
  actor: Actor,
  Path(submission_type): Path<SubmissionType>,
  Json(body): Json<FinalSubmitBody>,
) -> Result<impl IntoResponse, ApiError> {
  if !body.status.is_completed() {
    return Err(ApiError::BadRequest(format!(
      "final submission requires status Completed, got {}",
      body.status
    )));
  }

  let records = state
    .store
    .list_submissions(body.academic_year.clone(), submission_type)
    .await
    .map_err(ApiError::from_store)?;
  let existing = records.iter().find(|r| r.scope == body.scope);
  SubmissionState::of(existing).apply(LedgerAction::FinalSubmit, actor.role)?;

  if let Some(scope) = body.scope.as_deref()
    && locks_scope(&records, Some(scope))
  {
    return Err(ApiError::Conflict(format!(
      "{submission_type} {} is locked",
      body.academic_year
    )));
  }

  match body.scope.as_deref() {
    None => {
      let finalization = state
        .policy
        .can_finalize(state.store.as_ref(), &body.academic_year, submission_type)
        .await;
      if !finalization.can_finalize {
        return Err(ApiError::Conflict(format!(
          "{submission_type} {} is not complete: {}",
          body.academic_year,
          finalization.incomplete_scopes().join(", ")
        )));
      }
    }
    Some(scope) => {
      let requirement = state
        .policy
        .roster()
        .scope(submission_type, scope)
        .unwrap_or_else(|| ScopeRequirement::new(scope, None));
      let status = CompletionEvaluator::new(state.store.as_ref())
        .evaluate(&body.academic_year, submission_type, Some(&requirement))
        .await;
      if !status.is_completed() {
        return Err(ApiError::Conflict(format!(
          "{submission_type} {} is not complete for {scope}",
          body.academic_year
        )));
      }
    }
  }

  let record = state
    .store
    .final_submit(NewSubmission {
      academic_year:   body.academic_year,
      submission_type,
      scope:           body.scope,
      status:          body.status,
    })
    .await
    .map_err(ApiError::from_store)?;

  tracing::info!(id = %record.id, role = %actor.role, "final submit accepted");
  Ok((StatusCode::CREATED, Json(record)))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /submissions?academic_year=2024-25`: the whole-type record of every
/// submission type, or its unlocked default.
pub async fn list<S: CensusStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<YearParams>,
) -> Result<Json<Vec<SubmissionRecord>>, ApiError> {
  let mut out = Vec::new();
  for submission_type in SubmissionType::iter() {
    let records = state
      .store
      .list_submissions(params.academic_year.clone(), submission_type)
      .await
      .map_err(ApiError::from_store)?;
    let whole = records.into_iter().find(|r| r.scope.is_none());
    out.push(current_or_default(whole, &params.academic_year, submission_type));
  }
  Ok(Json(out))
}

// ─── Admin ────────────────────────────────────────────────────────────────────

async fn current_state<S: CensusStore>(
  store: &S,
  id: SubmissionId,
) -> Result<SubmissionState, ApiError> {
  let record = match id.stored() {
    Some(uuid) => store.get_submission(uuid).await.map_err(ApiError::from_store)?,
    None => None,
  };
  Ok(SubmissionState::of(record.as_ref()))
}

fn stored_id(id: SubmissionId) -> Result<uuid::Uuid, ApiError> {
  id.stored()
    .ok_or_else(|| ApiError::NotFound(format!("submission {id} not found")))
}

#[derive(Debug, Deserialize)]
pub struct LockBody {
  pub locked: bool,
}

/// `PATCH /submissions/{id}/lock`: body `{"locked": true|false}`.
pub async fn set_lock<S: CensusStore>(
  State(state): State<ApiState<S>>,
  actor: Actor,
  Path(id): Path<SubmissionId>,
  Json(body): Json<LockBody>,
) -> Result<Json<SubmissionRecord>, ApiError> {
  let action = if body.locked { LedgerAction::Lock } else { LedgerAction::Unlock };
  current_state(state.store.as_ref(), id)
    .await?
    .apply(action, actor.role)?;

  let record = state
    .store
    .set_lock(stored_id(id)?, body.locked)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(record))
}

/// `DELETE /submissions/{id}`: the type reverts to its default record.
pub async fn delete_one<S: CensusStore>(
  State(state): State<ApiState<S>>,
  actor: Actor,
  Path(id): Path<SubmissionId>,
) -> Result<StatusCode, ApiError> {
  current_state(state.store.as_ref(), id)
    .await?
    .apply(LedgerAction::Delete, actor.role)?;

  state
    .store
    .delete_submission(stored_id(id)?)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
