//! Handlers for `/{type}/facts` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/{type}/facts` | `?academic_year` required; optional `scope`, `degree_level`, `year_slot` |
//! | `POST`   | `/{type}/facts` | Body: [`CreateBody`]; returns 201 + stored rows |
//! | `PUT`    | `/{type}/facts` | Body: [`UpdateBody`]; count-only |
//! | `DELETE` | `/{type}/facts` | `?academic_year`; admin only |

use std::collections::HashMap;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use census_core::{
  fact::{
    AcademicYear, CountUpdate, DegreeLevel, FactFilter, FactRow, Gender,
    GenderRef, LabeledFact, NewFactRow, SubmissionType,
  },
  roster::Roster,
  store::CensusStore,
};
use serde::Deserialize;
use serde_json::json;

use crate::{ApiState, auth::Actor, error::ApiError, submissions::ensure_unlocked};

// ─── Read ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReadParams {
  pub academic_year: AcademicYear,
  pub scope:         Option<String>,
  pub degree_level:  Option<DegreeLevel>,
  pub year_slot:     Option<String>,
}

/// `GET /{type}/facts?academic_year=2024-25[&scope=...][&degree_level=UG][&year_slot=I]`
pub async fn read<S: CensusStore>(
  State(state): State<ApiState<S>>,
  Path(submission_type): Path<SubmissionType>,
  Query(params): Query<ReadParams>,
) -> Result<Json<Vec<LabeledFact>>, ApiError> {
  let filter = FactFilter {
    scope: params.scope,
    degree_level: params.degree_level,
    year_slot: params.year_slot,
    ..FactFilter::year(params.academic_year, submission_type)
  };
  let rows = state
    .store
    .get_facts(&filter)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(rows))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// One record of a create batch, in either shape the forms send.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RecordBody {
  /// One gender, one count.
  Atomic {
    scope:          String,
    subcategory_id: i64,
    gender:         GenderRef,
    count:          i64,
    degree_level:   Option<DegreeLevel>,
    year_slot:      Option<String>,
  },
  /// One column per gender; absent or zero columns produce no row.
  Columns {
    scope:          String,
    subcategory_id: i64,
    #[serde(default)]
    male:           i64,
    #[serde(default)]
    female:         i64,
    #[serde(default)]
    transgender:    i64,
    degree_level:   Option<DegreeLevel>,
    year_slot:      Option<String>,
  },
}

/// JSON body accepted by `POST /{type}/facts`.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub academic_year: AcademicYear,
  pub records:       Vec<RecordBody>,
}

impl CreateBody {
  /// Expand every record into atomic rows. Counts are left for the store to
  /// validate, except that a negative column is rejected here since a zero
  /// column is silently skipped.
  pub fn into_rows(
    self,
    submission_type: SubmissionType,
  ) -> Result<Vec<NewFactRow>, ApiError> {
    let academic_year = self.academic_year;
    let mut rows = Vec::new();

    for record in self.records {
      match record {
        RecordBody::Atomic {
          scope,
          subcategory_id,
          gender,
          count,
          degree_level,
          year_slot,
        } => rows.push(NewFactRow {
          academic_year: academic_year.clone(),
          submission_type,
          scope,
          subcategory_id,
          gender: Gender::resolve(&gender)?,
          count,
          degree_level,
          year_slot,
        }),
        RecordBody::Columns {
          scope,
          subcategory_id,
          male,
          female,
          transgender,
          degree_level,
          year_slot,
        } => {
          let columns = [
            (Gender::Male, male),
            (Gender::Female, female),
            (Gender::Transgender, transgender),
          ];
          if columns.iter().all(|(_, c)| *c == 0) {
            return Err(ApiError::BadRequest(format!(
              "record for {scope} / subcategory {subcategory_id} has no counts"
            )));
          }
          for (gender, count) in columns {
            if count < 0 {
              return Err(ApiError::BadRequest(format!(
                "{gender} count for {scope} must be positive, got {count}"
              )));
            }
            if count == 0 {
              continue;
            }
            rows.push(NewFactRow {
              academic_year: academic_year.clone(),
              submission_type,
              scope: scope.clone(),
              subcategory_id,
              gender,
              count,
              degree_level,
              year_slot: year_slot.clone(),
            });
          }
        }
      }
    }

    if rows.is_empty() {
      return Err(ApiError::BadRequest("no records to create".into()));
    }
    Ok(rows)
  }
}

/// Rows for a roster scope that is tracked per degree level must carry that
/// level, or completion would never see them.
fn check_degree_levels(
  roster: &Roster,
  submission_type: SubmissionType,
  rows: &[NewFactRow],
) -> Result<(), ApiError> {
  for row in rows {
    let Some(expected) = roster
      .scope(submission_type, &row.scope)
      .and_then(|r| r.degree_level)
    else {
      continue;
    };
    if row.degree_level != Some(expected) {
      let got = row
        .degree_level
        .map_or_else(|| "none".to_string(), |l| l.to_string());
      return Err(ApiError::BadRequest(format!(
        "{} rows for {} must have degree level {expected}, got {got}",
        submission_type, row.scope
      )));
    }
  }
  Ok(())
}

/// `POST /{type}/facts`: returns 201 + the stored rows, 400 if a row's degree
/// level disagrees with the roster, 409 if any target scope is locked or a
/// row already exists.
pub async fn create<S: CensusStore>(
  State(state): State<ApiState<S>>,
  Path(submission_type): Path<SubmissionType>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let academic_year = body.academic_year.clone();
  let rows = body.into_rows(submission_type)?;
  check_degree_levels(state.policy.roster(), submission_type, &rows)?;

  ensure_unlocked(
    state.store.as_ref(),
    &academic_year,
    submission_type,
    rows.iter().map(|r| r.scope.as_str()),
  )
  .await?;

  let stored = state
    .store
    .insert_facts(rows)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(stored)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `PUT /{type}/facts`.
#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub academic_year: AcademicYear,
  pub records:       Vec<CountUpdate>,
}

/// `PUT /{type}/facts`: sets counts of existing rows. Rows outside the given
/// year and type are reported as not found.
pub async fn update<S: CensusStore>(
  State(state): State<ApiState<S>>,
  Path(submission_type): Path<SubmissionType>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Vec<FactRow>>, ApiError> {
  if body.records.is_empty() {
    return Err(ApiError::BadRequest("no records to update".into()));
  }
  for update in &body.records {
    update.validate()?;
  }

  let existing = state
    .store
    .get_facts(&FactFilter::year(body.academic_year.clone(), submission_type))
    .await
    .map_err(ApiError::from_store)?;
  let scopes: HashMap<_, _> = existing
    .iter()
    .map(|lf| (lf.fact.row_id, lf.fact.scope.as_str()))
    .collect();

  let mut touched = Vec::with_capacity(body.records.len());
  for update in &body.records {
    let scope = scopes.get(&update.row_id).ok_or_else(|| {
      ApiError::NotFound(format!(
        "row {} not found in {} {}",
        update.row_id, submission_type, body.academic_year
      ))
    })?;
    touched.push(*scope);
  }

  ensure_unlocked(
    state.store.as_ref(),
    &body.academic_year,
    submission_type,
    touched.into_iter(),
  )
  .await?;

  let updated = state
    .store
    .update_counts(body.records)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(updated))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct YearParams {
  pub academic_year: AcademicYear,
}

/// `DELETE /{type}/facts?academic_year=2024-25`: admin only.
pub async fn delete_year<S: CensusStore>(
  State(state): State<ApiState<S>>,
  actor: Actor,
  Path(submission_type): Path<SubmissionType>,
  Query(params): Query<YearParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
  actor.require_admin()?;
  let deleted = state
    .store
    .delete_facts_for_year(params.academic_year, submission_type)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(json!({ "deleted": deleted })))
}
