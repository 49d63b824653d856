//! Read-only derived views: the dimension catalog, aggregated totals and
//! completion status.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/dimensions` | Subcategories with their category names |
//! | `GET`  | `/{type}/summary` | `?academic_year` required; optional `by_scope`, `category` |
//! | `GET`  | `/{type}/completion` | `?academic_year`; per-scope statuses and `can_finalize` |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use census_core::{
  aggregate::{AggregateTotal, CountRow, GroupBy, aggregate_with_scopes},
  fact::{AcademicYear, FactFilter, Subcategory, SubmissionType},
  policy::Finalization,
  store::CensusStore,
};
use serde::Deserialize;

use crate::{ApiState, error::ApiError, facts::YearParams};

/// `GET /dimensions`
pub async fn dimensions<S: CensusStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<Subcategory>>, ApiError> {
  let subs = state
    .store
    .list_subcategories()
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(subs))
}

// ─── Summary ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
  pub academic_year: AcademicYear,
  /// Report one total per scope instead of one per subcategory.
  #[serde(default)]
  pub by_scope:      bool,
  /// Restrict to this category's subcategories and zero-fill missing ones.
  pub category:      Option<String>,
}

/// `GET /{type}/summary?academic_year=2024-25[&by_scope=true][&category=Special Category]`
///
/// An unknown category is a 400. With a category and `by_scope`, every roster
/// scope of the type is reported even when it has no rows. A failed fact
/// read is logged and reported as an empty summary.
pub async fn summary<S: CensusStore>(
  State(state): State<ApiState<S>>,
  Path(submission_type): Path<SubmissionType>,
  Query(params): Query<SummaryParams>,
) -> Result<Json<Vec<AggregateTotal>>, ApiError> {
  let universe = match &params.category {
    None => None,
    Some(category) => {
      let names: Vec<String> = state
        .store
        .list_subcategories()
        .await
        .map_err(ApiError::from_store)?
        .into_iter()
        .filter(|s| s.category.eq_ignore_ascii_case(category.trim()))
        .map(|s| s.name)
        .collect();
      if names.is_empty() {
        return Err(ApiError::BadRequest(format!("unknown category {category:?}")));
      }
      Some(names)
    }
  };

  let filter = FactFilter::year(params.academic_year.clone(), submission_type);
  let rows = match state.store.get_facts(&filter).await {
    Ok(rows) => rows,
    Err(e) => {
      tracing::warn!(
        academic_year = %params.academic_year,
        %submission_type,
        error = %e,
        "summary read failed; reporting no totals"
      );
      return Ok(Json(Vec::new()));
    }
  };

  let counts: Vec<CountRow> = rows.iter().map(CountRow::from).collect();
  let known_scopes = state.policy.roster().scope_names(submission_type);
  let totals = aggregate_with_scopes(
    &counts,
    GroupBy { scope: params.by_scope },
    universe.as_deref(),
    &known_scopes,
  );
  Ok(Json(totals))
}

// ─── Completion ───────────────────────────────────────────────────────────────

/// `GET /{type}/completion?academic_year=2024-25`
pub async fn completion<S: CensusStore>(
  State(state): State<ApiState<S>>,
  Path(submission_type): Path<SubmissionType>,
  Query(params): Query<YearParams>,
) -> Json<Finalization> {
  let finalization = state
    .policy
    .can_finalize(state.store.as_ref(), &params.academic_year, submission_type)
    .await;
  Json(finalization)
}
