//! The `CensusStore` trait: fact-row persistence plus the submission ledger.
//!
//! The trait is implemented by storage backends (e.g. `census-store-sqlite`).
//! The evaluator, the orchestration policy and the HTTP layer depend on this
//! abstraction, not on any concrete backend.
//!
//! Stores do not refuse writes to locked submissions. Callers check
//! [`CensusStore::list_submissions`] (or [`crate::ledger::locks_scope`]) first.

use std::future::Future;

use uuid::Uuid;

use crate::{
  error::Classify,
  fact::{
    AcademicYear, CountUpdate, FactFilter, FactRow, LabeledFact, NewFactRow,
    Subcategory, SubmissionType,
  },
  ledger::{NewSubmission, SubmissionRecord},
};

/// Abstraction over a census store backend.
///
/// Multi-row writes are atomic: either every row of a batch is applied or
/// none is. For explicit-status types the store re-derives the `status`
/// column inside the same unit of work as the write.
pub trait CensusStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Catalog ─────────────────────────────────────────────────────────────

  /// Every subcategory with its category name, ordered by id.
  fn list_subcategories(
    &self,
  ) -> impl Future<Output = Result<Vec<Subcategory>, Self::Error>> + Send + '_;

  // ── Facts ───────────────────────────────────────────────────────────────

  /// Validate and insert a batch of rows. Rejects the whole batch if any row
  /// has a non-positive count or references an unknown subcategory.
  fn insert_facts(
    &self,
    rows: Vec<NewFactRow>,
  ) -> impl Future<Output = Result<Vec<FactRow>, Self::Error>> + Send + '_;

  /// Rows matching `filter`, joined with their dimension labels.
  fn get_facts<'a>(
    &'a self,
    filter: &'a FactFilter,
  ) -> impl Future<Output = Result<Vec<LabeledFact>, Self::Error>> + Send + 'a;

  /// Rewrite the counts of existing rows. Never inserts; an unknown row id
  /// rejects the whole batch.
  fn update_counts(
    &self,
    updates: Vec<CountUpdate>,
  ) -> impl Future<Output = Result<Vec<FactRow>, Self::Error>> + Send + '_;

  /// Administrative delete of every row of a type in a year. Returns the
  /// number of rows removed.
  fn delete_facts_for_year(
    &self,
    academic_year: AcademicYear,
    submission_type: SubmissionType,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Re-derive the stored `status` of every row of `(year, type)` from the
  /// presence of a positive count in its group. Returns rows touched.
  fn recompute_status(
    &self,
    academic_year: AcademicYear,
    submission_type: SubmissionType,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Ledger ──────────────────────────────────────────────────────────────

  /// Upsert the single record for `(year, type, scope)` with
  /// `is_locked = true` and `submitted_at = now`.
  fn final_submit(
    &self,
    input: NewSubmission,
  ) -> impl Future<Output = Result<SubmissionRecord, Self::Error>> + Send + '_;

  fn get_submission(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<SubmissionRecord>, Self::Error>> + Send + '_;

  /// All stored records for a year and type, type-level record first.
  fn list_submissions(
    &self,
    academic_year: AcademicYear,
    submission_type: SubmissionType,
  ) -> impl Future<Output = Result<Vec<SubmissionRecord>, Self::Error>> + Send + '_;

  /// Flip `is_locked`. Status and `submitted_at` are left untouched.
  fn set_lock(
    &self,
    id: Uuid,
    locked: bool,
  ) -> impl Future<Output = Result<SubmissionRecord, Self::Error>> + Send + '_;

  fn delete_submission(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
