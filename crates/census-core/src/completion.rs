//! Completion evaluation.
//!
//! Status is derived on demand from the rows of a scope. Store failures are
//! logged and reported as `Incompleted` so read-only dashboards stay
//! renderable.

use crate::{
  fact::{
    AcademicYear, CompletionRule, CompletionStatus, FactFilter, LabeledFact,
    SubmissionType,
  },
  roster::ScopeRequirement,
  store::CensusStore,
};

/// Decide completion of an already-fetched set of rows.
pub fn status_of(rows: &[LabeledFact], rule: CompletionRule) -> CompletionStatus {
  let present = match rule {
    CompletionRule::Presence => rows.iter().any(|r| r.fact.count > 0),
    CompletionRule::ExplicitStatus => rows
      .iter()
      .any(|r| r.fact.status == Some(CompletionStatus::Completed)),
  };
  CompletionStatus::from_presence(present)
}

pub struct CompletionEvaluator<'a, S> {
  store: &'a S,
}

impl<'a, S: CensusStore> CompletionEvaluator<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store } }

  /// Status of `scope` (or of the whole year when `None`) under the rule of
  /// `submission_type`.
  pub async fn evaluate(
    &self,
    academic_year: &AcademicYear,
    submission_type: SubmissionType,
    scope: Option<&ScopeRequirement>,
  ) -> CompletionStatus {
    let filter = FactFilter {
      scope: scope.map(|s| s.scope.clone()),
      degree_level: scope.and_then(|s| s.degree_level),
      ..FactFilter::year(academic_year.clone(), submission_type)
    };

    match self.store.get_facts(&filter).await {
      Ok(rows) => status_of(&rows, submission_type.completion_rule()),
      Err(e) => {
        tracing::warn!(
          %academic_year,
          %submission_type,
          scope = scope.map(|s| s.scope.as_str()),
          error = %e,
          "completion evaluation failed; reporting Incompleted"
        );
        CompletionStatus::Incompleted
      }
    }
  }
}
