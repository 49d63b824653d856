//! Cross-scope finalisation rule: a composite type may be finally submitted
//! only when every scope the roster requires is Completed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  completion::CompletionEvaluator,
  fact::{AcademicYear, CompletionStatus, SubmissionType},
  roster::{Requirement, Roster},
  store::CensusStore,
};

/// Outcome of [`OrchestrationPolicy::can_finalize`], with the per-scope map
/// shown on dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalization {
  pub academic_year:   AcademicYear,
  pub submission_type: SubmissionType,
  pub can_finalize:    bool,
  pub scopes:          BTreeMap<String, CompletionStatus>,
}

impl Finalization {
  pub fn incomplete_scopes(&self) -> Vec<&str> {
    self
      .scopes
      .iter()
      .filter(|(_, s)| !s.is_completed())
      .map(|(scope, _)| scope.as_str())
      .collect()
  }
}

#[derive(Debug, Clone, Default)]
pub struct OrchestrationPolicy {
  roster: Roster,
}

impl OrchestrationPolicy {
  pub fn new(roster: Roster) -> Self { Self { roster } }

  pub fn roster(&self) -> &Roster { &self.roster }

  /// Poll the evaluator for every required scope. Performs no writes.
  ///
  /// A scoped requirement with an empty scope list never finalises.
  pub async fn can_finalize<S: CensusStore>(
    &self,
    store: &S,
    academic_year: &AcademicYear,
    submission_type: SubmissionType,
  ) -> Finalization {
    let evaluator = CompletionEvaluator::new(store);
    let mut scopes = BTreeMap::new();

    match self.roster.requirement(submission_type) {
      Requirement::AnyRow => {
        let status = evaluator.evaluate(academic_year, submission_type, None).await;
        scopes.insert(submission_type.to_string(), status);
      }
      Requirement::Scopes(required) => {
        for req in &required {
          let status = evaluator
            .evaluate(academic_year, submission_type, Some(req))
            .await;
          scopes.insert(req.scope.clone(), status);
        }
      }
    }

    let can_finalize =
      !scopes.is_empty() && scopes.values().all(|s| s.is_completed());

    tracing::debug!(
      %academic_year,
      %submission_type,
      can_finalize,
      "evaluated finalisation"
    );

    Finalization {
      academic_year: academic_year.clone(),
      submission_type,
      can_finalize,
      scopes,
    }
  }
}
