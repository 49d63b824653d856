//! Declarative table of what each submission type needs before it can be
//! finalised. Consumed by both the evaluator and the orchestration policy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fact::{DegreeLevel, SubmissionType};

pub const NON_TEACHING_GROUPS: [&str; 3] = ["Group B", "Group C", "Group D"];

/// Departments reporting enrollment, each at the single degree level it
/// offers.
pub const DEPARTMENTS: [(&str, DegreeLevel); 10] = [
  ("Computer Science", DegreeLevel::UG),
  ("Mathematics", DegreeLevel::UG),
  ("Physics", DegreeLevel::UG),
  ("Chemistry", DegreeLevel::UG),
  ("Commerce", DegreeLevel::UG),
  ("English", DegreeLevel::UG),
  ("Economics", DegreeLevel::UG),
  ("Computer Applications", DegreeLevel::PG),
  ("Business Administration", DegreeLevel::PG),
  ("Social Work", DegreeLevel::PG),
];

/// One scope that must be Completed, optionally at a fixed degree level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRequirement {
  pub scope:        String,
  #[serde(default)]
  pub degree_level: Option<DegreeLevel>,
}

impl ScopeRequirement {
  pub fn new(scope: impl Into<String>, degree_level: Option<DegreeLevel>) -> Self {
    Self { scope: scope.into(), degree_level }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "scopes", rename_all = "snake_case")]
pub enum Requirement {
  /// The whole academic year is one unit; any qualifying row completes it.
  AnyRow,
  /// Every listed scope must be Completed.
  Scopes(Vec<ScopeRequirement>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster(BTreeMap<SubmissionType, Requirement>);

impl Roster {
  /// Types without an entry are treated as [`Requirement::AnyRow`].
  pub fn requirement(&self, submission_type: SubmissionType) -> Requirement {
    self
      .0
      .get(&submission_type)
      .cloned()
      .unwrap_or(Requirement::AnyRow)
  }

  pub fn with(mut self, submission_type: SubmissionType, req: Requirement) -> Self {
    self.0.insert(submission_type, req);
    self
  }

  /// The requirement for `scope` within a scoped type, if it is on the roster.
  pub fn scope(
    &self,
    submission_type: SubmissionType,
    scope: &str,
  ) -> Option<ScopeRequirement> {
    match self.requirement(submission_type) {
      Requirement::AnyRow => None,
      Requirement::Scopes(scopes) => scopes.into_iter().find(|s| s.scope == scope),
    }
  }

  /// Listed scope names in roster order; empty for [`Requirement::AnyRow`].
  pub fn scope_names(&self, submission_type: SubmissionType) -> Vec<String> {
    match self.requirement(submission_type) {
      Requirement::AnyRow => Vec::new(),
      Requirement::Scopes(scopes) => scopes.into_iter().map(|s| s.scope).collect(),
    }
  }
}

impl Default for Roster {
  fn default() -> Self {
    let groups = NON_TEACHING_GROUPS
      .iter()
      .map(|g| ScopeRequirement::new(*g, None))
      .collect();
    let departments = DEPARTMENTS
      .iter()
      .map(|(d, level)| ScopeRequirement::new(*d, Some(*level)))
      .collect();

    Self(BTreeMap::new())
      .with(SubmissionType::TeachingStaff, Requirement::AnyRow)
      .with(SubmissionType::NonTeachingStaff, Requirement::Scopes(groups))
      .with(SubmissionType::DepartmentEnrollment, Requirement::Scopes(departments))
      .with(SubmissionType::StudentEnrollment, Requirement::AnyRow)
      .with(SubmissionType::StudentExamination, Requirement::AnyRow)
  }
}
