//! Submission ledger: one terminal record per
//! `(academic_year, submission_type, scope)` and its lock lifecycle.
//!
//! ```text
//! NoSubmission ──final_submit──▶ Locked ◀──lock── Submitted
//!                                  │                 ▲
//!                                  └─────unlock──────┘   (admin only)
//! ```
//!
//! Persistence lives behind [`crate::store::CensusStore`]; this module owns the
//! record types and the transition rules.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  fact::{AcademicYear, CompletionStatus, SubmissionType},
};

// ─── Ids ─────────────────────────────────────────────────────────────────────

/// Identifier of a ledger record.
///
/// `Default` ids belong to records synthesised for types with nothing stored
/// yet; they serialise as `default-<type-slug>` and must never be passed to
/// destructive operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SubmissionId {
  Stored(Uuid),
  Default(SubmissionType),
}

impl SubmissionId {
  pub const DEFAULT_PREFIX: &'static str = "default-";

  pub fn is_virtual(&self) -> bool { matches!(self, Self::Default(_)) }

  pub fn stored(&self) -> Option<Uuid> {
    match self {
      Self::Stored(id) => Some(*id),
      Self::Default(_) => None,
    }
  }
}

impl fmt::Display for SubmissionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Stored(id) => write!(f, "{id}"),
      Self::Default(t) => write!(f, "{}{}", Self::DEFAULT_PREFIX, t.slug()),
    }
  }
}

impl TryFrom<String> for SubmissionId {
  type Error = Error;

  fn try_from(raw: String) -> Result<Self> {
    if let Some(slug) = raw.strip_prefix(Self::DEFAULT_PREFIX) {
      return SubmissionType::from_slug(slug)
        .map(Self::Default)
        .ok_or_else(|| Error::Validation(format!("unknown submission id {raw:?}")));
    }
    Uuid::parse_str(&raw)
      .map(Self::Stored)
      .map_err(|_| Error::Validation(format!("unknown submission id {raw:?}")))
  }
}

impl From<SubmissionId> for String {
  fn from(id: SubmissionId) -> Self { id.to_string() }
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
  pub id:              SubmissionId,
  pub academic_year:   AcademicYear,
  pub submission_type: SubmissionType,
  /// `None` for a whole composite type.
  pub scope:           Option<String>,
  pub status:          CompletionStatus,
  pub is_locked:       bool,
  pub submitted_at:    Option<DateTime<Utc>>,
}

impl SubmissionRecord {
  /// The placeholder reported when nothing has been submitted.
  pub fn default_for(
    academic_year: AcademicYear,
    submission_type: SubmissionType,
  ) -> Self {
    Self {
      id: SubmissionId::Default(submission_type),
      academic_year,
      submission_type,
      scope: None,
      status: CompletionStatus::Incompleted,
      is_locked: false,
      submitted_at: None,
    }
  }
}

/// Input to [`crate::store::CensusStore::final_submit`].
#[derive(Debug, Clone)]
pub struct NewSubmission {
  pub academic_year:   AcademicYear,
  pub submission_type: SubmissionType,
  pub scope:           Option<String>,
  pub status:          CompletionStatus,
}

/// The stored record, or the synthesised default when there is none.
pub fn current_or_default(
  found: Option<SubmissionRecord>,
  academic_year: &AcademicYear,
  submission_type: SubmissionType,
) -> SubmissionRecord {
  found.unwrap_or_else(|| {
    SubmissionRecord::default_for(academic_year.clone(), submission_type)
  })
}

/// Whether writes to `scope` are blocked by `records` (all of one year and
/// type). A type-level lock covers every scope.
pub fn locks_scope(records: &[SubmissionRecord], scope: Option<&str>) -> bool {
  records.iter().any(|r| {
    r.is_locked && (r.scope.is_none() || r.scope.as_deref() == scope)
  })
}

// ─── Actors ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
  Admin,
  Office,
  Department,
  Principal,
}

impl Role {
  /// Only admins may lock, unlock or delete submissions.
  pub fn is_privileged(self) -> bool { matches!(self, Self::Admin) }
}

// ─── State machine ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
  NoSubmission,
  Submitted,
  Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAction {
  FinalSubmit,
  Lock,
  Unlock,
  Delete,
}

impl SubmissionState {
  pub fn of(record: Option<&SubmissionRecord>) -> Self {
    match record {
      None => Self::NoSubmission,
      Some(r) if r.id.is_virtual() => Self::NoSubmission,
      Some(r) if r.is_locked => Self::Locked,
      Some(_) => Self::Submitted,
    }
  }

  /// The state after `action` by `role`, or why it is not allowed.
  pub fn apply(self, action: LedgerAction, role: Role) -> Result<Self> {
    use LedgerAction::*;
    use SubmissionState::*;

    if action != FinalSubmit && !role.is_privileged() {
      return Err(Error::Forbidden(format!(
        "{role:?} may not {action:?} a submission"
      )));
    }

    match (self, action) {
      (Locked, FinalSubmit) => {
        Err(Error::Conflict("submission is locked".into()))
      }
      (_, FinalSubmit) => Ok(Locked),
      (NoSubmission, _) => {
        Err(Error::NotFound("no submission recorded".into()))
      }
      (_, Lock) => Ok(Locked),
      (_, Unlock) => Ok(Submitted),
      (_, Delete) => Ok(NoSubmission),
    }
  }
}
