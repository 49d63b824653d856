//! Fact rows: the raw counts every other component is derived from.
//!
//! A fact row is one cell of a data-entry form: the count of people in a
//! `(subcategory, gender)` bucket for a scope in an academic year. Totals and
//! completion status are never stored as the source of truth; they are
//! recomputed from these rows on every read.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Academic year ───────────────────────────────────────────────────────────

/// A reporting period in the canonical `YYYY-YY` form, e.g. `2024-25`.
///
/// The short year must be the long year plus one.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct AcademicYear(String);

impl AcademicYear {
  pub fn parse(raw: &str) -> Result<Self> {
    let invalid =
      || Error::Validation(format!("academic year {raw:?} is not YYYY-YY"));

    let (start, end) = raw.trim().split_once('-').ok_or_else(invalid)?;
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if start.len() != 4 || end.len() != 2 || !digits(start) || !digits(end) {
      return Err(invalid());
    }
    let start: u32 = start.parse().map_err(|_| invalid())?;
    let end: u32 = end.parse().map_err(|_| invalid())?;
    if (start + 1) % 100 != end {
      return Err(invalid());
    }

    Ok(Self(format!("{start:04}-{end:02}")))
  }

  pub fn as_str(&self) -> &str { &self.0 }

  /// The calendar year the period starts in.
  pub fn start_year(&self) -> u32 {
    // Validated on construction.
    self.0[..4].parse().unwrap_or_default()
  }
}

impl TryFrom<String> for AcademicYear {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<AcademicYear> for String {
  fn from(year: AcademicYear) -> Self { year.0 }
}

impl fmt::Display for AcademicYear {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Submission type ─────────────────────────────────────────────────────────

/// Which data-entry form a row or a submission belongs to.
///
/// `Display`/`FromStr` use the human label stored in the database; serde uses
/// the kebab-case slug that appears in URLs and JSON.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionType {
  #[strum(serialize = "Teaching Staff")]
  TeachingStaff,
  #[strum(serialize = "Non-Teaching Staff")]
  NonTeachingStaff,
  #[strum(serialize = "Department Enrollment")]
  DepartmentEnrollment,
  #[strum(serialize = "Student Enrollment")]
  StudentEnrollment,
  #[strum(serialize = "Student Examination")]
  StudentExamination,
}

impl SubmissionType {
  /// Must match the `rename_all = "kebab-case"` serde names above.
  pub fn slug(self) -> &'static str {
    match self {
      Self::TeachingStaff => "teaching-staff",
      Self::NonTeachingStaff => "non-teaching-staff",
      Self::DepartmentEnrollment => "department-enrollment",
      Self::StudentEnrollment => "student-enrollment",
      Self::StudentExamination => "student-examination",
    }
  }

  pub fn from_slug(slug: &str) -> Option<Self> {
    use strum::IntoEnumIterator as _;
    Self::iter().find(|t| t.slug() == slug)
  }

  /// How completion is decided for rows of this type.
  pub fn completion_rule(self) -> CompletionRule {
    match self {
      Self::TeachingStaff
      | Self::NonTeachingStaff
      | Self::DepartmentEnrollment => CompletionRule::Presence,
      Self::StudentEnrollment | Self::StudentExamination => {
        CompletionRule::ExplicitStatus
      }
    }
  }
}

/// The two ways a scope is judged complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionRule {
  /// Completed iff a row with `count > 0` exists. Nothing is stored.
  Presence,
  /// Completed iff a row's denormalised `status` column says so. The column
  /// is rewritten by recomputation after every write.
  ExplicitStatus,
}

// ─── Completion status ───────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
pub enum CompletionStatus {
  Completed,
  #[default]
  Incompleted,
}

impl CompletionStatus {
  pub fn is_completed(self) -> bool { matches!(self, Self::Completed) }

  pub fn from_presence(present: bool) -> Self {
    if present { Self::Completed } else { Self::Incompleted }
  }
}

// ─── Dimensions ──────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumIter,
)]
pub enum Gender {
  Male,
  Female,
  Transgender,
}

impl Gender {
  /// Numeric ids used by the data-entry forms.
  pub fn id(self) -> i64 {
    match self {
      Self::Male => 1,
      Self::Female => 2,
      Self::Transgender => 3,
    }
  }

  pub fn from_id(id: i64) -> Option<Self> {
    match id {
      1 => Some(Self::Male),
      2 => Some(Self::Female),
      3 => Some(Self::Transgender),
      _ => None,
    }
  }

  /// Exact, case-insensitive name match. Used for writes.
  pub fn from_name(name: &str) -> Option<Self> {
    match name.trim().to_ascii_lowercase().as_str() {
      "male" => Some(Self::Male),
      "female" => Some(Self::Female),
      "transgender" => Some(Self::Transgender),
      _ => None,
    }
  }

  /// Resolve a write-side gender reference, rejecting anything unknown.
  pub fn resolve(gender: &GenderRef) -> Result<Self> {
    let resolved = match gender {
      GenderRef::Id(id) => Self::from_id(*id),
      GenderRef::Name(name) => Self::from_name(name),
    };
    resolved.ok_or_else(|| {
      Error::Validation(format!("unknown gender {gender:?}"))
    })
  }
}

/// A gender as it arrives from a client or a legacy row: a numeric id or a
/// free-text name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenderRef {
  Id(i64),
  Name(String),
}

impl From<Gender> for GenderRef {
  fn from(g: Gender) -> Self { Self::Name(g.to_string()) }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum DegreeLevel {
  UG,
  PG,
}

impl DegreeLevel {
  pub fn parse(raw: &str) -> Result<Self> {
    raw.trim().parse().map_err(|_| {
      Error::Validation(format!("invalid degree level {raw:?}"))
    })
  }
}

/// A row of the subcategory catalog, joined with its category name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcategory {
  pub subcategory_id: i64,
  pub category_id:    i64,
  pub category:       String,
  pub name:           String,
}

// ─── FactRow ─────────────────────────────────────────────────────────────────

/// A persisted count. Only `count` (and the derived `status`) ever change
/// after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRow {
  pub row_id:          Uuid,
  pub academic_year:   AcademicYear,
  pub submission_type: SubmissionType,
  /// Department name, staff group, or staff type.
  pub scope:           String,
  pub category_id:     i64,
  pub subcategory_id:  i64,
  pub gender:          Gender,
  pub count:           u64,
  pub degree_level:    Option<DegreeLevel>,
  /// Year of study (e.g. "I", "II") for enrollment forms.
  pub year_slot:       Option<String>,
  /// Denormalised status; only maintained for explicit-status types.
  pub status:          Option<CompletionStatus>,
  pub recorded_at:     DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

/// A fact row joined with the names of its dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledFact {
  #[serde(flatten)]
  pub fact:        FactRow,
  pub category:    String,
  pub subcategory: String,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Upper bound on a single cell. Keeps every sum over stored rows far from
/// `u64::MAX`.
pub const MAX_COUNT: i64 = 1_000_000_000;

fn check_cap(count: i64, cell: impl fmt::Display) -> Result<()> {
  if count > MAX_COUNT {
    return Err(Error::Validation(format!(
      "count for {cell} must not exceed {MAX_COUNT}, got {count}"
    )));
  }
  Ok(())
}

/// Input to [`crate::store::CensusStore::insert_facts`]. Timestamps, ids and
/// status are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewFactRow {
  pub academic_year:   AcademicYear,
  pub submission_type: SubmissionType,
  pub scope:           String,
  pub subcategory_id:  i64,
  pub gender:          Gender,
  pub count:           i64,
  pub degree_level:    Option<DegreeLevel>,
  pub year_slot:       Option<String>,
}

impl NewFactRow {
  /// Checks run before any row of a batch is written.
  pub fn validate(&self) -> Result<()> {
    if self.scope.trim().is_empty() {
      return Err(Error::Validation("scope is required".into()));
    }
    if self.count <= 0 {
      return Err(Error::Validation(format!(
        "count for {} / subcategory {} / {} must be positive, got {}",
        self.scope, self.subcategory_id, self.gender, self.count
      )));
    }
    check_cap(
      self.count,
      format_args!(
        "{} / subcategory {} / {}",
        self.scope, self.subcategory_id, self.gender
      ),
    )
  }
}

/// Input to [`crate::store::CensusStore::update_counts`]: a new count for an
/// existing row. Zero is allowed so a cell can be cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountUpdate {
  pub row_id: Uuid,
  pub count:  i64,
}

impl CountUpdate {
  pub fn validate(&self) -> Result<()> {
    if self.count < 0 {
      return Err(Error::Validation(format!(
        "count for row {} must not be negative, got {}",
        self.row_id, self.count
      )));
    }
    check_cap(self.count, format_args!("row {}", self.row_id))
  }
}

/// Parameters for [`crate::store::CensusStore::get_facts`].
#[derive(Debug, Clone)]
pub struct FactFilter {
  pub academic_year:   AcademicYear,
  pub submission_type: SubmissionType,
  pub scope:           Option<String>,
  pub degree_level:    Option<DegreeLevel>,
  pub year_slot:       Option<String>,
}

impl FactFilter {
  pub fn year(academic_year: AcademicYear, submission_type: SubmissionType) -> Self {
    Self {
      academic_year,
      submission_type,
      scope: None,
      degree_level: None,
      year_slot: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn academic_year_accepts_consecutive_years() {
    let year = AcademicYear::parse("2024-25").unwrap();
    assert_eq!(year.as_str(), "2024-25");
    assert_eq!(year.start_year(), 2024);
    assert!(AcademicYear::parse("1999-00").is_ok());
  }

  #[test]
  fn academic_year_rejects_malformed_input() {
    let malformed = [
      "2024", "2024-26", "24-25", "2024/25", "abcd-ef", "", "+024-25", "2024-+5",
    ];
    for raw in malformed {
      assert!(
        matches!(AcademicYear::parse(raw), Err(Error::Validation(_))),
        "{raw:?} should be rejected"
      );
    }
  }

  #[test]
  fn academic_year_deserializes_through_validation() {
    let ok: AcademicYear = serde_json::from_str("\"2023-24\"").unwrap();
    assert_eq!(ok.to_string(), "2023-24");
    assert!(serde_json::from_str::<AcademicYear>("\"2023-25\"").is_err());
  }

  #[test]
  fn submission_type_label_and_slug() {
    let t: SubmissionType = "Non-Teaching Staff".parse().unwrap();
    assert_eq!(t, SubmissionType::NonTeachingStaff);
    assert_eq!(t.to_string(), "Non-Teaching Staff");
    assert_eq!(
      serde_json::to_string(&t).unwrap(),
      format!("\"{}\"", t.slug())
    );
    assert_eq!(
      SubmissionType::from_slug("department-enrollment"),
      Some(SubmissionType::DepartmentEnrollment)
    );
  }

  #[test]
  fn gender_resolution_is_strict_on_writes() {
    assert_eq!(Gender::resolve(&GenderRef::Id(2)).unwrap(), Gender::Female);
    assert_eq!(
      Gender::resolve(&GenderRef::Name(" MALE ".into())).unwrap(),
      Gender::Male
    );
    assert!(Gender::resolve(&GenderRef::Id(4)).is_err());
    assert!(Gender::resolve(&GenderRef::Name("other".into())).is_err());
  }

  #[test]
  fn degree_level_parse() {
    assert_eq!(DegreeLevel::parse("pg").unwrap(), DegreeLevel::PG);
    assert!(matches!(DegreeLevel::parse("PhD"), Err(Error::Validation(_))));
  }

  #[test]
  fn non_positive_counts_are_rejected() {
    let mut row = NewFactRow {
      academic_year:   AcademicYear::parse("2024-25").unwrap(),
      submission_type: SubmissionType::NonTeachingStaff,
      scope:           "Group B".into(),
      subcategory_id:  1,
      gender:          Gender::Male,
      count:           0,
      degree_level:    None,
      year_slot:       None,
    };
    assert!(row.validate().is_err());
    row.count = -3;
    assert!(row.validate().is_err());
    row.count = 3;
    assert!(row.validate().is_ok());
    row.scope = "  ".into();
    assert!(row.validate().is_err());
  }

  #[test]
  fn oversized_counts_are_rejected() {
    let mut row = NewFactRow {
      academic_year:   AcademicYear::parse("2024-25").unwrap(),
      submission_type: SubmissionType::NonTeachingStaff,
      scope:           "Group B".into(),
      subcategory_id:  1,
      gender:          Gender::Male,
      count:           i64::MAX,
      degree_level:    None,
      year_slot:       None,
    };
    assert!(matches!(row.validate(), Err(Error::Validation(_))));
    row.count = MAX_COUNT;
    assert!(row.validate().is_ok());

    let update = CountUpdate { row_id: Uuid::new_v4(), count: MAX_COUNT + 1 };
    assert!(matches!(update.validate(), Err(Error::Validation(_))));
  }
}
