//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings, and
//! enums their display labels. Genders are stored by numeric id.

use chrono::{DateTime, Utc};
use census_core::{
  fact::{
    AcademicYear, CompletionStatus, DegreeLevel, FactRow, Gender, LabeledFact,
    SubmissionType,
  },
  ledger::{SubmissionId, SubmissionRecord},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(e.to_string()))
}

// ─── Enums ────────────────────────────────────────────────────────────────────

pub fn decode_year(s: &str) -> Result<AcademicYear> {
  AcademicYear::parse(s).map_err(|e| Error::Decode(e.to_string()))
}

pub fn decode_submission_type(s: &str) -> Result<SubmissionType> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown submission type: {s:?}")))
}

pub fn decode_gender(id: i64) -> Result<Gender> {
  Gender::from_id(id).ok_or_else(|| Error::Decode(format!("unknown gender id: {id}")))
}

pub fn decode_degree_level(s: &str) -> Result<DegreeLevel> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown degree level: {s:?}")))
}

pub fn decode_status(s: &str) -> Result<CompletionStatus> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown completion status: {s:?}")))
}

/// The `submissions.scope` column uses `''` for the whole type.
pub fn encode_scope(scope: Option<&str>) -> String {
  scope.unwrap_or_default().to_owned()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawFact::from_row`]; expects `f`, `c`, `s` aliases.
pub const FACT_COLUMNS: &str = "
  f.row_id, f.academic_year, f.submission_type, f.scope,
  f.category_id, f.subcategory_id, f.gender_id, f.count,
  f.degree_level, f.year_slot, f.status, f.recorded_at, f.updated_at,
  c.name, s.name";

/// Join clause matching [`FACT_COLUMNS`].
pub const FACT_JOINS: &str = "
  FROM fact_rows f
  JOIN categories    c ON c.category_id    = f.category_id
  JOIN subcategories s ON s.subcategory_id = f.subcategory_id";

/// Raw values read from a `fact_rows` row joined with its labels.
pub struct RawFact {
  pub row_id:          String,
  pub academic_year:   String,
  pub submission_type: String,
  pub scope:           String,
  pub category_id:     i64,
  pub subcategory_id:  i64,
  pub gender_id:       i64,
  pub count:           i64,
  pub degree_level:    Option<String>,
  pub year_slot:       Option<String>,
  pub status:          Option<String>,
  pub recorded_at:     String,
  pub updated_at:      String,
  // label joins
  pub category:        String,
  pub subcategory:     String,
}

impl RawFact {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      row_id:          row.get(0)?,
      academic_year:   row.get(1)?,
      submission_type: row.get(2)?,
      scope:           row.get(3)?,
      category_id:     row.get(4)?,
      subcategory_id:  row.get(5)?,
      gender_id:       row.get(6)?,
      count:           row.get(7)?,
      degree_level:    row.get(8)?,
      year_slot:       row.get(9)?,
      status:          row.get(10)?,
      recorded_at:     row.get(11)?,
      updated_at:      row.get(12)?,
      category:        row.get(13)?,
      subcategory:     row.get(14)?,
    })
  }

  pub fn into_labeled(self) -> Result<LabeledFact> {
    let count = u64::try_from(self.count)
      .map_err(|_| Error::Decode(format!("negative count in row {}", self.row_id)))?;

    let fact = FactRow {
      row_id: decode_uuid(&self.row_id)?,
      academic_year: decode_year(&self.academic_year)?,
      submission_type: decode_submission_type(&self.submission_type)?,
      scope: self.scope,
      category_id: self.category_id,
      subcategory_id: self.subcategory_id,
      gender: decode_gender(self.gender_id)?,
      count,
      degree_level: self
        .degree_level
        .as_deref()
        .map(decode_degree_level)
        .transpose()?,
      year_slot: self.year_slot,
      status: self.status.as_deref().map(decode_status).transpose()?,
      recorded_at: decode_dt(&self.recorded_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    };

    Ok(LabeledFact {
      fact,
      category: self.category,
      subcategory: self.subcategory,
    })
  }
}

/// Column list matching [`RawSubmission::from_row`].
pub const SUBMISSION_COLUMNS: &str = "
  submission_id, academic_year, submission_type, scope, status, is_locked,
  submitted_at";

/// Raw values read from a `submissions` row.
pub struct RawSubmission {
  pub submission_id:   String,
  pub academic_year:   String,
  pub submission_type: String,
  pub scope:           String,
  pub status:          String,
  pub is_locked:       bool,
  pub submitted_at:    String,
}

impl RawSubmission {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      submission_id:   row.get(0)?,
      academic_year:   row.get(1)?,
      submission_type: row.get(2)?,
      scope:           row.get(3)?,
      status:          row.get(4)?,
      is_locked:       row.get(5)?,
      submitted_at:    row.get(6)?,
    })
  }

  pub fn into_record(self) -> Result<SubmissionRecord> {
    Ok(SubmissionRecord {
      id:              SubmissionId::Stored(decode_uuid(&self.submission_id)?),
      academic_year:   decode_year(&self.academic_year)?,
      submission_type: decode_submission_type(&self.submission_type)?,
      scope:           (!self.scope.is_empty()).then_some(self.scope),
      status:          decode_status(&self.status)?,
      is_locked:       self.is_locked,
      submitted_at:    Some(decode_dt(&self.submitted_at)?),
    })
  }
}
