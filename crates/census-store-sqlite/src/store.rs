//! [`SqliteStore`], the SQLite implementation of [`CensusStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use census_core::{
  fact::{
    AcademicYear, CompletionRule, CountUpdate, FactFilter, FactRow, LabeledFact,
    NewFactRow, Subcategory, SubmissionType,
  },
  ledger::{NewSubmission, SubmissionRecord},
  store::CensusStore,
};

use crate::{
  Error, Result,
  encode::{
    FACT_COLUMNS, FACT_JOINS, RawFact, RawSubmission, SUBMISSION_COLUMNS,
    decode_submission_type, encode_dt, encode_scope, encode_uuid,
  },
  schema::{RECOMPUTE_STATUS, SCHEMA},
};

// ─── Batch plumbing ──────────────────────────────────────────────────────────

/// Why a batch was abandoned inside its transaction. The transaction is
/// dropped without commit, so nothing from the batch is kept.
enum Rejection {
  UnknownSubcategory(i64),
  RowNotFound(Uuid),
  DuplicateFact(String),
}

impl From<Rejection> for Error {
  fn from(r: Rejection) -> Self {
    match r {
      Rejection::UnknownSubcategory(id) => Error::UnknownSubcategory(id),
      Rejection::RowNotFound(id) => Error::RowNotFound(id),
      Rejection::DuplicateFact(key) => Error::DuplicateFact(key),
    }
  }
}

/// A validated [`NewFactRow`] reduced to column values.
struct InsertRow {
  row_id:          String,
  academic_year:   String,
  submission_type: String,
  scope:           String,
  subcategory_id:  i64,
  gender_id:       i64,
  count:           i64,
  degree_level:    Option<String>,
  year_slot:       Option<String>,
}

impl InsertRow {
  fn describe(&self) -> String {
    let mut key = format!(
      "{} {} / {} / subcategory {} / gender {}",
      self.submission_type,
      self.academic_year,
      self.scope,
      self.subcategory_id,
      self.gender_id
    );
    if let Some(level) = &self.degree_level {
      key.push_str(&format!(" / {level}"));
    }
    if let Some(slot) = &self.year_slot {
      key.push_str(&format!(" / year {slot}"));
    }
    key
  }
}

/// `(academic_year, submission_type)` pairs whose rows carry a stored status.
fn explicit_pairs<'a>(
  pairs: impl IntoIterator<Item = (&'a str, SubmissionType)>,
) -> Vec<(String, String)> {
  let mut out: Vec<(String, String)> = Vec::new();
  for (year, ty) in pairs {
    if ty.completion_rule() != CompletionRule::ExplicitStatus {
      continue;
    }
    let pair = (year.to_owned(), ty.to_string());
    if !out.contains(&pair) {
      out.push(pair);
    }
  }
  out
}

fn recompute(
  conn: &rusqlite::Connection,
  pairs: &[(String, String)],
) -> rusqlite::Result<usize> {
  let mut touched = 0;
  for (year, ty) in pairs {
    touched += conn.execute(RECOMPUTE_STATUS, rusqlite::params![year, ty])?;
  }
  Ok(touched)
}

fn select_rows(
  conn: &rusqlite::Connection,
  ids: &[String],
) -> rusqlite::Result<Vec<RawFact>> {
  let mut stmt =
    conn.prepare(&format!("SELECT {FACT_COLUMNS} {FACT_JOINS} WHERE f.row_id = ?1"))?;
  let mut rows = Vec::with_capacity(ids.len());
  for id in ids {
    if let Some(raw) = stmt
      .query_row(rusqlite::params![id], RawFact::from_row)
      .optional()?
    {
      rows.push(raw);
    }
  }
  Ok(rows)
}

fn select_submission(
  conn: &rusqlite::Connection,
  id: &str,
) -> rusqlite::Result<Option<RawSubmission>> {
  conn
    .query_row(
      &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE submission_id = ?1"),
      rusqlite::params![id],
      RawSubmission::from_row,
    )
    .optional()
}

fn into_fact_rows(raws: Vec<RawFact>) -> Result<Vec<FactRow>> {
  raws
    .into_iter()
    .map(|raw| raw.into_labeled().map(|lf| lf.fact))
    .collect()
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A census store backed by a single SQLite file.
///
/// Clones share the inner reference-counted connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── CensusStore impl ────────────────────────────────────────────────────────

impl CensusStore for SqliteStore {
  type Error = Error;

  // ── Catalog ───────────────────────────────────────────────────────────────

  async fn list_subcategories(&self) -> Result<Vec<Subcategory>> {
    let subcategories = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT s.subcategory_id, s.category_id, c.name, s.name
           FROM subcategories s
           JOIN categories c ON c.category_id = s.category_id
           ORDER BY s.subcategory_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(Subcategory {
              subcategory_id: row.get(0)?,
              category_id:    row.get(1)?,
              category:       row.get(2)?,
              name:           row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(subcategories)
  }

  // ── Facts ─────────────────────────────────────────────────────────────────

  async fn insert_facts(&self, rows: Vec<NewFactRow>) -> Result<Vec<FactRow>> {
    for row in &rows {
      row.validate()?;
    }

    let explicit = explicit_pairs(
      rows.iter().map(|r| (r.academic_year.as_str(), r.submission_type)),
    );
    let batch: Vec<InsertRow> = rows
      .into_iter()
      .map(|r| InsertRow {
        row_id:          encode_uuid(Uuid::new_v4()),
        academic_year:   r.academic_year.to_string(),
        submission_type: r.submission_type.to_string(),
        scope:           r.scope.trim().to_owned(),
        subcategory_id:  r.subcategory_id,
        gender_id:       r.gender.id(),
        count:           r.count,
        degree_level:    r.degree_level.map(|d| d.to_string()),
        year_slot:       r.year_slot,
      })
      .collect();
    let now = encode_dt(Utc::now());
    let size = batch.len();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(batch.len());

        for row in batch {
          let category_id: Option<i64> = tx
            .query_row(
              "SELECT category_id FROM subcategories WHERE subcategory_id = ?1",
              rusqlite::params![row.subcategory_id],
              |r| r.get(0),
            )
            .optional()?;
          let Some(category_id) = category_id else {
            return Ok(Err(Rejection::UnknownSubcategory(row.subcategory_id)));
          };

          // Rows inserted earlier in this batch are visible here too.
          let taken = tx
            .query_row(
              "SELECT 1 FROM fact_rows
                WHERE academic_year = ?1 AND submission_type = ?2
                  AND scope = ?3 AND subcategory_id = ?4 AND gender_id = ?5
                  AND degree_level IS ?6 AND year_slot IS ?7",
              rusqlite::params![
                row.academic_year,
                row.submission_type,
                row.scope,
                row.subcategory_id,
                row.gender_id,
                row.degree_level,
                row.year_slot,
              ],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          if taken {
            return Ok(Err(Rejection::DuplicateFact(row.describe())));
          }

          tx.execute(
            "INSERT INTO fact_rows (
               row_id, academic_year, submission_type, scope,
               category_id, subcategory_id, gender_id, count,
               degree_level, year_slot, status, recorded_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL, ?11, ?11)",
            rusqlite::params![
              row.row_id,
              row.academic_year,
              row.submission_type,
              row.scope,
              category_id,
              row.subcategory_id,
              row.gender_id,
              row.count,
              row.degree_level,
              row.year_slot,
              now,
            ],
          )?;
          ids.push(row.row_id);
        }

        recompute(&tx, &explicit)?;
        tx.commit()?;

        Ok(Ok(select_rows(conn, &ids)?))
      })
      .await?;

    let raws = outcome?;
    tracing::debug!(rows = size, "inserted fact rows");
    into_fact_rows(raws)
  }

  async fn get_facts(&self, filter: &FactFilter) -> Result<Vec<LabeledFact>> {
    let year     = filter.academic_year.to_string();
    let ty       = filter.submission_type.to_string();
    let scope    = filter.scope.clone();
    let degree   = filter.degree_level.map(|d| d.to_string());
    let slot     = filter.year_slot.clone();

    let raws: Vec<RawFact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {FACT_COLUMNS} {FACT_JOINS}
           WHERE f.academic_year = ?1
             AND f.submission_type = ?2
             AND (?3 IS NULL OR f.scope = ?3)
             AND (?4 IS NULL OR f.degree_level = ?4)
             AND (?5 IS NULL OR f.year_slot = ?5)
           ORDER BY f.scope, f.subcategory_id, f.gender_id, f.recorded_at"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![year, ty, scope, degree, slot],
            RawFact::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFact::into_labeled).collect()
  }

  async fn update_counts(&self, updates: Vec<CountUpdate>) -> Result<Vec<FactRow>> {
    for update in &updates {
      update.validate()?;
    }

    let now  = encode_dt(Utc::now());
    let size = updates.len();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(updates.len());
        let mut touched: Vec<(String, String)> = Vec::new();

        for update in updates {
          let id = encode_uuid(update.row_id);
          let key: Option<(String, String)> = tx
            .query_row(
              "SELECT academic_year, submission_type FROM fact_rows WHERE row_id = ?1",
              rusqlite::params![id],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
          let Some(key) = key else {
            return Ok(Err(Rejection::RowNotFound(update.row_id)));
          };

          tx.execute(
            "UPDATE fact_rows SET count = ?1, updated_at = ?2 WHERE row_id = ?3",
            rusqlite::params![update.count, now, id],
          )?;
          if !touched.contains(&key) {
            touched.push(key);
          }
          ids.push(id);
        }

        let explicit: Vec<(String, String)> = touched
          .into_iter()
          .filter(|(_, ty)| {
            decode_submission_type(ty)
              .is_ok_and(|t| t.completion_rule() == CompletionRule::ExplicitStatus)
          })
          .collect();
        recompute(&tx, &explicit)?;
        tx.commit()?;

        Ok(Ok(select_rows(conn, &ids)?))
      })
      .await?;

    let raws = outcome?;
    tracing::debug!(rows = size, "updated fact counts");
    into_fact_rows(raws)
  }

  async fn delete_facts_for_year(
    &self,
    academic_year: AcademicYear,
    submission_type: SubmissionType,
  ) -> Result<usize> {
    let explicit =
      explicit_pairs([(academic_year.as_str(), submission_type)]);
    let year = academic_year.to_string();
    let ty   = submission_type.to_string();

    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let removed = tx.execute(
          "DELETE FROM fact_rows WHERE academic_year = ?1 AND submission_type = ?2",
          rusqlite::params![year, ty],
        )?;
        recompute(&tx, &explicit)?;
        tx.commit()?;
        Ok(removed)
      })
      .await?;

    tracing::info!(%academic_year, %submission_type, removed, "deleted fact rows");
    Ok(removed)
  }

  async fn recompute_status(
    &self,
    academic_year: AcademicYear,
    submission_type: SubmissionType,
  ) -> Result<usize> {
    // Unlike the write paths, this does not skip presence-rule types.
    let pairs = vec![(academic_year.to_string(), submission_type.to_string())];
    let touched = self
      .conn
      .call(move |conn| Ok(recompute(conn, &pairs)?))
      .await?;
    tracing::debug!(%academic_year, %submission_type, touched, "recomputed status");
    Ok(touched)
  }

  // ── Ledger ────────────────────────────────────────────────────────────────

  async fn final_submit(&self, input: NewSubmission) -> Result<SubmissionRecord> {
    let new_id = encode_uuid(Uuid::new_v4());
    let year   = input.academic_year.to_string();
    let ty     = input.submission_type.to_string();
    let scope  = encode_scope(input.scope.as_deref());
    let status = input.status.to_string();
    let at     = encode_dt(Utc::now());

    let raw: RawSubmission = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO submissions (
             submission_id, academic_year, submission_type, scope,
             status, is_locked, submitted_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
           ON CONFLICT (academic_year, submission_type, scope) DO UPDATE SET
             status       = excluded.status,
             is_locked    = 1,
             submitted_at = excluded.submitted_at",
          rusqlite::params![new_id, year, ty, scope, status, at],
        )?;
        let raw = conn.query_row(
          &format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions
             WHERE academic_year = ?1 AND submission_type = ?2 AND scope = ?3"
          ),
          rusqlite::params![year, ty, scope],
          RawSubmission::from_row,
        )?;
        Ok(raw)
      })
      .await?;

    let record = raw.into_record()?;
    tracing::info!(
      academic_year = %record.academic_year,
      submission_type = %record.submission_type,
      scope = record.scope.as_deref(),
      id = %record.id,
      "final submission recorded"
    );
    Ok(record)
  }

  async fn get_submission(&self, id: Uuid) -> Result<Option<SubmissionRecord>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(select_submission(conn, &id_str)?))
      .await?;
    raw.map(RawSubmission::into_record).transpose()
  }

  async fn list_submissions(
    &self,
    academic_year: AcademicYear,
    submission_type: SubmissionType,
  ) -> Result<Vec<SubmissionRecord>> {
    let year = academic_year.to_string();
    let ty   = submission_type.to_string();

    let raws: Vec<RawSubmission> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBMISSION_COLUMNS} FROM submissions
           WHERE academic_year = ?1 AND submission_type = ?2
           ORDER BY scope"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![year, ty], RawSubmission::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubmission::into_record).collect()
  }

  async fn set_lock(&self, id: Uuid, locked: bool) -> Result<SubmissionRecord> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE submissions SET is_locked = ?1 WHERE submission_id = ?2",
          rusqlite::params![locked, id_str],
        )?;
        Ok(select_submission(conn, &id_str)?)
      })
      .await?
      .ok_or(Error::SubmissionNotFound(id))?;

    tracing::info!(%id, locked, "submission lock toggled");
    raw.into_record()
  }

  async fn delete_submission(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM submissions WHERE submission_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    if removed == 0 {
      return Err(Error::SubmissionNotFound(id));
    }
    tracing::info!(%id, "submission deleted");
    Ok(())
  }
}
