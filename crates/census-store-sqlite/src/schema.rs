//! SQL schema for the census SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL plus the seeded dimension catalog; idempotent thanks to
/// `IF NOT EXISTS` and `INSERT OR IGNORE`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS categories (
    category_id INTEGER PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS subcategories (
    subcategory_id INTEGER PRIMARY KEY,
    category_id    INTEGER NOT NULL REFERENCES categories(category_id),
    name           TEXT NOT NULL,
    UNIQUE (category_id, name)
);

-- One count per (year, type, scope, subcategory, gender[, degree, slot]).
-- Only `count`, `status` and `updated_at` are ever updated.
CREATE TABLE IF NOT EXISTS fact_rows (
    row_id          TEXT PRIMARY KEY,
    academic_year   TEXT NOT NULL,               -- 'YYYY-YY'
    submission_type TEXT NOT NULL,               -- display label
    scope           TEXT NOT NULL,
    category_id     INTEGER NOT NULL REFERENCES categories(category_id),
    subcategory_id  INTEGER NOT NULL REFERENCES subcategories(subcategory_id),
    gender_id       INTEGER NOT NULL CHECK (gender_id IN (1, 2, 3)),
    count           INTEGER NOT NULL CHECK (count >= 0),
    degree_level    TEXT,                        -- 'UG' | 'PG' | NULL
    year_slot       TEXT,
    status          TEXT,                        -- explicit-status types only
    recorded_at     TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

-- At most one record per key; scope '' is the whole composite type.
CREATE TABLE IF NOT EXISTS submissions (
    submission_id   TEXT PRIMARY KEY,
    academic_year   TEXT NOT NULL,
    submission_type TEXT NOT NULL,
    scope           TEXT NOT NULL DEFAULT '',
    status          TEXT NOT NULL,
    is_locked       INTEGER NOT NULL DEFAULT 0,
    submitted_at    TEXT NOT NULL,
    UNIQUE (academic_year, submission_type, scope)
);

CREATE INDEX IF NOT EXISTS fact_rows_year_type_idx
    ON fact_rows(academic_year, submission_type, scope);

CREATE UNIQUE INDEX IF NOT EXISTS fact_rows_key_idx
    ON fact_rows(academic_year, submission_type, scope, subcategory_id,
                 gender_id, IFNULL(degree_level, ''), IFNULL(year_slot, ''));

INSERT OR IGNORE INTO categories (category_id, name) VALUES
    (1, 'Social Category'),
    (2, 'Special Category');

INSERT OR IGNORE INTO subcategories (subcategory_id, category_id, name) VALUES
    (1, 1, 'General'),
    (2, 1, 'OBC'),
    (3, 1, 'SC'),
    (4, 1, 'ST'),
    (5, 2, 'PwBD'),
    (6, 2, 'Muslim Minority'),
    (7, 2, 'Other Minority');

PRAGMA user_version = 1;
";

/// Rewrite `status` for every row of one `(year, type)` from whether its
/// `(scope, year, degree_level, year_slot)` group holds a positive count.
pub const RECOMPUTE_STATUS: &str = "
UPDATE fact_rows
   SET status = CASE WHEN EXISTS (
         SELECT 1 FROM fact_rows g
          WHERE g.academic_year   = fact_rows.academic_year
            AND g.submission_type = fact_rows.submission_type
            AND g.scope           = fact_rows.scope
            AND g.degree_level   IS fact_rows.degree_level
            AND g.year_slot      IS fact_rows.year_slot
            AND g.count > 0
       ) THEN 'Completed' ELSE 'Incompleted' END
 WHERE academic_year = ?1 AND submission_type = ?2
";
