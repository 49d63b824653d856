//! Reduces raw rows into per-scope, per-subcategory, per-gender totals.
//!
//! Totals are derived on every read and never persisted. The reducer accepts
//! both row shapes found in the data: rows that already carry one column per
//! gender, and atomic rows carrying a single gender and a count.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::fact::{Gender, GenderRef, LabeledFact};

// ─── Input ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountRow {
  /// Pre-aggregated: one column per gender.
  Columns {
    scope:       String,
    subcategory: String,
    male:        u64,
    female:      u64,
    transgender: u64,
  },
  /// One gender, one count.
  Atomic {
    scope:       String,
    subcategory: String,
    gender:      GenderRef,
    count:       u64,
  },
}

impl CountRow {
  fn scope(&self) -> &str {
    match self {
      Self::Columns { scope, .. } | Self::Atomic { scope, .. } => scope,
    }
  }

  fn subcategory(&self) -> &str {
    match self {
      Self::Columns { subcategory, .. } | Self::Atomic { subcategory, .. } => {
        subcategory
      }
    }
  }
}

impl From<&LabeledFact> for CountRow {
  fn from(lf: &LabeledFact) -> Self {
    Self::Atomic {
      scope:       lf.fact.scope.clone(),
      subcategory: lf.subcategory.clone(),
      gender:      lf.fact.gender.into(),
      count:       lf.fact.count,
    }
  }
}

/// Grouping keys beyond the always-present subcategory and gender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct GroupBy {
  #[serde(default)]
  pub scope: bool,
}

// ─── Output ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderTotals {
  pub male:        u64,
  pub female:      u64,
  pub transgender: u64,
}

impl GenderTotals {
  pub fn add(&mut self, gender: Gender, count: u64) {
    match gender {
      Gender::Male => self.male = self.male.saturating_add(count),
      Gender::Female => self.female = self.female.saturating_add(count),
      Gender::Transgender => {
        self.transgender = self.transgender.saturating_add(count)
      }
    }
  }

  pub fn get(&self, gender: Gender) -> u64 {
    match gender {
      Gender::Male => self.male,
      Gender::Female => self.female,
      Gender::Transgender => self.transgender,
    }
  }

  pub fn total(&self) -> u64 {
    self
      .male
      .saturating_add(self.female)
      .saturating_add(self.transgender)
  }

  pub fn by_gender(&self) -> [(Gender, u64); 3] {
    [
      (Gender::Male, self.male),
      (Gender::Female, self.female),
      (Gender::Transgender, self.transgender),
    ]
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateTotal {
  /// Present only when grouping by scope.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub scope:       Option<String>,
  pub subcategory: String,
  #[serde(flatten)]
  pub genders:     GenderTotals,
  /// Always `genders.total()`.
  pub total:       u64,
}

impl AggregateTotal {
  fn new(scope: Option<String>, subcategory: String, genders: GenderTotals) -> Self {
    Self { scope, subcategory, genders, total: genders.total() }
  }
}

// ─── Bucketing ───────────────────────────────────────────────────────────────

/// Map a read-side gender reference onto a bucket.
///
/// Ids go through the fixed `{1: Male, 2: Female, 3: Transgender}` table
/// first. Names are then matched by case-insensitive substring, `female`
/// before `male`; anything else (including unknown ids) is counted as
/// transgender. This mirrors the legacy reports and is kept for parity.
pub fn bucket(gender: &GenderRef) -> Gender {
  let name = match gender {
    GenderRef::Id(id) => match Gender::from_id(*id) {
      Some(g) => g.to_string(),
      None => String::new(),
    },
    GenderRef::Name(name) => name.clone(),
  }
  .to_ascii_lowercase();

  if name.contains("female") {
    Gender::Female
  } else if name.contains("male") {
    Gender::Male
  } else {
    Gender::Transgender
  }
}

// ─── Reducer ─────────────────────────────────────────────────────────────────

/// Sum `rows` by subcategory and gender (and scope, if requested).
///
/// With a `universe`, rows whose subcategory is not listed are dropped and
/// every listed subcategory is reported, zero-filled, in list order. Without
/// one, subcategories appear in first-seen order. Sums saturate at
/// `u64::MAX`.
pub fn aggregate(
  rows: &[CountRow],
  group_by: GroupBy,
  universe: Option<&[String]>,
) -> Vec<AggregateTotal> {
  aggregate_with_scopes(rows, group_by, universe, &[])
}

/// [`aggregate`], but when grouping by scope over a `universe` every scope in
/// `known_scopes` is reported too, zero-filled, ahead of any other scope seen
/// in `rows`.
pub fn aggregate_with_scopes(
  rows: &[CountRow],
  group_by: GroupBy,
  universe: Option<&[String]>,
  known_scopes: &[String],
) -> Vec<AggregateTotal> {
  let mut scopes: Vec<Option<String>> = Vec::new();
  if group_by.scope && universe.is_some() {
    for scope in known_scopes {
      if !scopes.iter().any(|s| s.as_deref() == Some(scope.as_str())) {
        scopes.push(Some(scope.clone()));
      }
    }
  }
  let mut order: Vec<(Option<String>, String)> = Vec::new();
  let mut sums: HashMap<(Option<String>, String), GenderTotals> = HashMap::new();

  for row in rows {
    if let Some(names) = universe
      && !names.iter().any(|n| n == row.subcategory())
    {
      continue;
    }

    let scope = group_by.scope.then(|| row.scope().to_owned());
    if !scopes.contains(&scope) {
      scopes.push(scope.clone());
    }

    let key = (scope, row.subcategory().to_owned());
    let entry = sums.entry(key.clone()).or_insert_with(|| {
      order.push(key);
      GenderTotals::default()
    });

    match row {
      CountRow::Columns { male, female, transgender, .. } => {
        entry.add(Gender::Male, *male);
        entry.add(Gender::Female, *female);
        entry.add(Gender::Transgender, *transgender);
      }
      CountRow::Atomic { gender, count, .. } => entry.add(bucket(gender), *count),
    }
  }

  match universe {
    Some(names) => {
      if !group_by.scope && scopes.is_empty() {
        scopes.push(None);
      }
      scopes
        .into_iter()
        .flat_map(|scope| {
          names.iter().map(move |name| (scope.clone(), name.clone()))
        })
        .map(|key| {
          let genders = sums.get(&key).copied().unwrap_or_default();
          AggregateTotal::new(key.0, key.1, genders)
        })
        .collect()
    }
    None => order
      .into_iter()
      .map(|key| {
        let genders = sums.get(&key).copied().unwrap_or_default();
        AggregateTotal::new(key.0, key.1, genders)
      })
      .collect(),
  }
}
