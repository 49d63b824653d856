//! Error type for `census-store-sqlite`.

use census_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] census_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A stored column could not be decoded into its domain type.
  #[error("decode error: {0}")]
  Decode(String),

  #[error("fact row not found: {0}")]
  RowNotFound(uuid::Uuid),

  #[error("submission not found: {0}")]
  SubmissionNotFound(uuid::Uuid),

  #[error("unknown subcategory: {0}")]
  UnknownSubcategory(i64),

  /// A row with the same key is already stored; update its count instead.
  #[error("fact row already exists: {0}")]
  DuplicateFact(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::RowNotFound(_) | Error::SubmissionNotFound(_) => ErrorKind::NotFound,
      Error::UnknownSubcategory(_) => ErrorKind::Validation,
      Error::DuplicateFact(_) => ErrorKind::Conflict,
      Error::Database(_) | Error::Uuid(_) | Error::Decode(_) => {
        ErrorKind::Internal
      }
    }
  }
}
