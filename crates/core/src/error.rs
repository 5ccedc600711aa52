//! Public error type shared by the whole engine.
//!
//! Every variant carries a stable code name, retrievable via [`Error::code`],
//! so embedders can map failures without string-matching `Display` output.

use thiserror::Error;

/// Hard cap on `asc`/`desc` clauses in a single query.
pub const MAX_ORDER_BY: usize = 64;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
  #[error("query parsing error at offset {offset}: {message}")]
  QueryParse { offset: usize, message: String },

  #[error("invalid placeholder `{0}`")]
  InvalidPlaceholder(String),

  #[error("found unset placeholder `{0}`")]
  UnsetPlaceholder(String),

  #[error("invalid regular expression: {0}")]
  RegexpInvalid(String),

  #[error("invalid regular expression: expected `]` at end of character set")]
  RegexpCharset,

  #[error("invalid regular expression: expected `)` at end of subexpression")]
  RegexpSubexp,

  #[error("invalid regular expression: invalid repetition")]
  RegexpSubmatch,

  #[error("regular expression engine failure: {0}")]
  RegexpEngine(String),

  #[error("skip clause already specified")]
  SkipAlreadySet,

  #[error("limit clause already specified")]
  LimitAlreadySet,

  #[error("reached max number of asc/desc order clauses: 64")]
  OrderByMaxLimit,

  #[error("patch failed: {0}")]
  Patch(String),
}

impl Error {
  /// Stable machine-readable code name for this error.
  pub fn code(&self) -> &'static str {
    match self {
      Error::QueryParse { .. } => "QueryParse",
      Error::InvalidPlaceholder(_) => "InvalidPlaceholder",
      Error::UnsetPlaceholder(_) => "UnsetPlaceholder",
      Error::RegexpInvalid(_) => "RegexpInvalid",
      Error::RegexpCharset => "RegexpCharset",
      Error::RegexpSubexp => "RegexpSubexp",
      Error::RegexpSubmatch => "RegexpSubmatch",
      Error::RegexpEngine(_) => "RegexpEngine",
      Error::SkipAlreadySet => "SkipAlreadySet",
      Error::LimitAlreadySet => "LimitAlreadySet",
      Error::OrderByMaxLimit => "OrderbyMaxLimit",
      Error::Patch(_) => "Patch",
    }
  }
}
