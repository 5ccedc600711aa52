//! Placeholder table: name- or index-keyed bindings for query parameters.

use crate::error::{Error, Result};
use crate::value::OwnedVal;

/// Addresses a placeholder either by name (`:name` sites) or by ordinal
/// (`?` sites, numbered in order of appearance).
#[derive(Debug, Clone, Copy)]
pub enum BindKey<'a> {
  Name(&'a str),
  Index(usize),
}

impl<'a> From<&'a str> for BindKey<'a> {
  fn from(name: &'a str) -> Self {
    BindKey::Name(name)
  }
}

impl From<usize> for BindKey<'_> {
  fn from(index: usize) -> Self {
    BindKey::Index(index)
  }
}

impl BindKey<'_> {
  fn canonical(&self) -> String {
    match self {
      BindKey::Name(n) => format!(":{}", n.strip_prefix(':').unwrap_or(n)),
      BindKey::Index(i) => format!("?{i}"),
    }
  }
}

/// Values bound to the query's placeholder sites, slot-aligned with
/// `QueryAst::placeholders`.
#[derive(Debug, Default)]
pub(crate) struct PlaceholderTable {
  names: Vec<String>,
  values: Vec<Option<OwnedVal>>,
}

impl PlaceholderTable {
  pub fn new(names: &[String]) -> Self {
    PlaceholderTable {
      names: names.to_vec(),
      values: names.iter().map(|_| None).collect(),
    }
  }

  /// Binds `val`, dropping any previously owned value in the slot.
  pub fn bind(&mut self, key: BindKey, val: OwnedVal) -> Result<()> {
    let canonical = key.canonical();
    let Some(idx) = self.names.iter().position(|n| *n == canonical) else {
      return Err(Error::InvalidPlaceholder(canonical));
    };
    self.values[idx] = Some(val);
    Ok(())
  }

  pub fn get(&self, idx: usize) -> Option<&OwnedVal> {
    self.values.get(idx).and_then(|v| v.as_ref())
  }

  pub fn name(&self, idx: usize) -> &str {
    &self.names[idx]
  }

  pub fn clear(&mut self) {
    for slot in &mut self.values {
      *slot = None;
    }
  }
}
