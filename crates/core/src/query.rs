//! Query lifecycle: create, bind placeholders, match documents, apply
//! mutations and projections.

use crate::ast::{QueryAst, Unit};
use crate::error::{Error, Result};
use crate::match_doc::{DocMatcher, MatchState};
use crate::matcher::{self, RegexCache};
use crate::parse;
use crate::patch;
use crate::placeholder::{BindKey, PlaceholderTable};
use crate::projection;
use crate::tree::TreeDoc;
use crate::value::{OwnedVal, Val};

use log::debug;
use serde_json::Value;

/// A compiled query, good for matching many documents.
///
/// A query is single-owner: evaluating the same parse in parallel
/// requires creating one `Query` per walker. Dropping the query releases
/// placeholder values and cached regexes.
#[derive(Debug)]
pub struct Query {
  collection: String,
  ast: QueryAst,
  pt: PlaceholderTable,
  regexes: RegexCache,
  state: MatchState,
}

impl Query {
  /// Parses `query` for `collection`. A leading `@coll` in the query text
  /// overrides the argument.
  pub fn create(collection: &str, query: &str) -> Result<Query> {
    let ast = parse::parse(query)?;
    let collection = ast
      .collection
      .clone()
      .unwrap_or_else(|| collection.to_string());
    debug!(
      "created query on `{collection}`: {} filters, {} placeholders",
      ast.counts.filters,
      ast.placeholders.len()
    );
    let pt = PlaceholderTable::new(&ast.placeholders);
    let regexes = RegexCache::new(ast.counts.ops);
    let state = MatchState::new(&ast.counts);
    Ok(Query {
      collection,
      ast,
      pt,
      regexes,
      state,
    })
  }

  pub fn collection(&self) -> &str {
    &self.collection
  }

  /// Clears all per-document state; with `reset_placeholders`, unbinds
  /// every placeholder as well.
  pub fn reset(&mut self, reset_placeholders: bool) {
    self.state.reset();
    if reset_placeholders {
      self.pt.clear();
    }
  }

  // ---- placeholder binding

  pub fn set_str<'k>(&mut self, key: impl Into<BindKey<'k>>, val: &str) -> Result<()> {
    self.pt.bind(key.into(), OwnedVal::Str(val.to_string()))
  }

  pub fn set_i64<'k>(&mut self, key: impl Into<BindKey<'k>>, val: i64) -> Result<()> {
    self.pt.bind(key.into(), OwnedVal::I64(val))
  }

  pub fn set_f64<'k>(&mut self, key: impl Into<BindKey<'k>>, val: f64) -> Result<()> {
    self.pt.bind(key.into(), OwnedVal::F64(val))
  }

  pub fn set_bool<'k>(&mut self, key: impl Into<BindKey<'k>>, val: bool) -> Result<()> {
    self.pt.bind(key.into(), OwnedVal::Bool(val))
  }

  pub fn set_null<'k>(&mut self, key: impl Into<BindKey<'k>>) -> Result<()> {
    self.pt.bind(key.into(), OwnedVal::Null)
  }

  /// Binds a JSON tree; scalars compare as their scalar kind.
  pub fn set_json<'k>(&mut self, key: impl Into<BindKey<'k>>, val: Value) -> Result<()> {
    self.pt.bind(key.into(), OwnedVal::Json(val))
  }

  /// Compiles `pattern` eagerly; compilation failures surface now, not at
  /// match time.
  pub fn set_regexp<'k>(
    &mut self,
    key: impl Into<BindKey<'k>>,
    pattern: &str,
  ) -> Result<()> {
    let re = matcher::compile_regex(pattern)?;
    self.pt.bind(key.into(), OwnedVal::Re(re))
  }

  // ---- evaluation

  /// Walks `doc` once and reports whether the query's expression matched.
  /// Per-document state is reset on entry, so the query is reusable.
  pub fn matched(&mut self, doc: &Value) -> Result<bool> {
    self.reset(false);
    let Query {
      ast,
      pt,
      regexes,
      state,
      ..
    } = self;
    DocMatcher {
      ast,
      pt,
      regexes,
      state,
    }
    .run(doc)
  }

  /// Materializes `doc`, applies the `apply` clause, then the projection.
  /// Returns `None` when the query has neither.
  pub fn apply(&self, doc: &Value) -> Result<Option<Value>> {
    if !self.ast.has_apply() && !self.ast.has_projection() {
      return Ok(None);
    }
    let mut root = doc.clone();
    if let Some(ops) = &self.ast.apply {
      patch::apply_patch(&mut root, ops)?;
    }
    if self.ast.has_projection() {
      let mut tree = TreeDoc::from_value(&root);
      projection::project(&mut tree, &self.ast.projections);
      root = tree.to_value();
    }
    Ok(Some(root))
  }

  // ---- introspection

  pub fn has_apply(&self) -> bool {
    self.ast.has_apply()
  }

  pub fn has_projection(&self) -> bool {
    self.ast.has_projection()
  }

  pub fn has_order_by(&self) -> bool {
    self.ast.has_order_by()
  }

  pub fn skip(&self) -> Result<i64> {
    self.paging(self.ast.skip.as_ref(), "skip")
  }

  pub fn limit(&self) -> Result<i64> {
    self.paging(self.ast.limit.as_ref(), "limit")
  }

  fn paging(&self, unit: Option<&Unit>, what: &str) -> Result<i64> {
    let Some(unit) = unit else {
      return Ok(0);
    };
    match matcher::resolve_unit(unit, &self.pt)? {
      Val::I64(v) if v >= 0 => Ok(v),
      _ => Err(Error::InvalidPlaceholder(what.to_string())),
    }
  }
}
