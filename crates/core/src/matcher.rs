//! Leaf predicate evaluation: operator dispatch over the value domain,
//! containment (`in` / `ni`), and regex matching with the per-site cache.
//!
//! Type mismatches between operands are never errors here; they demote the
//! predicate to false before negation is applied.

use crate::ast::{ExprLhs, Join, JoinOp, NodeExpr, OpKind, OpSite, Unit};
use crate::error::{Error, Result};
use crate::placeholder::PlaceholderTable;
use crate::value::{cmp_vals, f64_to_string, i64_to_string, Val};

use log::trace;
use regex::Regex;
use serde_json::Value;

use std::borrow::Cow;

/// One document-walker event, as seen by the evaluator.
pub(crate) struct EventCtx<'e> {
  pub lvl: i32,
  pub key: &'e str,
  pub value: &'e Value,
}

/// Lazily compiled per-operator-site regexes. Entries survive `reset` and
/// live as long as the query.
#[derive(Debug, Default)]
pub(crate) struct RegexCache {
  slots: Vec<Option<CachedRegex>>,
}

impl RegexCache {
  pub fn new(sites: usize) -> Self {
    RegexCache {
      slots: (0..sites).map(|_| None).collect(),
    }
  }

  fn get(&self, id: usize) -> Option<&CachedRegex> {
    self.slots.get(id).and_then(|s| s.as_ref())
  }

  fn put(&mut self, id: usize, entry: CachedRegex) {
    self.slots[id] = Some(entry);
  }
}

/// A compiled pattern with its anchor flags. `^` and `$` are stripped from
/// the source before compilation and re-checked positionally, so the AST's
/// pattern string stays untouched.
#[derive(Debug)]
pub(crate) struct CachedRegex {
  re: Regex,
  match_start: bool,
  match_end: bool,
}

impl CachedRegex {
  fn compile(source: &str) -> Result<Self> {
    let mut pattern = source;
    let match_start = pattern.starts_with('^');
    if match_start {
      pattern = &pattern[1..];
    }
    let match_end = pattern.ends_with('$');
    if match_end {
      pattern = &pattern[..pattern.len() - 1];
    }
    trace!("compiling regex `{pattern}` (start={match_start}, end={match_end})");
    Ok(CachedRegex {
      re: compile_regex(pattern)?,
      match_start,
      match_end,
    })
  }

  fn matches(&self, input: &str) -> bool {
    match self.re.find(input) {
      Some(m) => {
        (!self.match_start || m.start() == 0)
          && (!self.match_end || m.end() == input.len())
      }
      None => false,
    }
  }
}

/// Compiles `pattern`, mapping engine failures onto the public regex error
/// kinds.
pub(crate) fn compile_regex(pattern: &str) -> Result<Regex> {
  Regex::new(pattern).map_err(classify_regex_error)
}

fn classify_regex_error(err: regex::Error) -> Error {
  match err {
    regex::Error::Syntax(msg) => {
      if msg.contains("character class") {
        Error::RegexpCharset
      } else if msg.contains("group") {
        Error::RegexpSubexp
      } else if msg.contains("repetition") {
        Error::RegexpSubmatch
      } else {
        Error::RegexpInvalid(msg)
      }
    }
    regex::Error::CompiledTooBig(_) => {
      Error::RegexpEngine("compiled regular expression too big".into())
    }
    other => Error::RegexpInvalid(other.to_string()),
  }
}

/// Resolves an AST operand to a value, failing on unbound placeholders.
pub(crate) fn resolve_unit<'q>(
  unit: &'q Unit,
  pt: &'q PlaceholderTable,
) -> Result<Val<'q>> {
  Ok(match unit {
    Unit::Str(s) => Val::Str(s),
    Unit::I64(i) => Val::I64(*i),
    Unit::F64(f) => Val::F64(*f),
    Unit::Bool(b) => Val::Bool(*b),
    Unit::Null => Val::Null,
    Unit::Json(v) => Val::from_value(v),
    Unit::Placeholder(idx) => match pt.get(*idx) {
      Some(v) => v.as_val(),
      None => return Err(Error::UnsetPlaceholder(pt.name(*idx).to_string())),
    },
  })
}

/// Evaluates `left op right`, absorbing unsupported pairs to false and
/// applying the operator's negation last.
pub(crate) fn match_pair(
  left: Val,
  op: &OpSite,
  right: Val,
  cache: &mut RegexCache,
) -> Result<bool> {
  let outcome = match op.op {
    OpKind::Eq | OpKind::Gt | OpKind::Gte | OpKind::Lt | OpKind::Lte => {
      cmp_vals(left, right).map(|cmp| match op.op {
        OpKind::Eq => cmp == 0,
        OpKind::Gt => cmp > 0,
        OpKind::Gte => cmp >= 0,
        OpKind::Lt => cmp < 0,
        OpKind::Lte => cmp <= 0,
        _ => unreachable!(),
      })
    }
    OpKind::Re => match_regexp(left, op, right, cache)?,
    OpKind::In => match_in(left, right),
    OpKind::Ni => match_ni(left, right),
  };
  let matched = outcome.unwrap_or(false);
  Ok(matched != op.negate)
}

/// `left in right`: the right operand must be a JSON array; matches when
/// any element compares equal to the left. An incomparable element aborts
/// the scan.
fn match_in(left: Val, right: Val) -> Option<bool> {
  let Val::Node(Value::Array(items)) = right else {
    return None;
  };
  for item in items {
    match cmp_vals(left, Val::from_value(item)) {
      Some(0) => return Some(true),
      Some(_) => {}
      None => return None,
    }
  }
  Some(false)
}

/// `left ni right`: swapped containment — the current value must be an
/// array, matching when any of its elements equals the scalar operand.
fn match_ni(left: Val, right: Val) -> Option<bool> {
  let Val::Node(Value::Array(items)) = left else {
    return None;
  };
  if matches!(right, Val::Node(_) | Val::Re(_)) {
    return None;
  }
  for item in items {
    match cmp_vals(Val::from_value(item), right) {
      Some(0) => return Some(true),
      Some(_) => {}
      None => return None,
    }
  }
  Some(false)
}

fn stringify(val: Val) -> Option<Cow<'_, str>> {
  match val {
    Val::Str(s) => Some(Cow::Borrowed(s)),
    Val::I64(i) => Some(Cow::Owned(i64_to_string(i))),
    Val::F64(f) => Some(Cow::Owned(f64_to_string(f))),
    Val::Bool(b) => Some(Cow::Borrowed(if b { "true" } else { "false" })),
    _ => None,
  }
}

fn match_regexp(
  left: Val,
  op: &OpSite,
  right: Val,
  cache: &mut RegexCache,
) -> Result<Option<bool>> {
  let Some(input) = stringify(left) else {
    return Ok(None);
  };
  if let Some(entry) = cache.get(op.id) {
    return Ok(Some(entry.matches(&input)));
  }
  // a placeholder-bound regex is used as compiled, bypassing the cache
  if let Val::Re(re) = right {
    return Ok(Some(re.find(&input).is_some()));
  }
  let Some(source) = stringify(right) else {
    return Ok(None);
  };
  let entry = CachedRegex::compile(&source)?;
  let matched = entry.matches(&input);
  cache.put(op.id, entry);
  Ok(Some(matched))
}

/// Evaluates the expression chain of one `[...]` path step against the
/// current key and value.
pub(crate) fn match_node_exprs(
  exprs: &[NodeExpr],
  ctx: &EventCtx,
  pt: &PlaceholderTable,
  cache: &mut RegexCache,
) -> Result<bool> {
  let mut prev = false;
  for expr in exprs {
    let matched = match_node_expr(expr, ctx, pt, cache)?;
    match expr.join {
      None => prev = matched,
      Some(Join {
        op: JoinOp::And, ..
      }) => prev = prev && matched,
      Some(Join { op: JoinOp::Or, .. }) => {
        if prev || matched {
          prev = true;
          break;
        }
      }
    }
  }
  Ok(prev)
}

fn match_node_expr(
  expr: &NodeExpr,
  ctx: &EventCtx,
  pt: &PlaceholderTable,
  cache: &mut RegexCache,
) -> Result<bool> {
  let negate = expr.join.map_or(false, |j| j.negate);
  match &expr.lhs {
    ExprLhs::Key => {
      let rv = resolve_unit(&expr.rhs, pt)?;
      let ret = match_pair(Val::Str(ctx.key), &expr.op, rv, cache)?;
      return Ok(ret != negate);
    }
    ExprLhs::Field(name) => {
      if ctx.key != name {
        return Ok(negate);
      }
    }
    ExprLhs::KeyExpr { op, rhs } => {
      let rv = resolve_unit(rhs, pt)?;
      if !match_pair(Val::Str(ctx.key), op, rv, cache)? {
        return Ok(negate);
      }
    }
  }
  let rv = resolve_unit(&expr.rhs, pt)?;
  let ret = match_pair(Val::from_value(ctx.value), &expr.op, rv, cache)?;
  Ok(ret != negate)
}
