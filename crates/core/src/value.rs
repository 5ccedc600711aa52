//! Value domain for query evaluation.
//!
//! [`Val`] is a borrowed, tagged view over a scalar or a structural
//! reference into caller-owned JSON. [`cmp_vals`] implements the engine's
//! coercing comparator: a total signed ordering over the scalar kinds,
//! `None` for unsupported pairs. The asymmetries (length-primary string
//! compare, null-vs-string) are part of the query language's contract and
//! must not be "fixed".

use regex::Regex;
use serde_json::Value;

/// A borrowed value taking part in predicate evaluation.
///
/// `Node` is a non-owning reference to an object or array; scalars inside
/// documents and AST literals are projected to the dedicated variants
/// before comparison.
#[derive(Debug, Clone, Copy)]
pub enum Val<'a> {
  Null,
  Bool(bool),
  I64(i64),
  F64(f64),
  Str(&'a str),
  Node(&'a Value),
  Re(&'a Regex),
}

impl<'a> Val<'a> {
  /// Projects a JSON value to its scalar variant, keeping containers as
  /// `Node` references.
  pub fn from_value(v: &'a Value) -> Self {
    match v {
      Value::Null => Val::Null,
      Value::Bool(b) => Val::Bool(*b),
      Value::Number(n) => {
        if let Some(i) = n.as_i64() {
          Val::I64(i)
        } else {
          Val::F64(n.as_f64().unwrap_or(0.0))
        }
      }
      Value::String(s) => Val::Str(s),
      Value::Object(_) | Value::Array(_) => Val::Node(v),
    }
  }
}

/// An owned value, as stored in the placeholder table.
#[derive(Debug)]
pub enum OwnedVal {
  Null,
  Bool(bool),
  I64(i64),
  F64(f64),
  Str(String),
  Json(Value),
  Re(Regex),
}

impl OwnedVal {
  pub fn as_val(&self) -> Val<'_> {
    match self {
      OwnedVal::Null => Val::Null,
      OwnedVal::Bool(b) => Val::Bool(*b),
      OwnedVal::I64(i) => Val::I64(*i),
      OwnedVal::F64(f) => Val::F64(*f),
      OwnedVal::Str(s) => Val::Str(s),
      OwnedVal::Json(v) => Val::from_value(v),
      OwnedVal::Re(r) => Val::Re(r),
    }
  }
}

pub(crate) fn i64_to_string(v: i64) -> String {
  v.to_string()
}

/// Shortest-roundtrip decimal form, as produced by Rust's float formatter.
pub(crate) fn f64_to_string(v: f64) -> String {
  format!("{v}")
}

/// C-style `atoi`: optional sign and leading digits, 0 when none.
pub(crate) fn str_to_i64(s: &str) -> i64 {
  let s = s.trim_start();
  let (neg, digits) = match s.as_bytes().first() {
    Some(b'-') => (true, &s[1..]),
    Some(b'+') => (false, &s[1..]),
    _ => (false, s),
  };
  let mut out: i64 = 0;
  for b in digits.bytes() {
    if !b.is_ascii_digit() {
      break;
    }
    out = out
      .saturating_mul(10)
      .saturating_add(i64::from(b - b'0'));
  }
  if neg {
    -out
  } else {
    out
  }
}

/// C-style `strtod`: longest parsable numeric prefix, 0.0 when none.
pub(crate) fn str_to_f64(s: &str) -> f64 {
  let s = s.trim_start();
  let bytes = s.as_bytes();
  let mut end = 0;
  while end < bytes.len()
    && matches!(bytes[end], b'0'..=b'9' | b'+' | b'-' | b'.' | b'e' | b'E')
  {
    end += 1;
  }
  // trailing junk like "1e" or "2." is still a valid prefix of length - 1
  while end > 0 {
    if let Ok(v) = s[..end].parse::<f64>() {
      return v;
    }
    end -= 1;
  }
  0.0
}

fn sign_f64(l: f64, r: f64) -> i64 {
  if l > r {
    1
  } else if l < r {
    -1
  } else {
    0
  }
}

fn sign_i64(l: i64, r: i64) -> i64 {
  match l.cmp(&r) {
    std::cmp::Ordering::Greater => 1,
    std::cmp::Ordering::Less => -1,
    std::cmp::Ordering::Equal => 0,
  }
}

fn sign_str(l: &str, r: &str) -> i64 {
  match l.cmp(r) {
    std::cmp::Ordering::Greater => 1,
    std::cmp::Ordering::Less => -1,
    std::cmp::Ordering::Equal => 0,
  }
}

/// Coercing comparator over [`Val`] pairs.
///
/// Returns a signed ordering, or `None` when the pair is unsupported;
/// callers demote `None` to "predicate false", never to an error.
pub fn cmp_vals(left: Val, right: Val) -> Option<i64> {
  // scalar Node references are projected before dispatch
  let lv = match left {
    Val::Node(v) if !v.is_object() && !v.is_array() => Val::from_value(v),
    other => other,
  };
  let rv = match right {
    Val::Node(v) if !v.is_object() && !v.is_array() => Val::from_value(v),
    other => other,
  };
  match (lv, rv) {
    (Val::Str(l), Val::Str(r)) => {
      let diff = l.len() as i64 - r.len() as i64;
      if diff != 0 {
        Some(diff)
      } else {
        Some(sign_str(l, r))
      }
    }
    (Val::Str(l), Val::Bool(r)) => Some((l == "true") as i64 - r as i64),
    (Val::Str(l), Val::I64(r)) => Some(sign_str(l, &i64_to_string(r))),
    (Val::Str(l), Val::F64(r)) => Some(sign_str(l, &f64_to_string(r))),
    (Val::Str(l), Val::Null) => Some(if l.is_empty() { 0 } else { 1 }),

    (Val::I64(l), Val::I64(r)) => Some(sign_i64(l, r)),
    (Val::I64(l), Val::F64(r)) => Some(sign_f64(l as f64, r)),
    (Val::I64(l), Val::Str(r)) => Some(sign_i64(l, str_to_i64(r))),
    (Val::I64(l), Val::Bool(r)) => Some(sign_i64(l, r as i64)),
    (Val::I64(_), Val::Null) => Some(1),

    (Val::F64(l), Val::F64(r)) => Some(sign_f64(l, r)),
    (Val::F64(l), Val::I64(r)) => Some(sign_f64(l, r as f64)),
    (Val::F64(l), Val::Str(r)) => Some(sign_f64(l, str_to_f64(r))),
    (Val::F64(l), Val::Bool(r)) => Some(sign_f64(l, r as i64 as f64)),
    (Val::F64(_), Val::Null) => Some(1),

    (Val::Bool(l), Val::Bool(r)) => Some(l as i64 - r as i64),
    (Val::Bool(l), Val::I64(r)) => Some(l as i64 - (r != 0) as i64),
    (Val::Bool(l), Val::F64(r)) => Some(l as i64 - (r != 0.0) as i64),
    (Val::Bool(l), Val::Str(r)) => Some(l as i64 - (r == "true") as i64),
    (Val::Bool(l), Val::Null) => Some(l as i64),

    (Val::Null, Val::Null) => Some(0),
    (Val::Null, Val::Str(r)) => Some(if r.is_empty() { 0 } else { -1 }),
    (Val::Null, _) => Some(-1),

    (Val::Node(l), Val::Node(r)) => {
      let compatible =
        (l.is_array() && r.is_array()) || (l.is_object() && r.is_object());
      if compatible {
        Some(compare_nodes(l, r))
      } else {
        None
      }
    }
    _ => None,
  }
}

/// Total structural ordering over JSON trees: type rank first, then
/// length, then content.
pub fn compare_nodes(left: &Value, right: &Value) -> i64 {
  let (lr, rr) = (type_rank(left), type_rank(right));
  if lr != rr {
    return (lr - rr) as i64;
  }
  match (left, right) {
    (Value::Array(l), Value::Array(r)) => {
      if l.len() != r.len() {
        return l.len() as i64 - r.len() as i64;
      }
      for (lv, rv) in l.iter().zip(r) {
        let cmp = compare_nodes(lv, rv);
        if cmp != 0 {
          return cmp;
        }
      }
      0
    }
    (Value::Object(l), Value::Object(r)) => {
      if l.len() != r.len() {
        return l.len() as i64 - r.len() as i64;
      }
      for (key, lv) in l {
        let Some(rv) = r.get(key) else {
          return 1;
        };
        let cmp = compare_nodes(lv, rv);
        if cmp != 0 {
          return cmp;
        }
      }
      0
    }
    _ => cmp_vals(Val::from_value(left), Val::from_value(right)).unwrap_or(0),
  }
}

fn type_rank(v: &Value) -> i32 {
  match v {
    Value::Null => 0,
    Value::Bool(_) => 1,
    Value::Number(_) => 2,
    Value::String(_) => 3,
    Value::Array(_) => 4,
    Value::Object(_) => 5,
  }
}
