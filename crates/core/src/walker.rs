//! Depth-first cursor over a JSON document.
//!
//! Events carry the tree level (top-level members are level 0), the value,
//! and either the object key or the array index. The callback steers the
//! walk with [`VisitCmd`]. Scalar roots produce no events.

use crate::error::Result;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitCmd {
  Continue,
  /// Do not descend into the current value.
  SkipNested,
  /// Stop the whole walk.
  Terminate,
}

/// Visits every position of `doc` exactly once, depth-first and in
/// document order.
pub fn visit<F>(doc: &Value, f: &mut F) -> Result<()>
where
  F: FnMut(i32, &Value, Option<&str>, usize) -> Result<VisitCmd>,
{
  visit_level(0, doc, f).map(|_| ())
}

fn visit_level<F>(lvl: i32, container: &Value, f: &mut F) -> Result<bool>
where
  F: FnMut(i32, &Value, Option<&str>, usize) -> Result<VisitCmd>,
{
  match container {
    Value::Object(map) => {
      for (key, value) in map {
        if dispatch(lvl, value, Some(key), 0, f)? {
          return Ok(true);
        }
      }
    }
    Value::Array(items) => {
      for (idx, value) in items.iter().enumerate() {
        if dispatch(lvl, value, None, idx, f)? {
          return Ok(true);
        }
      }
    }
    _ => {}
  }
  Ok(false)
}

fn dispatch<F>(
  lvl: i32,
  value: &Value,
  key: Option<&str>,
  idx: usize,
  f: &mut F,
) -> Result<bool>
where
  F: FnMut(i32, &Value, Option<&str>, usize) -> Result<VisitCmd>,
{
  match f(lvl, value, key, idx)? {
    VisitCmd::Terminate => Ok(true),
    VisitCmd::SkipNested => Ok(false),
    VisitCmd::Continue => {
      if value.is_object() || value.is_array() {
        visit_level(lvl + 1, value, f)
      } else {
        Ok(false)
      }
    }
  }
}
