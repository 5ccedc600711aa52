//! Mutations applied by a query's `apply` clause.
//!
//! An array argument is applied as an RFC 6902 patch; an object argument
//! as an RFC 7386 merge-patch. Paths use RFC 6901 pointer syntax.

use crate::error::{Error, Result};

use serde_json::{Map, Value};

/// Applies `patch` to `root`, dispatching on the patch's shape.
pub fn apply_patch(root: &mut Value, patch: &Value) -> Result<()> {
  match patch {
    Value::Array(ops) => {
      for op in ops {
        apply_op(root, op)?;
      }
      Ok(())
    }
    Value::Object(_) => {
      merge_patch(root, patch);
      Ok(())
    }
    _ => Err(err("patch must be an array of operations or a merge object")),
  }
}

fn err(msg: impl Into<String>) -> Error {
  Error::Patch(msg.into())
}

fn apply_op(root: &mut Value, op: &Value) -> Result<()> {
  let obj = op
    .as_object()
    .ok_or_else(|| err("patch operation must be an object"))?;
  let kind = obj
    .get("op")
    .and_then(Value::as_str)
    .ok_or_else(|| err("patch operation misses `op`"))?;
  let path = obj
    .get("path")
    .and_then(Value::as_str)
    .ok_or_else(|| err("patch operation misses `path`"))?;
  match kind {
    "add" => add(root, path, op_value(obj)?.clone()),
    "remove" => remove(root, path).map(|_| ()),
    "replace" => replace(root, path, op_value(obj)?.clone()),
    "move" => {
      let from = op_from(obj)?;
      let taken = remove(root, from)?;
      add(root, path, taken)
    }
    "copy" => {
      let from = op_from(obj)?;
      let copied = get(root, from)?.clone();
      add(root, path, copied)
    }
    "test" => {
      if get(root, path)? == op_value(obj)? {
        Ok(())
      } else {
        Err(err(format!("test failed at `{path}`")))
      }
    }
    other => Err(err(format!("unknown patch op `{other}`"))),
  }
}

fn op_value(obj: &Map<String, Value>) -> Result<&Value> {
  obj
    .get("value")
    .ok_or_else(|| err("patch operation misses `value`"))
}

fn op_from(obj: &Map<String, Value>) -> Result<&str> {
  obj
    .get("from")
    .and_then(Value::as_str)
    .ok_or_else(|| err("patch operation misses `from`"))
}

fn split_pointer(path: &str) -> Result<Vec<String>> {
  if path.is_empty() {
    return Ok(Vec::new());
  }
  let rest = path
    .strip_prefix('/')
    .ok_or_else(|| err(format!("invalid pointer `{path}`")))?;
  Ok(
    rest
      .split('/')
      .map(|t| t.replace("~1", "/").replace("~0", "~"))
      .collect(),
  )
}

fn locate_mut<'a>(root: &'a mut Value, tokens: &[String]) -> Result<&'a mut Value> {
  let mut cur = root;
  for token in tokens {
    cur = match cur {
      Value::Object(map) => map
        .get_mut(token)
        .ok_or_else(|| err(format!("path not found at `{token}`")))?,
      Value::Array(items) => {
        let idx = array_index(token, items.len())?;
        &mut items[idx]
      }
      _ => return Err(err(format!("cannot traverse scalar at `{token}`"))),
    };
  }
  Ok(cur)
}

fn array_index(token: &str, len: usize) -> Result<usize> {
  let idx: usize = token
    .parse()
    .map_err(|_| err(format!("invalid array index `{token}`")))?;
  if idx >= len {
    return Err(err(format!("array index `{token}` out of bounds")));
  }
  Ok(idx)
}

fn get<'a>(root: &'a Value, path: &str) -> Result<&'a Value> {
  root
    .pointer(path)
    .ok_or_else(|| err(format!("path `{path}` not found")))
}

fn add(root: &mut Value, path: &str, value: Value) -> Result<()> {
  let tokens = split_pointer(path)?;
  let Some((last, parents)) = tokens.split_last() else {
    *root = value;
    return Ok(());
  };
  match locate_mut(root, parents)? {
    Value::Object(map) => {
      map.insert(last.clone(), value);
      Ok(())
    }
    Value::Array(items) => {
      if last == "-" {
        items.push(value);
        return Ok(());
      }
      let idx: usize = last
        .parse()
        .map_err(|_| err(format!("invalid array index `{last}`")))?;
      if idx > items.len() {
        return Err(err(format!("array index `{last}` out of bounds")));
      }
      items.insert(idx, value);
      Ok(())
    }
    _ => Err(err(format!("cannot add into scalar at `{path}`"))),
  }
}

fn remove(root: &mut Value, path: &str) -> Result<Value> {
  let tokens = split_pointer(path)?;
  let Some((last, parents)) = tokens.split_last() else {
    return Err(err("cannot remove the document root"));
  };
  match locate_mut(root, parents)? {
    Value::Object(map) => map
      .remove(last.as_str())
      .ok_or_else(|| err(format!("path `{path}` not found"))),
    Value::Array(items) => {
      let idx = array_index(last, items.len())?;
      Ok(items.remove(idx))
    }
    _ => Err(err(format!("cannot remove from scalar at `{path}`"))),
  }
}

fn replace(root: &mut Value, path: &str, value: Value) -> Result<()> {
  let slot = root
    .pointer_mut(path)
    .ok_or_else(|| err(format!("path `{path}` not found")))?;
  *slot = value;
  Ok(())
}

fn merge_patch(target: &mut Value, patch: &Value) {
  let Value::Object(pobj) = patch else {
    *target = patch.clone();
    return;
  };
  if !target.is_object() {
    *target = Value::Object(Map::new());
  }
  if let Value::Object(tobj) = target {
    for (key, pv) in pobj {
      if pv.is_null() {
        tobj.remove(key);
      } else {
        merge_patch(tobj.entry(key.clone()).or_insert(Value::Null), pv);
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use serde_json::json;

  fn patched(doc: Value, patch: Value) -> Value {
    let mut doc = doc;
    apply_patch(&mut doc, &patch).unwrap();
    doc
  }

  #[test]
  fn test_add_replace_remove() {
    let doc = json!({"a": 1, "xs": [1, 3]});
    let out = patched(
      doc,
      json!([
        {"op": "add", "path": "/b", "value": 2},
        {"op": "add", "path": "/xs/1", "value": 2},
        {"op": "add", "path": "/xs/-", "value": 4},
        {"op": "replace", "path": "/a", "value": 10},
        {"op": "remove", "path": "/xs/0"}
      ]),
    );
    assert_eq!(out, json!({"a": 10, "b": 2, "xs": [2, 3, 4]}));
  }

  #[test]
  fn test_move_copy_test() {
    let doc = json!({"a": {"b": 1}, "c": 2});
    let out = patched(
      doc,
      json!([
        {"op": "test", "path": "/c", "value": 2},
        {"op": "copy", "from": "/a/b", "path": "/d"},
        {"op": "move", "from": "/c", "path": "/a/c"}
      ]),
    );
    assert_eq!(out, json!({"a": {"b": 1, "c": 2}, "d": 1}));
  }

  #[test]
  fn test_failed_test_op() {
    let mut doc = json!({"a": 1});
    let patch = json!([{"op": "test", "path": "/a", "value": 2}]);
    let errv = apply_patch(&mut doc, &patch).unwrap_err();
    assert_eq!(errv.code(), "Patch");
  }

  #[test]
  fn test_escaped_pointer_tokens() {
    let doc = json!({"a/b": 1, "m~n": 2});
    let out = patched(doc, json!([{"op": "remove", "path": "/a~1b"}]));
    assert_eq!(out, json!({"m~n": 2}));
  }

  #[test]
  fn test_merge_patch() {
    let doc = json!({"a": {"x": 1, "y": 2}, "b": 3});
    let out = patched(doc, json!({"a": {"y": null, "z": 9}, "c": 4}));
    assert_eq!(out, json!({"a": {"x": 1, "z": 9}, "b": 3, "c": 4}));
  }

  #[test]
  fn test_merge_patch_replaces_scalars() {
    let doc = json!({"a": 1});
    let out = patched(doc, json!({"a": {"b": 2}}));
    assert_eq!(out, json!({"a": {"b": 2}}));
  }

  #[test]
  fn test_scalar_patch_argument_is_rejected() {
    let mut doc = json!({});
    assert!(apply_patch(&mut doc, &json!(42)).is_err());
  }

  #[test]
  fn test_out_of_bounds_and_missing_paths() {
    let mut doc = json!({"xs": [1]});
    assert!(apply_patch(&mut doc, &json!([{"op": "remove", "path": "/xs/5"}])).is_err());
    assert!(apply_patch(&mut doc, &json!([{"op": "replace", "path": "/nope", "value": 1}])).is_err());
  }
}
