//! Materialized mutable document tree.
//!
//! Nodes live in one arena and carry parent/children links plus a flags
//! byte used by the projection engine's marks. The visitor mirrors the
//! walker's event shape and additionally supports `Delete`, detaching the
//! current subtree and resuming with the next sibling.

use serde_json::{Map, Value};

pub type TreeId = usize;

const ROOT: TreeId = 0;

#[derive(Debug, Clone, PartialEq)]
pub enum TreeData {
  Object,
  Array,
  Str(String),
  I64(i64),
  F64(f64),
  Bool(bool),
  Null,
}

#[derive(Debug)]
pub struct TreeNode {
  pub parent: Option<TreeId>,
  /// Object member key; `None` for array elements and the root.
  pub key: Option<String>,
  pub data: TreeData,
  pub children: Vec<TreeId>,
  pub(crate) flags: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TreeVisitCmd {
  Continue,
  SkipNested,
  /// Detach the current subtree and continue with the next sibling.
  Delete,
}

#[derive(Debug)]
pub struct TreeDoc {
  nodes: Vec<TreeNode>,
}

impl TreeDoc {
  pub fn from_value(doc: &Value) -> Self {
    let mut tree = TreeDoc { nodes: Vec::new() };
    tree.build(doc, None, None);
    tree
  }

  fn build(&mut self, v: &Value, parent: Option<TreeId>, key: Option<String>) -> TreeId {
    let data = match v {
      Value::Null => TreeData::Null,
      Value::Bool(b) => TreeData::Bool(*b),
      Value::Number(n) => {
        if let Some(i) = n.as_i64() {
          TreeData::I64(i)
        } else {
          TreeData::F64(n.as_f64().unwrap_or(0.0))
        }
      }
      Value::String(s) => TreeData::Str(s.clone()),
      Value::Array(_) => TreeData::Array,
      Value::Object(_) => TreeData::Object,
    };
    let id = self.nodes.len();
    self.nodes.push(TreeNode {
      parent,
      key,
      data,
      children: Vec::new(),
      flags: 0,
    });
    if let Some(p) = parent {
      self.nodes[p].children.push(id);
    }
    match v {
      Value::Object(map) => {
        for (k, child) in map {
          self.build(child, Some(id), Some(k.clone()));
        }
      }
      Value::Array(items) => {
        for child in items {
          self.build(child, Some(id), None);
        }
      }
      _ => {}
    }
    id
  }

  pub fn to_value(&self) -> Value {
    self.value_of(ROOT)
  }

  fn value_of(&self, id: TreeId) -> Value {
    let node = &self.nodes[id];
    match &node.data {
      TreeData::Null => Value::Null,
      TreeData::Bool(b) => Value::Bool(*b),
      TreeData::I64(i) => Value::Number((*i).into()),
      TreeData::F64(f) => serde_json::Number::from_f64(*f)
        .map(Value::Number)
        .unwrap_or(Value::Null),
      TreeData::Str(s) => Value::String(s.clone()),
      TreeData::Array => Value::Array(
        node.children.iter().map(|&c| self.value_of(c)).collect(),
      ),
      TreeData::Object => {
        let mut map = Map::new();
        for &c in &node.children {
          let key = self.nodes[c].key.clone().unwrap_or_default();
          map.insert(key, self.value_of(c));
        }
        Value::Object(map)
      }
    }
  }

  pub fn root(&self) -> TreeId {
    ROOT
  }

  pub fn node(&self, id: TreeId) -> &TreeNode {
    &self.nodes[id]
  }

  pub(crate) fn node_mut(&mut self, id: TreeId) -> &mut TreeNode {
    &mut self.nodes[id]
  }

  /// Empties the root container, keeping its type.
  pub fn clear_children(&mut self, id: TreeId) {
    self.nodes[id].children.clear();
  }

  /// Depth-first visit of every node below the root; children of the root
  /// are level 0. Array elements get their current position as key.
  pub(crate) fn visit_mut<F>(&mut self, f: &mut F)
  where
    F: FnMut(&mut TreeDoc, TreeId, i32, &str) -> TreeVisitCmd,
  {
    self.visit_children(ROOT, 0, f);
  }

  fn visit_children<F>(&mut self, id: TreeId, lvl: i32, f: &mut F)
  where
    F: FnMut(&mut TreeDoc, TreeId, i32, &str) -> TreeVisitCmd,
  {
    let mut i = 0;
    loop {
      let Some(&child) = self.nodes[id].children.get(i) else {
        break;
      };
      let key = match &self.nodes[child].key {
        Some(k) => k.clone(),
        None => i.to_string(),
      };
      match f(self, child, lvl, &key) {
        TreeVisitCmd::Continue => {
          self.visit_children(child, lvl + 1, f);
          i += 1;
        }
        TreeVisitCmd::SkipNested => i += 1,
        TreeVisitCmd::Delete => {
          // the arena slot stays allocated; only the link is cut
          self.nodes[id].children.remove(i);
        }
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_roundtrip() {
    let doc = json!({
      "name": "A",
      "nums": [1, 2.5, true, null],
      "nested": {"x": {"y": "z"}}
    });
    let tree = TreeDoc::from_value(&doc);
    assert_eq!(tree.to_value(), doc);
  }

  #[test]
  fn test_visit_levels_and_keys() {
    let doc = json!({"a": {"b": [10, 20]}});
    let mut tree = TreeDoc::from_value(&doc);
    let mut seen = Vec::new();
    tree.visit_mut(&mut |_t, _id, lvl, key| {
      seen.push((lvl, key.to_string()));
      TreeVisitCmd::Continue
    });
    assert_eq!(
      seen,
      vec![
        (0, "a".into()),
        (1, "b".into()),
        (2, "0".into()),
        (2, "1".into()),
      ]
    );
  }

  #[test]
  fn test_delete_detaches_subtree() {
    let doc = json!({"a": 1, "b": {"c": 2}, "d": 3});
    let mut tree = TreeDoc::from_value(&doc);
    tree.visit_mut(&mut |t, id, _lvl, key| {
      if key == "b" {
        return TreeVisitCmd::Delete;
      }
      assert!(t.node(id).parent.is_some());
      TreeVisitCmd::Continue
    });
    assert_eq!(tree.to_value(), json!({"a": 1, "d": 3}));
  }

  #[test]
  fn test_delete_array_element_shifts_keys() {
    let doc = json!({"xs": [1, 2, 3]});
    let mut tree = TreeDoc::from_value(&doc);
    tree.visit_mut(&mut |t, id, lvl, _key| {
      if lvl == 1 && t.node(id).data == TreeData::I64(2) {
        return TreeVisitCmd::Delete;
      }
      TreeVisitCmd::Continue
    });
    assert_eq!(tree.to_value(), json!({"xs": [1, 3]}));
  }

  #[test]
  fn test_clear_children() {
    let doc = json!({"a": 1});
    let mut tree = TreeDoc::from_value(&doc);
    tree.clear_children(tree.root());
    assert_eq!(tree.to_value(), json!({}));
  }
}
