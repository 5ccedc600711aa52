//! Projection engine: prunes a materialized tree to the shape demanded by
//! the query's projection clauses.
//!
//! Two passes over the tree. The first advances a per-clause position
//! cursor along the visit and, on a full match, deletes the subtree
//! (exclusive clause) or marks it `KEEP` and its ancestors `PATH`. The
//! second pass runs only when an inclusive clause reached the root and
//! sweeps everything unmarked.

use crate::ast::{ProjSeg, Projection};
use crate::tree::{TreeDoc, TreeId, TreeVisitCmd};

pub(crate) const MARK_PATH: u8 = 1;
pub(crate) const MARK_KEEP: u8 = 2;

struct ClauseState {
  pos: i32,
  cnt: usize,
}

pub(crate) fn project(tree: &mut TreeDoc, projections: &[Projection]) {
  let mut start = 0;
  for (i, p) in projections.iter().enumerate() {
    if p.all {
      if p.exclude {
        // -all anywhere in the chain empties the container
        tree.clear_children(tree.root());
        return;
      }
      // clauses before +all are subsumed by it
      start = i + 1;
    }
  }
  let clauses = &projections[start..];
  if clauses.is_empty() {
    return;
  }
  let mut states: Vec<ClauseState> = clauses
    .iter()
    .map(|p| ClauseState {
      pos: -1,
      cnt: p.segments.len(),
    })
    .collect();
  tree.visit_mut(&mut |tree, id, lvl, key| {
    for (clause, state) in clauses.iter().zip(states.iter_mut()) {
      if clause_matched(clause, state, lvl, key) {
        if clause.exclude {
          return TreeVisitCmd::Delete;
        }
        mark_up(tree, id);
      }
    }
    TreeVisitCmd::Continue
  });
  if tree.node(tree.root()).flags & MARK_PATH != 0 {
    tree.visit_mut(&mut |tree, id, _lvl, _key| {
      let flags = tree.node(id).flags;
      if flags & MARK_PATH != 0 {
        TreeVisitCmd::Continue
      } else if flags & MARK_KEEP != 0 {
        TreeVisitCmd::SkipNested
      } else {
        TreeVisitCmd::Delete
      }
    });
  }
}

fn mark_up(tree: &mut TreeDoc, id: TreeId) {
  tree.node_mut(id).flags |= MARK_KEEP;
  let mut cur = tree.node(id).parent;
  while let Some(p) = cur {
    tree.node_mut(p).flags |= MARK_PATH;
    cur = tree.node(p).parent;
  }
}

/// One match step of a clause at the current visit position. Returns true
/// when the clause just matched its final segment.
fn clause_matched(
  clause: &Projection,
  state: &mut ClauseState,
  lvl: i32,
  key: &str,
) -> bool {
  if state.cnt as i32 <= lvl {
    return false;
  }
  if state.pos >= lvl {
    state.pos = lvl - 1;
  }
  if state.pos + 1 == lvl {
    let hit = match &clause.segments[lvl as usize] {
      ProjSeg::Field(f) => f == key,
      ProjSeg::Any => true,
      ProjSeg::Alternation(fields) => fields.iter().any(|f| f == key),
    };
    if hit {
      state.pos = lvl;
      return state.cnt as i32 == lvl + 1;
    }
  }
  false
}
