//! The per-document match walk.
//!
//! The document is visited once, depth-first. Each filter keeps the
//! minimum state needed to resume path matching at any level: a sticky
//! `matched` flag, the deepest level where it made progress, and one
//! live range per path step. All of it lives in [`MatchState`], parallel
//! to the AST and indexed by the ids assigned at parse time, so the AST
//! itself is never mutated.

use crate::ast::{AstCounts, ExprItem, ExprNode, Filter, JoinOp, QueryAst, StepKind};
use crate::error::Result;
use crate::matcher::{match_node_exprs, EventCtx, RegexCache};
use crate::placeholder::PlaceholderTable;
use crate::walker::{self, VisitCmd};

use log::debug;
use serde_json::Value;

/// Liveness of one path step during a walk.
///
/// `Collecting` is the `**` glob swallowing every deeper level;
/// `Consumed` marks a `**` whose successor matched at `level`, excluding
/// the glob from matching at that level or deeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeState {
  Unreached,
  Armed { start: i32, end: i32 },
  Collecting { start: i32 },
  Consumed { level: i32 },
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FilterState {
  pub matched: bool,
  /// Deepest level at which the filter advanced; -1 before any progress.
  pub last_lvl: i32,
}

impl FilterState {
  fn new() -> Self {
    FilterState {
      matched: false,
      last_lvl: -1,
    }
  }
}

/// Shadow evaluation state for one query, reset per document.
#[derive(Debug)]
pub(crate) struct MatchState {
  pub matched: bool,
  /// Some filter advanced its terminal step during the current event.
  pub dirty: bool,
  pub exprs: Vec<bool>,
  pub filters: Vec<FilterState>,
  pub steps: Vec<NodeState>,
}

impl MatchState {
  pub fn new(counts: &AstCounts) -> Self {
    MatchState {
      matched: false,
      dirty: false,
      exprs: vec![false; counts.expr_nodes],
      filters: vec![FilterState::new(); counts.filters],
      steps: vec![NodeState::Unreached; counts.path_steps],
    }
  }

  pub fn reset(&mut self) {
    self.matched = false;
    self.dirty = false;
    self.exprs.iter_mut().for_each(|m| *m = false);
    self.filters.iter_mut().for_each(|f| *f = FilterState::new());
    self.steps.iter_mut().for_each(|s| *s = NodeState::Unreached);
  }
}

/// Borrows a query's pieces for one `matched` walk.
pub(crate) struct DocMatcher<'q> {
  pub ast: &'q QueryAst,
  pub pt: &'q PlaceholderTable,
  pub regexes: &'q mut RegexCache,
  pub state: &'q mut MatchState,
}

impl DocMatcher<'_> {
  pub fn run(&mut self, doc: &Value) -> Result<bool> {
    if self.is_trivial_match_all() {
      debug!("single wildcard filter, matching without a walk");
      self.state.matched = true;
      return Ok(true);
    }
    walker::visit(doc, &mut |lvl, value, key, idx| {
      let kbuf;
      let key = match key {
        Some(k) => k,
        None => {
          kbuf = idx.to_string();
          &kbuf
        }
      };
      self.on_event(&EventCtx { lvl, key, value })
    })?;
    Ok(self.state.matched)
  }

  /// A query whose whole expression is one `/*` or `/**` filter matches
  /// any document.
  fn is_trivial_match_all(&self) -> bool {
    let chain = &self.ast.expr.chain;
    if chain.len() != 1 {
      return false;
    }
    let ExprItem::Filter(f) = &chain[0].item else {
      return false;
    };
    f.steps.len() == 1
      && matches!(f.steps[0].kind, StepKind::Any | StepKind::AnyDescent)
  }

  fn on_event(&mut self, ctx: &EventCtx) -> Result<VisitCmd> {
    let ast = self.ast;
    let matched = self.eval_expr_node(&ast.expr, ctx)?;
    self.state.matched = matched;
    if matched {
      return Ok(VisitCmd::Terminate);
    }
    if self.state.dirty {
      self.state.dirty = false;
      if !self.need_deeper(&ast.expr, ctx.lvl) {
        return Ok(VisitCmd::SkipNested);
      }
    }
    Ok(VisitCmd::Continue)
  }

  fn eval_expr_node(&mut self, en: &ExprNode, ctx: &EventCtx) -> Result<bool> {
    if self.state.exprs[en.id] {
      return Ok(true);
    }
    let mut prev = false;
    for child in &en.chain {
      let mut matched = match &child.item {
        ExprItem::Expr(sub) => self.eval_expr_node(sub, ctx)?,
        ExprItem::Filter(f) => self.eval_filter(f, ctx)?,
      };
      match child.join {
        None => prev = matched,
        Some(join) => {
          if join.negate {
            matched = !matched;
          }
          if join.op == JoinOp::And {
            prev = prev && matched;
          } else if prev || matched {
            prev = true;
            break;
          }
        }
      }
    }
    if prev {
      self.state.exprs[en.id] = true;
    }
    Ok(prev)
  }

  fn eval_filter(&mut self, f: &Filter, ctx: &EventCtx) -> Result<bool> {
    if self.state.filters[f.id].matched {
      return Ok(true);
    }
    let lvl = ctx.lvl;
    if self.state.filters[f.id].last_lvl + 1 < lvl {
      // a deeper level appeared before this filter advanced
      return Ok(false);
    }
    if self.state.filters[f.id].last_lvl >= lvl {
      // the walker moved up or sideways: disarm every step reached at
      // this level or deeper
      self.state.filters[f.id].last_lvl = lvl - 1;
      for step in &f.steps {
        let ns = &mut self.state.steps[step.id];
        let stale = match *ns {
          NodeState::Unreached => false,
          NodeState::Armed { start, .. } | NodeState::Collecting { start } => {
            start >= lvl
          }
          NodeState::Consumed { level } => level >= lvl,
        };
        if stale {
          *ns = NodeState::Unreached;
        }
      }
    }
    for (i, step) in f.steps.iter().enumerate() {
      let armed = match self.state.steps[step.id] {
        NodeState::Unreached => true,
        NodeState::Armed { start, end } => lvl >= start && lvl <= end,
        NodeState::Collecting { start } => lvl >= start,
        NodeState::Consumed { .. } => false,
      };
      if armed {
        let (last_idx, matched) = self.match_step(f, i, ctx)?;
        if matched {
          if last_idx == f.steps.len() - 1 {
            self.state.filters[f.id].matched = true;
            self.state.dirty = true;
          }
          self.state.filters[f.id].last_lvl = lvl;
        }
        break;
      }
    }
    Ok(self.state.filters[f.id].matched)
  }

  /// Matches one armed step, returning the index of the step that ended
  /// up matching (a `**` hands over to its successor) and the outcome.
  fn match_step(
    &mut self,
    f: &Filter,
    i: usize,
    ctx: &EventCtx,
  ) -> Result<(usize, bool)> {
    let step = &f.steps[i];
    let here = NodeState::Armed {
      start: ctx.lvl,
      end: ctx.lvl,
    };
    match &step.kind {
      StepKind::Field(name) => {
        self.state.steps[step.id] = here;
        Ok((i, ctx.key == name.as_str()))
      }
      StepKind::Any => {
        self.state.steps[step.id] = here;
        Ok((i, true))
      }
      StepKind::Expr(exprs) => {
        self.state.steps[step.id] = here;
        let matched = match_node_exprs(exprs, ctx, self.pt, self.regexes)?;
        Ok((i, matched))
      }
      StepKind::AnyDescent => {
        let start = match self.state.steps[step.id] {
          NodeState::Unreached => ctx.lvl,
          NodeState::Armed { start, .. } | NodeState::Collecting { start } => start,
          NodeState::Consumed { level } => level,
        };
        if i + 1 < f.steps.len() {
          let (next_idx, succ) = self.match_step(f, i + 1, ctx)?;
          if succ {
            self.state.steps[step.id] = NodeState::Consumed { level: ctx.lvl };
            return Ok((next_idx, true));
          }
        }
        self.state.steps[step.id] = NodeState::Collecting { start };
        Ok((i, true))
      }
    }
  }

  /// Whether any unmatched filter can only advance by descending below
  /// `lvl`.
  fn need_deeper(&self, en: &ExprNode, lvl: i32) -> bool {
    for child in &en.chain {
      match &child.item {
        ExprItem::Expr(sub) => {
          if self.need_deeper(sub, lvl) {
            return true;
          }
        }
        ExprItem::Filter(f) => {
          let fs = self.state.filters[f.id];
          if !fs.matched && fs.last_lvl == lvl {
            return true;
          }
        }
      }
    }
    false
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::parse;
  use serde_json::{json, Value};

  struct Harness {
    ast: QueryAst,
    pt: PlaceholderTable,
    regexes: RegexCache,
    state: MatchState,
  }

  impl Harness {
    fn new(query: &str) -> Self {
      let ast = parse::parse(query).unwrap();
      let pt = PlaceholderTable::new(&ast.placeholders);
      let regexes = RegexCache::new(ast.counts.ops);
      let state = MatchState::new(&ast.counts);
      Harness {
        ast,
        pt,
        regexes,
        state,
      }
    }

    fn matcher(&mut self) -> DocMatcher<'_> {
      DocMatcher {
        ast: &self.ast,
        pt: &self.pt,
        regexes: &mut self.regexes,
        state: &mut self.state,
      }
    }

    fn run(&mut self, doc: &Value) -> bool {
      self.state.reset();
      self.matcher().run(doc).unwrap()
    }
  }

  fn matches(query: &str, doc: Value) -> bool {
    Harness::new(query).run(&doc)
  }

  #[test]
  fn test_trivial_wildcard_matches_without_walk() {
    assert!(matches("/*", json!({"a": 1})));
    assert!(matches("/**", json!({"a": 1})));
    // the fast path fires before any event, even for scalar documents
    assert!(matches("/*", json!(42)));
  }

  #[test]
  fn test_field_equality() {
    assert!(matches("/name = \"Alice\"", json!({"name": "Alice"})));
    assert!(!matches("/name = \"Alice\"", json!({"name": "alice"})));
    assert!(!matches("/name = \"Alice\"", json!({})));
  }

  #[test]
  fn test_nested_path() {
    let doc = json!({"user": {"age": 20, "name": "A"}});
    assert!(matches("/user/age = 20", doc.clone()));
    assert!(!matches("/user/age = 21", doc.clone()));
    assert!(!matches("/nope/age = 20", doc));
  }

  #[test]
  fn test_any_descent() {
    assert!(matches("/**/age > 18", json!({"u": {"age": 20}})));
    assert!(!matches("/**/age > 18", json!({"u": {"age": 18}})));
    // type mismatch demotes to false
    assert!(!matches("/**/age > 18", json!({"age": []})));
    // zero intermediate levels
    assert!(matches("/**/age > 18", json!({"age": 19})));
  }

  #[test]
  fn test_descent_glob_property() {
    // P7: /**/x matches iff some descendant object carries field x
    let docs = [
      (json!({"x": 1}), true),
      (json!({"a": {"x": 1}}), true),
      (json!({"a": {"b": {"c": {"x": null}}}}), true),
      (json!({"a": {"y": 1}, "b": 2}), false),
      (json!({"xx": {"yx": 1}}), false),
    ];
    for (doc, expect) in docs {
      assert_eq!(matches("/**/x", doc.clone()), expect, "doc: {doc}");
    }
  }

  #[test]
  fn test_descent_through_arrays() {
    let doc = json!({"users": [{"age": 30}, {"age": 10}]});
    assert!(matches("/**/age >= 30", doc.clone()));
    assert!(!matches("/**/age > 30", doc));
  }

  #[test]
  fn test_wildcard_step() {
    let doc = json!({"a": {"age": 5}, "b": {"age": 25}});
    assert!(matches("/*/age > 20", doc.clone()));
    assert!(!matches("/*/age > 30", doc));
  }

  #[test]
  fn test_in_and_ni() {
    assert!(matches(r#"/tag in ["a", "b"]"#, json!({"tag": "b"})));
    assert!(!matches(r#"/tag in ["a", "b"]"#, json!({"tag": "c"})));
    assert!(matches(r#"/tags ni "x""#, json!({"tags": ["x", "y"]})));
    assert!(!matches(r#"/tags ni "z""#, json!({"tags": ["x", "y"]})));
    // in against a non-array operand is unsupported, hence false
    assert!(!matches(r#"/tag in "a""#, json!({"tag": "a"})));
  }

  #[test]
  fn test_regexp_filter() {
    assert!(matches(r#"/email re "^.+@.+$""#, json!({"email": "a@b"})));
    assert!(!matches(r#"/email re "^.+@.+$""#, json!({"email": "ab"})));
  }

  #[test]
  fn test_joins_between_filters() {
    let doc = json!({"a": 1, "b": 2});
    assert!(matches("/a = 1 and /b = 2", doc.clone()));
    assert!(!matches("/a = 1 and /b = 3", doc.clone()));
    assert!(matches("/a = 9 or /b = 2", doc.clone()));
    assert!(matches("/a = 1 and not /b = 3", doc.clone()));
    assert!(!matches("/a = 1 and not /b = 2", doc.clone()));
    assert!(matches("(/a = 9 or /b = 2) and /a = 1", doc));
  }

  #[test]
  fn test_key_predicate() {
    let doc = json!({"meta_x": 1, "other": 2});
    assert!(matches(r#"/[* re "^meta_"]"#, doc.clone()));
    assert!(!matches(r#"/[* re "^mata_"]"#, doc.clone()));
    assert!(matches(r#"/[[* = "other"] = 2]"#, doc));
  }

  #[test]
  fn test_expr_chain_joins() {
    let doc = json!({"n": 15});
    assert!(matches("/[n > 10 and n < 20]", doc.clone()));
    assert!(!matches("/[n > 10 and n > 20]", doc.clone()));
    assert!(matches("/[n > 20 or n > 10]", doc));
  }

  #[test]
  fn test_level_regression_resets_state() {
    let doc = json!({"x": {"z": 1}, "w": {"y": 1}});
    assert!(matches("/w/y = 1", doc.clone()));
    assert!(!matches("/x/y = 1", doc.clone()));
    // sibling containers with the same inner field
    let doc = json!({"a": {"b": 1}, "c": {"b": 2}});
    assert!(matches("/c/b = 2", doc.clone()));
    assert!(!matches("/a/b = 2", doc));
  }

  #[test]
  fn test_deeper_levels_do_not_rearm_stale_filters() {
    // /a/b must not match the b nested one level deeper
    let doc = json!({"a": {"wrap": {"b": 1}}});
    assert!(!matches("/a/b = 1", doc));
  }

  #[test]
  fn test_unset_placeholder_errors_the_walk() {
    let mut h = Harness::new("/name = :n");
    let doc = json!({"name": "Alice"});
    let err = h.matcher().run(&doc).unwrap_err();
    assert_eq!(err.code(), "UnsetPlaceholder");
  }

  #[test]
  fn test_filter_progress_is_monotonic() {
    // P1: last_lvl never decreases while event levels are non-decreasing
    let mut h = Harness::new("/a/b/c = 1");
    let doc = json!({"a": {"b": {"c": 1}}});
    let events = [
      (0, "a", json!({"b": {"c": 1}})),
      (1, "b", json!({"c": 1})),
      (2, "c", json!(1)),
    ];
    let mut last = -1;
    for (lvl, key, value) in &events {
      let mut m = h.matcher();
      m.on_event(&EventCtx {
        lvl: *lvl,
        key: *key,
        value,
      })
      .unwrap();
      let now = h.state.filters[0].last_lvl;
      assert!(now >= last, "last_lvl regressed: {now} < {last}");
      last = now;
    }
    assert!(h.state.matched);
    assert!(h.run(&doc));
  }

  #[test]
  fn test_matched_filter_is_sticky() {
    // P2: once matched, later events cannot unmatch the filter
    let mut h = Harness::new("/a = 1");
    let a = json!(1);
    let junk = json!("junk");
    {
      let mut m = h.matcher();
      m.on_event(&EventCtx {
        lvl: 0,
        key: "a",
        value: &a,
      })
      .unwrap();
    }
    assert!(h.state.filters[0].matched);
    let ExprItem::Filter(f) = &h.ast.expr.chain[0].item else {
      panic!();
    };
    let mut m = DocMatcher {
      ast: &h.ast,
      pt: &h.pt,
      regexes: &mut h.regexes,
      state: &mut h.state,
    };
    for lvl in [0, 1, 5] {
      let got = m
        .eval_filter(
          f,
          &EventCtx {
            lvl,
            key: "zzz",
            value: &junk,
          },
        )
        .unwrap();
      assert!(got);
    }
  }

  #[test]
  fn test_reset_clears_per_document_state() {
    let mut h = Harness::new("/a = 1");
    assert!(h.run(&json!({"a": 1})));
    assert!(!h.run(&json!({"a": 2})));
    assert!(h.run(&json!({"a": 1})));
  }
}
