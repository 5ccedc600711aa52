//! Query AST, as produced by [`crate::parse`].
//!
//! The tree is immutable after parsing and carries no evaluation state.
//! Expression nodes, filters, path steps and operator sites each get a
//! dense id assigned during parsing; the ids index the parallel shadow
//! state owned by [`crate::Query`], so one parsed query could back many
//! evaluation states.

use serde_json::Value;

/// Boolean combinator over filters and sub-expressions.
#[derive(Debug)]
pub struct ExprNode {
  pub id: usize,
  pub chain: Vec<ExprChild>,
}

#[derive(Debug)]
pub struct ExprChild {
  /// `None` on the first element of a chain.
  pub join: Option<Join>,
  pub item: ExprItem,
}

#[derive(Debug)]
pub enum ExprItem {
  Expr(ExprNode),
  Filter(Filter),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Join {
  pub op: JoinOp,
  pub negate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOp {
  And,
  Or,
}

/// One path-plus-predicate clause.
#[derive(Debug)]
pub struct Filter {
  pub id: usize,
  pub steps: Vec<PathStep>,
}

#[derive(Debug)]
pub struct PathStep {
  pub id: usize,
  pub kind: StepKind,
}

#[derive(Debug)]
pub enum StepKind {
  /// Exact object key, or stringified array index.
  Field(String),
  /// `*`: any single segment.
  Any,
  /// `**`: zero or more intermediate segments.
  AnyDescent,
  /// `[...]`: predicate over the current key/value.
  Expr(Vec<NodeExpr>),
}

/// One `lhs op rhs` predicate inside a `[...]` step.
#[derive(Debug)]
pub struct NodeExpr {
  /// `None` on the first expression of the chain.
  pub join: Option<Join>,
  pub lhs: ExprLhs,
  pub op: OpSite,
  pub rhs: Unit,
}

#[derive(Debug)]
pub enum ExprLhs {
  /// `*`: predicate applies to the current key.
  Key,
  /// Named field: the key must equal it, then the predicate applies to
  /// the current value.
  Field(String),
  /// `[* op rhs]`: key pre-condition, then the outer predicate applies
  /// to the current value.
  KeyExpr { op: OpSite, rhs: Unit },
}

/// An operator instance in the query text. `id` keys the per-site regex
/// cache.
#[derive(Debug, Clone)]
pub struct OpSite {
  pub id: usize,
  pub op: OpKind,
  pub negate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
  Eq,
  Gt,
  Gte,
  Lt,
  Lte,
  Re,
  In,
  Ni,
}

/// Right-hand operand: a literal, or a placeholder index into
/// [`QueryAst::placeholders`].
#[derive(Debug, Clone)]
pub enum Unit {
  Str(String),
  I64(i64),
  F64(f64),
  Bool(bool),
  Null,
  Json(Value),
  Placeholder(usize),
}

/// One projection clause after `|`.
#[derive(Debug, Clone)]
pub struct Projection {
  pub exclude: bool,
  /// The `all` meta-clause; `segments` is empty when set.
  pub all: bool,
  pub segments: Vec<ProjSeg>,
}

#[derive(Debug, Clone)]
pub enum ProjSeg {
  Field(String),
  Any,
  /// `{a,b}` alternation at one position.
  Alternation(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct OrderSpec {
  pub desc: bool,
  pub path: Vec<String>,
}

/// Shadow-state sizing, filled in by the parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct AstCounts {
  pub expr_nodes: usize,
  pub filters: usize,
  pub path_steps: usize,
  pub ops: usize,
}

#[derive(Debug)]
pub struct QueryAst {
  /// Collection named by a leading `@coll`, if any.
  pub collection: Option<String>,
  pub expr: ExprNode,
  pub apply: Option<Value>,
  pub skip: Option<Unit>,
  pub limit: Option<Unit>,
  pub order_by: Vec<OrderSpec>,
  pub projections: Vec<Projection>,
  /// Canonical placeholder names: `:name` or `?N`.
  pub placeholders: Vec<String>,
  pub counts: AstCounts,
}

impl QueryAst {
  pub fn has_apply(&self) -> bool {
    self.apply.is_some()
  }

  pub fn has_projection(&self) -> bool {
    !self.projections.is_empty()
  }

  pub fn has_order_by(&self) -> bool {
    !self.order_by.is_empty()
  }
}
