//! Hand-written recursive-descent parser producing [`QueryAst`].
//!
//! Surface syntax, loosely:
//!
//! ```text
//! query       := '@' ident? expr clause*
//! expr        := unit (('and' | 'or') 'not'? unit)*
//! unit        := '(' expr ')' | filter
//! filter      := step+ (op rhs)?
//! step        := '/' (ident | string | integer | '*' | '**' | '[' nexprs ']')
//! nexprs      := nexpr (('and' | 'or') 'not'? nexpr)*
//! nexpr       := ('*' | ident | string | '[' '*' op rhs ']') op rhs
//! op          := 'not'? ('=' | '!=' | '>=' | '>' | '<=' | '<' | 're' | 'in' | 'ni')
//! rhs         := string | number | 'true' | 'false' | 'null' | json | ':'ident | '?'
//! clause      := '|' ('apply' json | 'skip' arg | 'limit' arg
//!                     | ('asc' | 'desc') path | projection)
//! projection  := ('-' | '+')? pitem (('+' | '-') pitem)*
//! pitem       := 'all' | ('/' pseg)+
//! pseg        := ident | string | integer | '*' | '{' field (',' field)* '}'
//! ```
//!
//! A trailing `op rhs` on a filter sugars the final field segment into an
//! `[field op rhs]` predicate step. Positional placeholders (`?`) are
//! numbered in order of appearance.

use crate::ast::{
  AstCounts, ExprChild, ExprItem, ExprLhs, ExprNode, Filter, Join, JoinOp,
  NodeExpr, OpKind, OpSite, OrderSpec, PathStep, ProjSeg, Projection,
  QueryAst, StepKind, Unit,
};
use crate::error::{Error, Result, MAX_ORDER_BY};

use serde_json::Value;

pub fn parse(src: &str) -> Result<QueryAst> {
  Parser::new(src).run()
}

struct Parser<'a> {
  src: &'a str,
  pos: usize,
  counts: AstCounts,
  placeholders: Vec<String>,
  positional: usize,
  collection: Option<String>,
  apply: Option<Value>,
  skip: Option<Unit>,
  limit: Option<Unit>,
  order_by: Vec<OrderSpec>,
  projections: Vec<Projection>,
}

impl<'a> Parser<'a> {
  fn new(src: &'a str) -> Self {
    Parser {
      src,
      pos: 0,
      counts: AstCounts::default(),
      placeholders: Vec::new(),
      positional: 0,
      collection: None,
      apply: None,
      skip: None,
      limit: None,
      order_by: Vec::new(),
      projections: Vec::new(),
    }
  }

  fn run(mut self) -> Result<QueryAst> {
    self.skip_ws();
    if self.eat('@') {
      let coll = self
        .read_ident()
        .ok_or_else(|| self.err("expected collection name after `@`"))?;
      self.collection = Some(coll);
    }
    let expr = self.parse_expr_node()?;
    self.skip_ws();
    while self.eat('|') {
      self.parse_clause()?;
      self.skip_ws();
    }
    if self.pos < self.src.len() {
      return Err(self.err("unexpected trailing input"));
    }
    Ok(QueryAst {
      collection: self.collection,
      expr,
      apply: self.apply,
      skip: self.skip,
      limit: self.limit,
      order_by: self.order_by,
      projections: self.projections,
      placeholders: self.placeholders,
      counts: self.counts,
    })
  }

  // ---- expressions over filters

  fn parse_expr_node(&mut self) -> Result<ExprNode> {
    let id = self.counts.expr_nodes;
    self.counts.expr_nodes += 1;
    let mut chain = vec![ExprChild {
      join: None,
      item: self.parse_unit()?,
    }];
    loop {
      let Some(op) = self.try_join_op() else {
        break;
      };
      let negate = self.try_keyword("not");
      chain.push(ExprChild {
        join: Some(Join { op, negate }),
        item: self.parse_unit()?,
      });
    }
    Ok(ExprNode { id, chain })
  }

  fn try_join_op(&mut self) -> Option<JoinOp> {
    if self.try_keyword("and") {
      Some(JoinOp::And)
    } else if self.try_keyword("or") {
      Some(JoinOp::Or)
    } else {
      None
    }
  }

  fn parse_unit(&mut self) -> Result<ExprItem> {
    self.skip_ws();
    if self.eat('(') {
      let sub = self.parse_expr_node()?;
      self.skip_ws();
      if !self.eat(')') {
        return Err(self.err("expected `)`"));
      }
      return Ok(ExprItem::Expr(sub));
    }
    Ok(ExprItem::Filter(self.parse_filter()?))
  }

  fn parse_filter(&mut self) -> Result<Filter> {
    let id = self.counts.filters;
    self.counts.filters += 1;
    let mut steps = Vec::new();
    self.skip_ws();
    while self.eat('/') {
      steps.push(self.parse_step()?);
      self.skip_ws();
    }
    if steps.is_empty() {
      return Err(self.err("expected a `/` path"));
    }
    if let Some(op) = self.try_op()? {
      let rhs = self.parse_rhs()?;
      if let Some(last) = steps.last_mut() {
        let StepKind::Field(name) = &last.kind else {
          return Err(self.err("trailing operator requires a field path segment"));
        };
        let name = name.clone();
        last.kind = StepKind::Expr(vec![NodeExpr {
          join: None,
          lhs: ExprLhs::Field(name),
          op,
          rhs,
        }]);
      }
    }
    Ok(Filter { id, steps })
  }

  fn parse_step(&mut self) -> Result<PathStep> {
    let id = self.counts.path_steps;
    self.counts.path_steps += 1;
    let kind = if self.eat('*') {
      if self.eat('*') {
        StepKind::AnyDescent
      } else {
        StepKind::Any
      }
    } else if self.eat('[') {
      let exprs = self.parse_node_exprs()?;
      if !self.eat(']') {
        return Err(self.err("expected `]`"));
      }
      StepKind::Expr(exprs)
    } else {
      StepKind::Field(self.read_segment()?)
    };
    Ok(PathStep { id, kind })
  }

  fn parse_node_exprs(&mut self) -> Result<Vec<NodeExpr>> {
    let mut exprs = vec![self.parse_node_expr(None)?];
    loop {
      let Some(op) = self.try_join_op() else {
        break;
      };
      let negate = self.try_keyword("not");
      exprs.push(self.parse_node_expr(Some(Join { op, negate }))?);
    }
    Ok(exprs)
  }

  fn parse_node_expr(&mut self, join: Option<Join>) -> Result<NodeExpr> {
    self.skip_ws();
    let lhs = if self.eat('*') {
      ExprLhs::Key
    } else if self.eat('[') {
      self.skip_ws();
      if !self.eat('*') {
        return Err(self.err("expected `*` in key sub-expression"));
      }
      let op = self
        .try_op()?
        .ok_or_else(|| self.err("expected operator in key sub-expression"))?;
      let rhs = self.parse_rhs()?;
      self.skip_ws();
      if !self.eat(']') {
        return Err(self.err("expected `]`"));
      }
      ExprLhs::KeyExpr { op, rhs }
    } else {
      ExprLhs::Field(self.read_segment()?)
    };
    let op = self
      .try_op()?
      .ok_or_else(|| self.err("expected operator"))?;
    let rhs = self.parse_rhs()?;
    Ok(NodeExpr { join, lhs, op, rhs })
  }

  fn try_op(&mut self) -> Result<Option<OpSite>> {
    self.skip_ws();
    let mut negate = self.try_keyword("not");
    let op = if self.eat_str(">=") {
      OpKind::Gte
    } else if self.eat('>') {
      OpKind::Gt
    } else if self.eat_str("<=") {
      OpKind::Lte
    } else if self.eat('<') {
      OpKind::Lt
    } else if self.eat_str("!=") {
      negate = !negate;
      OpKind::Eq
    } else if self.eat('=') {
      OpKind::Eq
    } else if self.try_keyword("re") {
      OpKind::Re
    } else if self.try_keyword("in") {
      OpKind::In
    } else if self.try_keyword("ni") {
      OpKind::Ni
    } else if negate {
      return Err(self.err("expected operator after `not`"));
    } else {
      return Ok(None);
    };
    let id = self.counts.ops;
    self.counts.ops += 1;
    Ok(Some(OpSite { id, op, negate }))
  }

  fn parse_rhs(&mut self) -> Result<Unit> {
    self.skip_ws();
    match self.peek() {
      Some('"') => Ok(Unit::Str(self.read_string()?)),
      Some(':') => {
        self.bump();
        let name = self
          .read_ident()
          .ok_or_else(|| self.err("expected placeholder name after `:`"))?;
        Ok(Unit::Placeholder(self.intern_placeholder(format!(":{name}"))))
      }
      Some('?') => {
        self.bump();
        let n = self.positional;
        self.positional += 1;
        Ok(Unit::Placeholder(self.intern_placeholder(format!("?{n}"))))
      }
      Some('[') | Some('{') => Ok(Unit::Json(self.scan_json()?)),
      Some(c) if c == '-' || c.is_ascii_digit() => self.read_number(),
      _ => {
        if self.try_keyword("true") {
          Ok(Unit::Bool(true))
        } else if self.try_keyword("false") {
          Ok(Unit::Bool(false))
        } else if self.try_keyword("null") {
          Ok(Unit::Null)
        } else {
          Err(self.err("expected operand"))
        }
      }
    }
  }

  // ---- clauses

  fn parse_clause(&mut self) -> Result<()> {
    self.skip_ws();
    if self.try_keyword("apply") {
      if self.apply.is_some() {
        return Err(self.err("apply clause already specified"));
      }
      self.apply = Some(self.scan_json()?);
      Ok(())
    } else if self.try_keyword("skip") {
      if self.skip.is_some() {
        return Err(Error::SkipAlreadySet);
      }
      self.skip = Some(self.parse_paging_arg()?);
      Ok(())
    } else if self.try_keyword("limit") {
      if self.limit.is_some() {
        return Err(Error::LimitAlreadySet);
      }
      self.limit = Some(self.parse_paging_arg()?);
      Ok(())
    } else if self.try_keyword("asc") {
      self.parse_order(false)
    } else if self.try_keyword("desc") {
      self.parse_order(true)
    } else {
      self.parse_projection_clause()
    }
  }

  fn parse_paging_arg(&mut self) -> Result<Unit> {
    self.skip_ws();
    match self.peek() {
      Some(':') | Some('?') => self.parse_rhs(),
      Some(c) if c == '-' || c.is_ascii_digit() => self.read_number(),
      _ => Err(self.err("expected number or placeholder")),
    }
  }

  fn parse_order(&mut self, desc: bool) -> Result<()> {
    let mut path = Vec::new();
    self.skip_ws();
    while self.eat('/') {
      path.push(self.read_segment()?);
      self.skip_ws();
    }
    if path.is_empty() {
      return Err(self.err("expected a `/` path after asc/desc"));
    }
    if self.order_by.len() >= MAX_ORDER_BY {
      return Err(Error::OrderByMaxLimit);
    }
    self.order_by.push(OrderSpec { desc, path });
    Ok(())
  }

  fn parse_projection_clause(&mut self) -> Result<()> {
    let mut exclude = false;
    self.skip_ws();
    if self.eat('-') {
      exclude = true;
    } else {
      self.eat('+');
    }
    loop {
      let item = self.parse_projection_item(exclude)?;
      self.projections.push(item);
      self.skip_ws();
      if self.eat('+') {
        exclude = false;
      } else if self.eat('-') {
        exclude = true;
      } else {
        break;
      }
    }
    Ok(())
  }

  fn parse_projection_item(&mut self, exclude: bool) -> Result<Projection> {
    self.skip_ws();
    if self.try_keyword("all") {
      return Ok(Projection {
        exclude,
        all: true,
        segments: Vec::new(),
      });
    }
    let mut segments = Vec::new();
    while self.eat('/') {
      segments.push(self.parse_projection_segment()?);
      self.skip_ws();
    }
    if segments.is_empty() {
      return Err(self.err("expected projection path or `all`"));
    }
    Ok(Projection {
      exclude,
      all: false,
      segments,
    })
  }

  fn parse_projection_segment(&mut self) -> Result<ProjSeg> {
    self.skip_ws();
    if self.eat('*') {
      return Ok(ProjSeg::Any);
    }
    if self.eat('{') {
      let mut fields = Vec::new();
      loop {
        self.skip_ws();
        fields.push(self.read_segment()?);
        self.skip_ws();
        if self.eat(',') {
          continue;
        }
        if self.eat('}') {
          break;
        }
        return Err(self.err("expected `,` or `}`"));
      }
      return Ok(ProjSeg::Alternation(fields));
    }
    Ok(ProjSeg::Field(self.read_segment()?))
  }

  // ---- lexing helpers

  fn err(&self, message: &str) -> Error {
    Error::QueryParse {
      offset: self.pos,
      message: message.into(),
    }
  }

  fn peek(&self) -> Option<char> {
    self.src[self.pos..].chars().next()
  }

  fn bump(&mut self) {
    if let Some(c) = self.peek() {
      self.pos += c.len_utf8();
    }
  }

  fn eat(&mut self, c: char) -> bool {
    if self.peek() == Some(c) {
      self.bump();
      true
    } else {
      false
    }
  }

  fn eat_str(&mut self, s: &str) -> bool {
    if self.src[self.pos..].starts_with(s) {
      self.pos += s.len();
      true
    } else {
      false
    }
  }

  fn skip_ws(&mut self) {
    while matches!(self.peek(), Some(c) if c.is_whitespace()) {
      self.bump();
    }
  }

  /// Consumes `kw` only when it appears as a whole word.
  fn try_keyword(&mut self, kw: &str) -> bool {
    let save = self.pos;
    self.skip_ws();
    let rest = &self.src[self.pos..];
    if rest.starts_with(kw) {
      let after = rest[kw.len()..].chars().next();
      if !matches!(after, Some(c) if c.is_ascii_alphanumeric() || c == '_') {
        self.pos += kw.len();
        return true;
      }
    }
    self.pos = save;
    false
  }

  fn read_ident(&mut self) -> Option<String> {
    let start = self.pos;
    match self.peek() {
      Some(c) if c.is_ascii_alphabetic() || c == '_' => self.bump(),
      _ => return None,
    }
    while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_')
    {
      self.bump();
    }
    Some(self.src[start..self.pos].to_string())
  }

  /// A path segment: bare identifier, digits (array index) or a quoted
  /// string.
  fn read_segment(&mut self) -> Result<String> {
    self.skip_ws();
    if self.peek() == Some('"') {
      return self.read_string();
    }
    if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
      let start = self.pos;
      while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
        self.bump();
      }
      return Ok(self.src[start..self.pos].to_string());
    }
    self
      .read_ident()
      .ok_or_else(|| self.err("expected path segment"))
  }

  fn read_string(&mut self) -> Result<String> {
    if !self.eat('"') {
      return Err(self.err("expected string"));
    }
    let mut out = String::new();
    loop {
      let Some(c) = self.peek() else {
        return Err(self.err("unterminated string"));
      };
      self.bump();
      match c {
        '"' => return Ok(out),
        '\\' => {
          let Some(esc) = self.peek() else {
            return Err(self.err("unterminated escape"));
          };
          self.bump();
          match esc {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            '/' => out.push('/'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000c}'),
            'u' => out.push(self.read_unicode_escape()?),
            _ => return Err(self.err("unknown escape")),
          }
        }
        other => out.push(other),
      }
    }
  }

  fn read_unicode_escape(&mut self) -> Result<char> {
    let first = self.read_hex4()?;
    let code = if (0xd800..0xdc00).contains(&first) {
      // surrogate pair
      if !(self.eat('\\') && self.eat('u')) {
        return Err(self.err("expected low surrogate"));
      }
      let low = self.read_hex4()?;
      if !(0xdc00..0xe000).contains(&low) {
        return Err(self.err("invalid low surrogate"));
      }
      0x10000 + ((first - 0xd800) << 10) + (low - 0xdc00)
    } else {
      first
    };
    char::from_u32(code).ok_or_else(|| self.err("invalid unicode escape"))
  }

  fn read_hex4(&mut self) -> Result<u32> {
    let mut v = 0u32;
    for _ in 0..4 {
      let Some(d) = self.peek().and_then(|c| c.to_digit(16)) else {
        return Err(self.err("expected 4 hex digits"));
      };
      self.bump();
      v = (v << 4) | d;
    }
    Ok(v)
  }

  fn read_number(&mut self) -> Result<Unit> {
    let start = self.pos;
    self.eat('-');
    while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
      self.bump();
    }
    let mut float = false;
    if self.peek() == Some('.') {
      float = true;
      self.bump();
      while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
        self.bump();
      }
    }
    if matches!(self.peek(), Some('e') | Some('E')) {
      float = true;
      self.bump();
      if matches!(self.peek(), Some('+') | Some('-')) {
        self.bump();
      }
      while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
        self.bump();
      }
    }
    let text = &self.src[start..self.pos];
    if !float {
      if let Ok(i) = text.parse::<i64>() {
        return Ok(Unit::I64(i));
      }
    }
    text
      .parse::<f64>()
      .map(Unit::F64)
      .map_err(|_| self.err("invalid number"))
  }

  fn intern_placeholder(&mut self, canonical: String) -> usize {
    if let Some(idx) = self.placeholders.iter().position(|p| *p == canonical) {
      return idx;
    }
    self.placeholders.push(canonical);
    self.placeholders.len() - 1
  }

  /// Scans one balanced JSON object or array and hands it to serde_json.
  fn scan_json(&mut self) -> Result<Value> {
    self.skip_ws();
    let start = self.pos;
    let bytes = self.src.as_bytes();
    if !matches!(bytes.get(start), Some(&b'{') | Some(&b'[')) {
      return Err(self.err("expected json literal"));
    }
    let mut depth = 0usize;
    let mut in_str = false;
    let mut escaped = false;
    let mut i = start;
    while i < bytes.len() {
      let b = bytes[i];
      if in_str {
        if escaped {
          escaped = false;
        } else if b == b'\\' {
          escaped = true;
        } else if b == b'"' {
          in_str = false;
        }
      } else {
        match b {
          b'"' => in_str = true,
          b'{' | b'[' => depth += 1,
          b'}' | b']' => {
            depth -= 1;
            if depth == 0 {
              i += 1;
              break;
            }
          }
          _ => {}
        }
      }
      i += 1;
    }
    if depth != 0 || in_str {
      return Err(self.err("unterminated json literal"));
    }
    let value = serde_json::from_str(&self.src[start..i]).map_err(|e| Error::QueryParse {
      offset: start,
      message: format!("invalid json literal: {e}"),
    })?;
    self.pos = i;
    Ok(value)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn filters(ast: &QueryAst) -> Vec<&Filter> {
    ast
      .expr
      .chain
      .iter()
      .filter_map(|c| match &c.item {
        ExprItem::Filter(f) => Some(f),
        ExprItem::Expr(_) => None,
      })
      .collect()
  }

  #[test]
  fn test_parse_trivial_wildcard() {
    let ast = parse("/*").unwrap();
    let fs = filters(&ast);
    assert_eq!(fs.len(), 1);
    assert!(matches!(fs[0].steps[0].kind, StepKind::Any));
    let ast = parse("/**").unwrap();
    assert!(matches!(filters(&ast)[0].steps[0].kind, StepKind::AnyDescent));
  }

  #[test]
  fn test_trailing_op_sugars_last_field() {
    let ast = parse("/user/age > 18").unwrap();
    let fs = filters(&ast);
    assert_eq!(fs[0].steps.len(), 2);
    assert!(matches!(fs[0].steps[0].kind, StepKind::Field(ref f) if f == "user"));
    let StepKind::Expr(exprs) = &fs[0].steps[1].kind else {
      panic!("expected predicate step");
    };
    assert!(matches!(exprs[0].lhs, ExprLhs::Field(ref f) if f == "age"));
    assert_eq!(exprs[0].op.op, OpKind::Gt);
    assert!(matches!(exprs[0].rhs, Unit::I64(18)));
  }

  #[test]
  fn test_trailing_op_requires_field() {
    let err = parse("/* = 1").unwrap_err();
    assert_eq!(err.code(), "QueryParse");
  }

  #[test]
  fn test_placeholders_are_interned() {
    let ast = parse("/a = :n or /b = :n and /c = ?").unwrap();
    assert_eq!(ast.placeholders, vec![":n".to_string(), "?0".to_string()]);
  }

  #[test]
  fn test_expr_step_with_joins() {
    let ast = parse("/[age > 18 and name = \"Bob\"]").unwrap();
    let fs = filters(&ast);
    let StepKind::Expr(exprs) = &fs[0].steps[0].kind else {
      panic!("expected predicate step");
    };
    assert_eq!(exprs.len(), 2);
    assert!(exprs[0].join.is_none());
    assert_eq!(
      exprs[1].join,
      Some(Join {
        op: JoinOp::And,
        negate: false
      })
    );
  }

  #[test]
  fn test_key_expressions() {
    let ast = parse("/[* = \"k\"]").unwrap();
    let StepKind::Expr(exprs) = &filters(&ast)[0].steps[0].kind else {
      panic!();
    };
    assert!(matches!(exprs[0].lhs, ExprLhs::Key));

    let ast = parse("/[[* = \"k\"] > 3]").unwrap();
    let StepKind::Expr(exprs) = &filters(&ast)[0].steps[0].kind else {
      panic!();
    };
    assert!(matches!(exprs[0].lhs, ExprLhs::KeyExpr { .. }));
    assert_eq!(exprs[0].op.op, OpKind::Gt);
  }

  #[test]
  fn test_not_in_sets_negate() {
    let ast = parse("/tag not in [\"a\"]").unwrap();
    let StepKind::Expr(exprs) = &filters(&ast)[0].steps[0].kind else {
      panic!();
    };
    assert_eq!(exprs[0].op.op, OpKind::In);
    assert!(exprs[0].op.negate);
    let ast = parse("/n != 4").unwrap();
    let StepKind::Expr(exprs) = &filters(&ast)[0].steps[0].kind else {
      panic!();
    };
    assert_eq!(exprs[0].op.op, OpKind::Eq);
    assert!(exprs[0].op.negate);
  }

  #[test]
  fn test_filter_joins_and_parens() {
    let ast = parse("/a = 1 and not (/b = 2 or /c = 3)").unwrap();
    assert_eq!(ast.expr.chain.len(), 2);
    let second = &ast.expr.chain[1];
    assert_eq!(
      second.join,
      Some(Join {
        op: JoinOp::And,
        negate: true
      })
    );
    assert!(matches!(second.item, ExprItem::Expr(_)));
    assert_eq!(ast.counts.expr_nodes, 2);
    assert_eq!(ast.counts.filters, 3);
  }

  #[test]
  fn test_collection_prefix() {
    let ast = parse("@users/name = \"A\"").unwrap();
    assert_eq!(ast.collection.as_deref(), Some("users"));
  }

  #[test]
  fn test_clauses() {
    let ast = parse("/* | skip 4 | limit :l | asc /age | desc /name").unwrap();
    assert!(matches!(ast.skip, Some(Unit::I64(4))));
    assert!(matches!(ast.limit, Some(Unit::Placeholder(_))));
    assert_eq!(ast.order_by.len(), 2);
    assert!(ast.order_by[1].desc);
    assert!(ast.has_order_by());
  }

  #[test]
  fn test_duplicate_paging_clauses() {
    assert_eq!(parse("/* | skip 1 | skip 2").unwrap_err().code(), "SkipAlreadySet");
    assert_eq!(
      parse("/* | limit 1 | limit 2").unwrap_err().code(),
      "LimitAlreadySet"
    );
  }

  #[test]
  fn test_order_by_cap() {
    let mut q = String::from("/*");
    for i in 0..MAX_ORDER_BY + 1 {
      q.push_str(&format!(" | asc /f{i}"));
    }
    assert_eq!(parse(&q).unwrap_err().code(), "OrderbyMaxLimit");
  }

  #[test]
  fn test_apply_clause() {
    let ast = parse(r#"/* | apply [{"op":"add","path":"/x","value":1}]"#).unwrap();
    assert!(ast.has_apply());
    assert!(ast.apply.as_ref().unwrap().is_array());
  }

  #[test]
  fn test_projection_clause() {
    let ast = parse("/* | /user/{name, age} - /user/pwd + all").unwrap();
    assert_eq!(ast.projections.len(), 3);
    assert!(!ast.projections[0].exclude);
    assert!(matches!(
      ast.projections[0].segments[1],
      ProjSeg::Alternation(ref v) if v == &["name".to_string(), "age".to_string()]
    ));
    assert!(ast.projections[1].exclude);
    assert!(ast.projections[2].all);
    let ast = parse("/* | -/user/pwd").unwrap();
    assert!(ast.projections[0].exclude);
    let ast = parse("/* | - all").unwrap();
    assert!(ast.projections[0].all && ast.projections[0].exclude);
  }

  #[test]
  fn test_json_rhs() {
    let ast = parse(r#"/tag in ["a", "b"]"#).unwrap();
    let StepKind::Expr(exprs) = &filters(&ast)[0].steps[0].kind else {
      panic!();
    };
    assert_eq!(exprs[0].op.op, OpKind::In);
    assert!(matches!(exprs[0].rhs, Unit::Json(ref v) if v.is_array()));
  }

  #[test]
  fn test_parse_error_offset() {
    let Error::QueryParse { offset, .. } = parse("/a = ").unwrap_err() else {
      panic!("expected parse error");
    };
    assert_eq!(offset, 5);
  }

  #[test]
  fn test_string_escapes() {
    let ast = parse(r#"/name = "a\"b\nA""#).unwrap();
    let StepKind::Expr(exprs) = &filters(&ast)[0].steps[0].kind else {
      panic!();
    };
    assert!(matches!(exprs[0].rhs, Unit::Str(ref s) if s == "a\"b\nA"));
  }
}
