//! Match, mutate and project JSON documents with a compact query language.
//!
//! A query selects documents with path/value filters, optionally mutates
//! the matched document (JSON patch or merge-patch) and shapes the output
//! with projections:
//!
//! ```
//! use docql_core::Query;
//! use serde_json::json;
//!
//! # fn main() -> docql_core::Result<()> {
//! let mut q = Query::create("users", "/**/age > :min | /user/{name,age}")?;
//! q.set_i64("min", 18)?;
//!
//! assert!(q.matched(&json!({"user": {"name": "A", "age": 20}}))?);
//! assert!(!q.matched(&json!({"user": {"name": "B", "age": 17}}))?);
//! # Ok(())
//! # }
//! ```
//!
//! Evaluation walks each document exactly once, depth-first, deciding per
//! subtree whether any filter can still advance there. The engine is
//! per-query single-threaded; sharing of one query across concurrent
//! walkers is not supported — create one [`Query`] per evaluation stream.

pub mod ast;
pub mod error;
pub mod parse;
pub mod patch;
pub mod tree;
pub mod value;
pub mod walker;

mod match_doc;
mod matcher;
mod placeholder;
mod projection;
mod query;

pub use error::{Error, Result, MAX_ORDER_BY};
pub use placeholder::BindKey;
pub use query::Query;
pub use walker::VisitCmd;
