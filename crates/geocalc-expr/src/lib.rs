#![forbid(unsafe_code)]
//! geocalc-expr: the expression calculator pipeline.
//!
//! Three stages: tokenize (string → positioned tokens), parse (tokens → AST),
//! compile (AST → process graph + derived GeoSource). Reference resolution
//! and complex functions are pluggable; the parser itself never touches the
//! grid engine.

pub mod ast;
pub mod compile;
pub mod context;
pub mod functions;
pub mod parser;
pub mod token;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use compile::{Compiled, CompiledNode};
pub use context::{EngineResolver, ExpressionContext, FunctionCompiler, Resolver};
pub use parser::parse;
pub use token::tokenize;
