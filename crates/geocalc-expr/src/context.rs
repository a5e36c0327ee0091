//! Compilation context: engine handle, reference resolver, and the pluggable
//! complex-function registry.
//!
//! A context is short-lived state created per compile call. Built-in
//! functions are registered at construction; callers may register more
//! without touching the compiler.

use std::collections::HashMap;
use std::sync::Arc;

use geocalc_core::{Error, GeoSource, Result};
use geocalc_engine::GridEngine;

use crate::compile::CompiledNode;
use crate::functions;

/// Turns bare names in expressions into data sources.
pub trait Resolver {
    fn resolve(&self, name: &str) -> Option<GeoSource>;
}

impl<F> Resolver for F
where
    F: Fn(&str) -> Option<GeoSource> + Send + Sync,
{
    fn resolve(&self, name: &str) -> Option<GeoSource> {
        self(name)
    }
}

/// Resolver over the engine's own registered sources.
pub struct EngineResolver<'a>(pub &'a dyn GridEngine);

impl Resolver for EngineResolver<'_> {
    fn resolve(&self, name: &str) -> Option<GeoSource> {
        self.0.resolve(name)
    }
}

/// A named complex function (slope, aspect, first, transform, ...). The
/// compiler hands it already-compiled argument nodes.
pub trait FunctionCompiler: Send + Sync {
    fn compile(&self, args: &[CompiledNode], ctx: &ExpressionContext) -> Result<CompiledNode>;
}

pub struct ExpressionContext<'a> {
    engine: &'a dyn GridEngine,
    resolver: &'a dyn Resolver,
    functions: HashMap<String, Arc<dyn FunctionCompiler>>,
}

impl<'a> ExpressionContext<'a> {
    pub fn new(engine: &'a dyn GridEngine, resolver: &'a dyn Resolver) -> Self {
        let mut context = Self {
            engine,
            resolver,
            functions: HashMap::new(),
        };
        functions::register_builtins(&mut context);
        context
    }

    pub fn engine(&self) -> &dyn GridEngine {
        self.engine
    }

    /// Register (or replace) a complex function. Names are case-insensitive.
    pub fn register(&mut self, name: &str, function: Arc<dyn FunctionCompiler>) {
        self.functions.insert(name.to_lowercase(), function);
    }

    pub fn function(&self, name: &str) -> Option<Arc<dyn FunctionCompiler>> {
        self.functions.get(&name.to_lowercase()).cloned()
    }

    pub(crate) fn resolve_reference(&self, name: &str) -> Result<GeoSource> {
        self.resolver
            .resolve(name)
            .ok_or_else(|| Error::UnresolvedReference(name.to_string()))
    }
}
