//! Variables
//!
//! A variable is a named value of one of three kinds:
//!
//! - **Constant**: holds a literal. It has no references and only the
//!   registry can change it, so every change goes through invalidation.
//! - **Delegate**: wraps a bound evaluator and recomputes on every read.
//!   Always consistent, never cached.
//! - **Lazy**: wraps a bound evaluator plus a cache. The first read computes
//!   and stores the value; later reads return it until the registry marks
//!   the cache stale.
//!
//! Name, kind and references are fixed at creation. Only the value of a
//! constant and the contents of a lazy cache ever change.

mod cache;
mod handle;

pub use cache::CacheState;
pub use handle::{RegistryId, VariableHandle, VariableKind};

pub(crate) use cache::LazyCache;

use crate::compiler::BoundEvaluator;
use crate::graph::VariableId;

pub(crate) enum Body {
    Constant(f64),
    Delegate(BoundEvaluator),
    Lazy {
        evaluator: BoundEvaluator,
        cache: LazyCache,
    },
}

/// A variable as stored in the registry arena.
pub(crate) struct Variable {
    name: String,
    body: Body,
}

impl Variable {
    pub fn constant(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            body: Body::Constant(value),
        }
    }

    pub fn delegate(name: impl Into<String>, evaluator: BoundEvaluator) -> Self {
        Self {
            name: name.into(),
            body: Body::Delegate(evaluator),
        }
    }

    pub fn lazy(name: impl Into<String>, evaluator: BoundEvaluator) -> Self {
        Self {
            name: name.into(),
            body: Body::Lazy {
                evaluator,
                cache: LazyCache::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        match self.body {
            Body::Constant(_) => VariableKind::Constant,
            Body::Delegate(_) => VariableKind::Delegate,
            Body::Lazy { .. } => VariableKind::Lazy,
        }
    }

    pub fn evaluator(&self) -> Option<&BoundEvaluator> {
        match &self.body {
            Body::Constant(_) => None,
            Body::Delegate(evaluator) | Body::Lazy { evaluator, .. } => Some(evaluator),
        }
    }

    /// Direct references, in the order the formula first mentions them.
    pub fn references(&self) -> &[VariableId] {
        self.evaluator()
            .map(BoundEvaluator::reference_ids)
            .unwrap_or(&[])
    }

    /// The value if it is available without evaluating anything: the
    /// literal of a constant or the fresh cache of a lazy variable.
    pub fn ready_value(&self) -> Option<f64> {
        match &self.body {
            Body::Constant(value) => Some(*value),
            Body::Delegate(_) => None,
            Body::Lazy { cache, .. } => cache.get(),
        }
    }

    /// Record a freshly computed value. Only lazy variables keep it.
    pub fn computed(&self, value: f64) {
        if let Body::Lazy { cache, .. } = &self.body {
            cache.store(value);
        }
    }

    /// Mark a lazy cache stale. Returns whether a fresh value was dropped.
    pub fn invalidate(&self) -> bool {
        match &self.body {
            Body::Lazy { cache, .. } => cache.invalidate(),
            _ => false,
        }
    }

    pub fn cache_state(&self) -> Option<CacheState> {
        match &self.body {
            Body::Lazy { cache, .. } => Some(cache.state()),
            _ => None,
        }
    }

    /// Overwrite the literal of a constant. Returns `false` for other kinds.
    pub fn set_constant(&mut self, value: f64) -> bool {
        match &mut self.body {
            Body::Constant(current) => {
                *current = value;
                true
            }
            _ => false,
        }
    }
}
