//! Handles to registered variables.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::graph::VariableId;

/// Unique identifier for a [`Registry`](crate::registry::Registry) instance.
///
/// Handles and bound evaluators carry the identifier of the registry that
/// produced them, so that they cannot be used against another registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegistryId(u64);

impl RegistryId {
    /// Generate a new unique registry ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Cheap, copyable reference to a variable owned by a registry.
///
/// A handle does not keep the variable alive; once the variable is removed,
/// operations through the handle fail with
/// [`FormulaError::UnknownReference`](crate::FormulaError::UnknownReference).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableHandle {
    registry: RegistryId,
    id: VariableId,
}

impl VariableHandle {
    pub(crate) fn new(registry: RegistryId, id: VariableId) -> Self {
        Self { registry, id }
    }

    pub fn registry(&self) -> RegistryId {
        self.registry
    }

    pub fn id(&self) -> VariableId {
        self.id
    }
}

impl fmt::Display for VariableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry.0, self.id)
    }
}

/// The three kinds of variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    /// A literal value, changed only through
    /// [`Registry::set_constant_value`](crate::registry::Registry::set_constant_value).
    Constant,

    /// Recomputed from its formula on every read.
    Delegate,

    /// Computed from its formula on first read, then cached until an
    /// upstream constant changes.
    Lazy,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant => write!(f, "constant"),
            Self::Delegate => write!(f, "delegate"),
            Self::Lazy => write!(f, "lazy"),
        }
    }
}
