//! Bound Evaluator
//!
//! The output of compilation: a lowered [`Program`] plus the identities of
//! the variables its input slots read. Values are never captured, only
//! identities, so each evaluation sees the current upstream values.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::ir::Program;
use crate::graph::VariableId;
use crate::variable::{RegistryId, VariableHandle};

struct Inner {
    registry: RegistryId,
    expression: String,
    references: SmallVec<[VariableId; 4]>,
    names: IndexSet<String>,
    program: Program,
}

/// A compiled formula closed over the variables it references.
///
/// Cloning is cheap; clones share the compiled program.
#[derive(Clone)]
pub struct BoundEvaluator {
    inner: Arc<Inner>,
}

impl BoundEvaluator {
    pub(crate) fn new(
        registry: RegistryId,
        expression: impl Into<String>,
        references: SmallVec<[VariableId; 4]>,
        names: IndexSet<String>,
        program: Program,
    ) -> Self {
        debug_assert_eq!(references.len(), names.len());
        debug_assert_eq!(references.len(), program.num_inputs());
        Self {
            inner: Arc::new(Inner {
                registry,
                expression: expression.into(),
                references,
                names,
                program,
            }),
        }
    }

    /// The registry the formula was compiled against.
    pub fn registry(&self) -> RegistryId {
        self.inner.registry
    }

    /// The source text.
    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    /// Names of the referenced variables, in order of first appearance.
    pub fn reference_names(&self) -> &IndexSet<String> {
        &self.inner.names
    }

    /// Handles of the referenced variables, parallel to
    /// [`reference_names`](Self::reference_names).
    pub fn references(&self) -> impl Iterator<Item = VariableHandle> + '_ {
        let registry = self.inner.registry;
        self.inner
            .references
            .iter()
            .map(move |&id| VariableHandle::new(registry, id))
    }

    pub(crate) fn reference_ids(&self) -> &[VariableId] {
        &self.inner.references
    }

    pub fn program(&self) -> &Program {
        &self.inner.program
    }

    /// Compute the result from the current values of the references, given
    /// in the same order as [`references`](Self::references).
    pub fn evaluate(&self, inputs: &[f64]) -> f64 {
        self.inner.program.run(inputs)
    }
}

impl fmt::Debug for BoundEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundEvaluator")
            .field("expression", &self.inner.expression)
            .field("references", &self.inner.names)
            .field("ops", &self.inner.program.ops().len())
            .finish()
    }
}
