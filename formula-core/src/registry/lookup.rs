//! Lookup View
//!
//! A [`Lookup`] holds the registry's read lock for as long as it lives, so
//! any number of queries made through it observe one consistent graph.
//! Mutations wait until every lookup is dropped.
//!
//! Returned sets carry no contractual order. Callers that need stable
//! output sort them, e.g. with [`Lookup::sorted_names`].

use indexmap::IndexSet;
use parking_lot::RwLockReadGuard;

use super::eval::Evaluation;
use super::snapshot::{Snapshot, VariableSnapshot};
use super::RegistryState;
use crate::compiler::BoundEvaluator;
use crate::error::Result;
use crate::graph::{Direction, VariableId};
use crate::variable::{CacheState, VariableHandle, VariableKind};

/// How far a reference query reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Only direct neighbours.
    Explicit,
    /// The full transitive closure, excluding the variable itself.
    All,
}

/// Read-only view of a registry.
pub struct Lookup<'a> {
    state: RwLockReadGuard<'a, RegistryState>,
}

impl<'a> Lookup<'a> {
    pub(super) fn new(state: RwLockReadGuard<'a, RegistryState>) -> Self {
        Self { state }
    }

    fn handle(&self, id: VariableId) -> VariableHandle {
        VariableHandle::new(self.state.id, id)
    }

    /// Find a variable by name. A missing name is not an error.
    pub fn get(&self, name: &str) -> Option<VariableHandle> {
        self.state.names.get(name).map(|&id| self.handle(id))
    }

    pub fn len(&self) -> usize {
        self.state.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.names.is_empty()
    }

    /// All variables in registration order.
    pub fn handles(&self) -> Vec<VariableHandle> {
        self.state
            .names
            .values()
            .map(|&id| self.handle(id))
            .collect()
    }

    pub fn name(&self, handle: VariableHandle) -> Result<&str> {
        let id = self.state.resolve(handle)?;
        Ok(self.state.name_of(id))
    }

    pub fn kind(&self, handle: VariableHandle) -> Result<VariableKind> {
        let id = self.state.resolve(handle)?;
        Ok(self.state.expect_variable(id)?.kind())
    }

    /// Cache state of a lazy variable; `None` for the other kinds.
    pub fn cache_state(&self, handle: VariableHandle) -> Result<Option<CacheState>> {
        let id = self.state.resolve(handle)?;
        Ok(self.state.expect_variable(id)?.cache_state())
    }

    /// The bound evaluator of a delegate or lazy variable.
    pub fn evaluator(&self, handle: VariableHandle) -> Result<Option<BoundEvaluator>> {
        let id = self.state.resolve(handle)?;
        Ok(self.state.expect_variable(id)?.evaluator().cloned())
    }

    /// Current value of a variable.
    ///
    /// Constants return their literal, delegates recompute, lazy variables
    /// return their cache or compute and fill it.
    pub fn value(&self, handle: VariableHandle) -> Result<f64> {
        let id = self.state.resolve(handle)?;
        Evaluation::new(&self.state).value_of(id)
    }

    /// Variables that `handle` reads.
    pub fn references(&self, handle: VariableHandle, mode: Mode) -> Result<IndexSet<VariableHandle>> {
        self.neighbourhood(handle, mode, Direction::References)
    }

    /// Variables that read `handle`.
    pub fn referencing(&self, handle: VariableHandle, mode: Mode) -> Result<IndexSet<VariableHandle>> {
        self.neighbourhood(handle, mode, Direction::Referencing)
    }

    fn neighbourhood(
        &self,
        handle: VariableHandle,
        mode: Mode,
        direction: Direction,
    ) -> Result<IndexSet<VariableHandle>> {
        let id = self.state.resolve(handle)?;
        let graph = &self.state.graph;
        let ids: IndexSet<VariableId> = match mode {
            Mode::Explicit => graph.neighbours(id, direction).iter().copied().collect(),
            Mode::All => graph.walk(id, direction),
        };
        Ok(ids.into_iter().map(|id| self.handle(id)).collect())
    }

    /// Every variable, each after all the variables it reads.
    pub fn evaluation_order(&self) -> Vec<VariableHandle> {
        self.state
            .graph
            .topological_order()
            .into_iter()
            .map(|id| self.handle(id))
            .collect()
    }

    /// Names of `handles`, sorted.
    pub fn sorted_names<I>(&self, handles: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = VariableHandle>,
    {
        let mut names = handles
            .into_iter()
            .map(|handle| self.name(handle).map(str::to_string))
            .collect::<Result<Vec<_>>>()?;
        names.sort();
        Ok(names)
    }

    /// Evaluate every variable in evaluation order.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let mut evaluation = Evaluation::new(&self.state);
        let mut variables = Vec::with_capacity(self.len());

        for id in self.state.graph.topological_order() {
            let variable = self.state.expect_variable(id)?;
            let value = evaluation.value_of(id)?;
            let mut references: Vec<String> = variable
                .references()
                .iter()
                .map(|&dep| self.state.name_of(dep).to_string())
                .collect();
            references.sort();

            variables.push(VariableSnapshot {
                name: variable.name().to_string(),
                kind: variable.kind(),
                value,
                references,
            });
        }

        Ok(Snapshot { variables })
    }
}
