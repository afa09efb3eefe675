//! Variable Registry
//!
//! The registry owns every variable and the dependency graph between them.
//! It is the only place variables are created, removed or assigned.
//!
//! # How It Works
//!
//! 1. Formulas are compiled against the registry, which resolves their
//!    identifiers to existing variables.
//!
//! 2. Registering a variable validates it, pushes it into the arena and
//!    wires its graph edges in one step under the write lock. On any error
//!    nothing is changed.
//!
//! 3. Reads evaluate on demand. Delegates recompute every time; lazy
//!    variables fill their cache on first read.
//!
//! 4. [`Registry::set_constant_value`] assigns a constant and, before
//!    releasing the write lock, marks every lazy variable downstream of it
//!    stale.
//!
//! # Thread Safety
//!
//! Single writer, many readers. One `RwLock` guards the whole registry:
//! registration, removal and assignment take it exclusively for their full
//! duration, including the invalidation sweep, so no reader ever observes a
//! half-invalidated graph. Reads and lookup queries share it.

mod eval;
mod lookup;
mod snapshot;

pub use lookup::{Lookup, Mode};
pub use snapshot::{Snapshot, VariableSnapshot};

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use tracing::debug;

use crate::compiler::{compile, BoundEvaluator};
use crate::error::{FormulaError, Result};
use crate::graph::{DependencyGraph, Direction, VariableId};
use crate::variable::{CacheState, RegistryId, Variable, VariableHandle, VariableKind};

/// State guarded by the registry lock.
pub(crate) struct RegistryState {
    id: RegistryId,
    /// Arena indexed by [`VariableId`]; removed variables leave `None`.
    variables: Vec<Option<Variable>>,
    /// Live names in registration order.
    names: IndexMap<String, VariableId>,
    graph: DependencyGraph,
}

impl RegistryState {
    fn new(id: RegistryId) -> Self {
        Self {
            id,
            variables: Vec::new(),
            names: IndexMap::new(),
            graph: DependencyGraph::new(),
        }
    }

    pub(crate) fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id.index()).and_then(Option::as_ref)
    }

    fn expect_variable(&self, id: VariableId) -> Result<&Variable> {
        self.variable(id).ok_or_else(|| {
            FormulaError::UnknownReference(format!("variable {id} no longer exists"))
        })
    }

    fn name_of(&self, id: VariableId) -> &str {
        self.variable(id).map(Variable::name).unwrap_or("<removed>")
    }

    /// Check that `handle` was issued here and still names a variable.
    fn resolve(&self, handle: VariableHandle) -> Result<VariableId> {
        if handle.registry() != self.id {
            return Err(FormulaError::ForeignVariable);
        }
        let id = handle.id();
        self.expect_variable(id)?;
        Ok(id)
    }

    /// Validate a variable for insertion without changing anything.
    fn check_insert(&self, variable: &Variable) -> Result<()> {
        if let Some(evaluator) = variable.evaluator() {
            if evaluator.registry() != self.id {
                return Err(FormulaError::UnknownReference(format!(
                    "'{}' was compiled against a different registry",
                    evaluator.expression()
                )));
            }
            for (dep, name) in evaluator
                .reference_ids()
                .iter()
                .zip(evaluator.reference_names())
            {
                if !self.graph.contains(*dep) {
                    return Err(FormulaError::UnknownReference(format!(
                        "'{name}' no longer exists"
                    )));
                }
            }
        }

        let name = variable.name();
        if let Some(&existing) = self.names.get(name) {
            if let Some(path) = self.graph.find_path(variable.references(), existing) {
                let mut names = vec![name.to_string()];
                names.extend(path.into_iter().map(|id| self.name_of(id).to_string()));
                return Err(FormulaError::CyclicReference {
                    name: name.to_string(),
                    path: names,
                });
            }
            return Err(FormulaError::DuplicateName(name.to_string()));
        }

        Ok(())
    }

    fn insert(&mut self, variable: Variable) -> VariableId {
        let id = self.graph.add_node(variable.references());
        debug_assert_eq!(id.index(), self.variables.len());
        self.names.insert(variable.name().to_string(), id);
        self.variables.push(Some(variable));
        id
    }
}

/// Owner of a set of named variables and their dependency graph.
///
/// # Example
///
/// ```rust
/// use formula_core::{compile, Mode, Registry};
///
/// let registry = Registry::new();
/// let a = registry.add_constant("a", 1.0)?;
/// let b = registry.add_delegate("b", compile("a + 2", &registry)?)?;
/// let c = registry.define_lazy("c", "a * b")?;
///
/// assert_eq!(registry.value(c)?, 3.0);
///
/// registry.set_constant_value(a, 10.0)?;
/// assert_eq!(registry.value(b)?, 12.0);
/// assert_eq!(registry.value(c)?, 120.0);
///
/// let referencing = registry.referencing(a, Mode::All)?;
/// assert!(referencing.contains(&b) && referencing.contains(&c));
/// # Ok::<(), formula_core::FormulaError>(())
/// ```
pub struct Registry {
    id: RegistryId,
    state: RwLock<RegistryState>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        let id = RegistryId::new();
        Self {
            id,
            state: RwLock::new(RegistryState::new(id)),
        }
    }

    pub fn id(&self) -> RegistryId {
        self.id
    }

    /// Take the read lock and return a view for several consistent queries.
    ///
    /// Mutating the registry while holding a lookup on the same thread
    /// deadlocks.
    pub fn lookup(&self) -> Lookup<'_> {
        Lookup::new(self.state.read())
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a constant.
    pub fn add_constant(&self, name: &str, value: f64) -> Result<VariableHandle> {
        self.register(Variable::constant(name, value))
    }

    /// Register a variable that recomputes `evaluator` on every read.
    pub fn add_delegate(&self, name: &str, evaluator: BoundEvaluator) -> Result<VariableHandle> {
        self.register(Variable::delegate(name, evaluator))
    }

    /// Register a variable that caches the result of `evaluator`.
    pub fn add_lazy(&self, name: &str, evaluator: BoundEvaluator) -> Result<VariableHandle> {
        self.register(Variable::lazy(name, evaluator))
    }

    /// Compile `expression` and register it as a delegate.
    pub fn define_delegate(&self, name: &str, expression: &str) -> Result<VariableHandle> {
        let evaluator = compile(expression, self)?;
        self.add_delegate(name, evaluator)
    }

    /// Compile `expression` and register it as a lazy variable.
    pub fn define_lazy(&self, name: &str, expression: &str) -> Result<VariableHandle> {
        let evaluator = compile(expression, self)?;
        self.add_lazy(name, evaluator)
    }

    fn register(&self, variable: Variable) -> Result<VariableHandle> {
        let mut state = self.state.write();
        state.check_insert(&variable)?;

        let kind = variable.kind();
        let references = variable.references().len();
        let id = state.insert(variable);
        debug!(
            name = state.name_of(id),
            %kind,
            references,
            "registered variable"
        );

        Ok(VariableHandle::new(self.id, id))
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Assign a constant and invalidate every lazy cache that depends on it,
    /// directly or transitively, before returning.
    pub fn set_constant_value(&self, handle: VariableHandle, value: f64) -> Result<()> {
        let mut state = self.state.write();
        let id = state.resolve(handle)?;

        let RegistryState {
            variables, graph, ..
        } = &mut *state;

        let variable = variables
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(FormulaError::ForeignVariable)?;
        if !variable.set_constant(value) {
            return Err(FormulaError::NotConstant(variable.name().to_string()));
        }

        let affected = graph.walk(id, Direction::Referencing);
        let cleared = affected
            .iter()
            .filter_map(|dep| variables.get(dep.index()).and_then(Option::as_ref))
            .filter(|dep| dep.invalidate())
            .count();

        debug!(
            name = state.name_of(id),
            value,
            affected = affected.len(),
            cleared,
            "constant updated"
        );
        Ok(())
    }

    /// Remove a variable that nothing references.
    ///
    /// The name becomes available again. Handles to the removed variable,
    /// and evaluators compiled against it, are rejected from then on.
    pub fn remove(&self, handle: VariableHandle) -> Result<()> {
        let mut state = self.state.write();
        let id = state.resolve(handle)?;

        let dependents = state.graph.neighbours(id, Direction::Referencing);
        if !dependents.is_empty() {
            let mut referencing: Vec<String> = dependents
                .iter()
                .map(|&dep| state.name_of(dep).to_string())
                .collect();
            referencing.sort();
            return Err(FormulaError::StillReferenced {
                name: state.name_of(id).to_string(),
                referencing,
            });
        }

        state.graph.remove_node(id);
        if let Some(variable) = state.variables.get_mut(id.index()).and_then(Option::take) {
            state.names.shift_remove(variable.name());
            debug!(name = variable.name(), "removed variable");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Find a variable by name. A missing name is not an error.
    pub fn get(&self, name: &str) -> Option<VariableHandle> {
        self.lookup().get(name)
    }

    /// Current value of a variable.
    pub fn value(&self, handle: VariableHandle) -> Result<f64> {
        self.lookup().value(handle)
    }

    /// Variables `handle` reads, directly or transitively.
    pub fn references(&self, handle: VariableHandle, mode: Mode) -> Result<IndexSet<VariableHandle>> {
        self.lookup().references(handle, mode)
    }

    /// Variables that read `handle`, directly or transitively.
    pub fn referencing(&self, handle: VariableHandle, mode: Mode) -> Result<IndexSet<VariableHandle>> {
        self.lookup().referencing(handle, mode)
    }

    pub fn name(&self, handle: VariableHandle) -> Result<String> {
        self.lookup().name(handle).map(str::to_string)
    }

    pub fn kind(&self, handle: VariableHandle) -> Result<VariableKind> {
        self.lookup().kind(handle)
    }

    /// Cache state of a lazy variable; `None` for the other kinds.
    pub fn cache_state(&self, handle: VariableHandle) -> Result<Option<CacheState>> {
        self.lookup().cache_state(handle)
    }

    /// Whether a lazy variable currently holds a fresh value.
    pub fn is_cached(&self, handle: VariableHandle) -> Result<bool> {
        Ok(self
            .cache_state(handle)?
            .is_some_and(|state| state.is_fresh()))
    }

    /// The bound evaluator of a delegate or lazy variable.
    pub fn evaluator(&self, handle: VariableHandle) -> Result<Option<BoundEvaluator>> {
        self.lookup().evaluator(handle)
    }

    pub fn len(&self) -> usize {
        self.lookup().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup().is_empty()
    }

    /// All variables in registration order.
    pub fn handles(&self) -> Vec<VariableHandle> {
        self.lookup().handles()
    }

    /// Evaluate every variable, in evaluation order.
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.lookup().snapshot()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("id", &self.id)
            .field("variables", &self.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_constant_and_read_back() {
        let registry = Registry::new();
        let a = registry.add_constant("a", 2.5).unwrap();

        assert_eq!(registry.value(a).unwrap(), 2.5);
        assert_eq!(registry.kind(a).unwrap(), VariableKind::Constant);
        assert_eq!(registry.name(a).unwrap(), "a");
        assert_eq!(registry.get("a"), Some(a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn get_missing_name_is_none() {
        let registry = Registry::new();
        assert!(registry.get("nothing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_name_is_rejected_without_change() {
        let registry = Registry::new();
        let a = registry.add_constant("a", 1.0).unwrap();

        assert_eq!(
            registry.add_constant("a", 2.0),
            Err(FormulaError::DuplicateName("a".to_string()))
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.value(a).unwrap(), 1.0);
    }

    #[test]
    fn self_reference_is_cyclic() {
        let registry = Registry::new();
        registry.add_constant("a", 1.0).unwrap();

        let evaluator = compile("a + 1", &registry).unwrap();
        assert_eq!(
            registry.add_delegate("a", evaluator),
            Err(FormulaError::CyclicReference {
                name: "a".to_string(),
                path: vec!["a".to_string(), "a".to_string()],
            })
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn transitive_self_reference_is_cyclic() {
        let registry = Registry::new();
        registry.add_constant("a", 1.0).unwrap();
        registry.define_delegate("b", "a * 2").unwrap();

        let result = registry.define_lazy("a", "b + 1");
        assert_eq!(
            result,
            Err(FormulaError::CyclicReference {
                name: "a".to_string(),
                path: vec!["a".to_string(), "b".to_string(), "a".to_string()],
            })
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn evaluator_from_another_registry_is_rejected() {
        let first = Registry::new();
        first.add_constant("a", 1.0).unwrap();
        let evaluator = compile("a", &first).unwrap();

        let second = Registry::new();
        second.add_constant("a", 1.0).unwrap();
        assert!(matches!(
            second.add_lazy("b", evaluator),
            Err(FormulaError::UnknownReference(_))
        ));
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn foreign_handle_fails_fast() {
        let first = Registry::new();
        let a = first.add_constant("a", 1.0).unwrap();
        let second = Registry::new();
        second.add_constant("a", 1.0).unwrap();

        assert_eq!(second.value(a), Err(FormulaError::ForeignVariable));
        assert_eq!(
            second.references(a, Mode::All),
            Err(FormulaError::ForeignVariable)
        );
        assert_eq!(
            second.referencing(a, Mode::Explicit),
            Err(FormulaError::ForeignVariable)
        );
        assert_eq!(
            second.set_constant_value(a, 3.0),
            Err(FormulaError::ForeignVariable)
        );
    }

    #[test]
    fn only_constants_can_be_assigned() {
        let registry = Registry::new();
        registry.add_constant("a", 1.0).unwrap();
        let b = registry.define_delegate("b", "a").unwrap();

        assert_eq!(
            registry.set_constant_value(b, 5.0),
            Err(FormulaError::NotConstant("b".to_string()))
        );
        assert_eq!(registry.value(b).unwrap(), 1.0);
    }

    #[test]
    fn lazy_caches_until_upstream_changes() {
        let registry = Registry::new();
        let a = registry.add_constant("a", 1.0).unwrap();
        let c = registry.define_lazy("c", "a * 3").unwrap();

        assert_eq!(registry.cache_state(c).unwrap(), Some(CacheState::Stale));
        assert_eq!(registry.value(c).unwrap(), 3.0);
        assert_eq!(registry.cache_state(c).unwrap(), Some(CacheState::Fresh(3.0)));

        registry.set_constant_value(a, 2.0).unwrap();
        assert!(!registry.is_cached(c).unwrap());
        assert_eq!(registry.value(c).unwrap(), 6.0);
        assert!(registry.is_cached(c).unwrap());
    }

    #[test]
    fn delegate_has_no_cache() {
        let registry = Registry::new();
        registry.add_constant("a", 1.0).unwrap();
        let b = registry.define_delegate("b", "a").unwrap();

        registry.value(b).unwrap();
        assert_eq!(registry.cache_state(b).unwrap(), None);
        assert!(!registry.is_cached(b).unwrap());
    }

    #[test]
    fn remove_unreferenced_variable_frees_its_name() {
        let registry = Registry::new();
        let a = registry.add_constant("a", 1.0).unwrap();
        let b = registry.define_delegate("b", "a + 1").unwrap();

        registry.remove(b).unwrap();
        assert!(registry.get("b").is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.referencing(a, Mode::All).unwrap().is_empty());
        assert!(matches!(
            registry.value(b),
            Err(FormulaError::UnknownReference(_))
        ));

        let b2 = registry.define_delegate("b", "a + 2").unwrap();
        assert_ne!(b, b2);
        assert_eq!(registry.value(b2).unwrap(), 3.0);
    }

    #[test]
    fn remove_referenced_variable_is_rejected() {
        let registry = Registry::new();
        let a = registry.add_constant("a", 1.0).unwrap();
        registry.define_delegate("z", "a").unwrap();
        registry.define_lazy("y", "a").unwrap();

        assert_eq!(
            registry.remove(a),
            Err(FormulaError::StillReferenced {
                name: "a".to_string(),
                referencing: vec!["y".to_string(), "z".to_string()],
            })
        );
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn evaluator_compiled_against_removed_variable_is_rejected() {
        let registry = Registry::new();
        let a = registry.add_constant("a", 1.0).unwrap();
        let evaluator = compile("a * 2", &registry).unwrap();

        registry.remove(a).unwrap();
        registry.add_constant("a", 5.0).unwrap();

        assert_eq!(
            registry.add_delegate("b", evaluator),
            Err(FormulaError::UnknownReference("'a' no longer exists".to_string()))
        );
    }

    #[test]
    fn handles_are_in_registration_order() {
        let registry = Registry::new();
        let x = registry.add_constant("x", 1.0).unwrap();
        let y = registry.add_constant("y", 1.0).unwrap();
        let z = registry.define_delegate("z", "y + x").unwrap();
        assert_eq!(registry.handles(), vec![x, y, z]);
    }

    #[test]
    fn evaluator_is_exposed_for_formulas_only() {
        let registry = Registry::new();
        let a = registry.add_constant("a", 1.0).unwrap();
        let b = registry.define_lazy("b", "a / 4").unwrap();

        assert!(registry.evaluator(a).unwrap().is_none());
        let evaluator = registry.evaluator(b).unwrap().unwrap();
        assert_eq!(evaluator.expression(), "a / 4");
    }
}
