//! Graph Nodes
//!
//! This module defines the node type that lives in the dependency graph.

use std::fmt;

use smallvec::SmallVec;

/// Index of a variable in its registry's arena.
///
/// Identifiers are handed out in registration order and never reused, so a
/// stale identifier can be detected rather than silently aliasing a newer
/// variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableId(u32);

impl VariableId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Position of this variable in the arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Adjacency of one variable.
///
/// Both directions are stored so that reference and referencing queries are
/// equally cheap.
#[derive(Debug, Clone, Default)]
pub struct Node {
    /// Variables this node's evaluator reads.
    dependencies: SmallVec<[VariableId; 4]>,

    /// Variables whose evaluators read this node.
    dependents: SmallVec<[VariableId; 4]>,
}

impl Node {
    pub(crate) fn with_dependencies(dependencies: &[VariableId]) -> Self {
        Self {
            dependencies: dependencies.iter().copied().collect(),
            dependents: SmallVec::new(),
        }
    }

    pub fn dependencies(&self) -> &[VariableId] {
        &self.dependencies
    }

    pub fn dependents(&self) -> &[VariableId] {
        &self.dependents
    }

    pub(crate) fn add_dependent(&mut self, id: VariableId) {
        if !self.dependents.contains(&id) {
            self.dependents.push(id);
        }
    }

    pub(crate) fn remove_dependent(&mut self, id: VariableId) {
        self.dependents.retain(|d| *d != id);
    }
}
