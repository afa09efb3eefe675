//! Dependency DAG
//!
//! Arena of [`Node`]s indexed by [`VariableId`]. Slots are never reused: a
//! removed node leaves a hole so that identifiers held elsewhere stay
//! unambiguous.
//!
//! All traversals are iterative (explicit queue or stack), so their cost is
//! bounded by the number of nodes and edges and never by the call stack.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexSet;

use super::node::{Node, VariableId};

/// Which way to follow edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From a variable to the variables it reads.
    References,
    /// From a variable to the variables that read it.
    Referencing,
}

/// The dependency graph of one registry.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<Option<Node>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node that reads `dependencies`, wiring the reverse edges in the
    /// same step.
    ///
    /// Callers must only pass identifiers for which [`contains`](Self::contains)
    /// holds; since a new node can only point at existing ones, the graph
    /// stays acyclic.
    pub fn add_node(&mut self, dependencies: &[VariableId]) -> VariableId {
        let id = VariableId::from_index(self.nodes.len());
        for dep in dependencies {
            if let Some(Some(node)) = self.nodes.get_mut(dep.index()) {
                node.add_dependent(id);
            }
        }
        self.nodes.push(Some(Node::with_dependencies(dependencies)));
        id
    }

    /// Remove a node and its outgoing edges.
    ///
    /// Callers must first ensure nothing depends on it.
    pub fn remove_node(&mut self, id: VariableId) -> Option<Node> {
        let node = self.nodes.get_mut(id.index())?.take()?;
        for dep in node.dependencies() {
            if let Some(Some(dep_node)) = self.nodes.get_mut(dep.index()) {
                dep_node.remove_dependent(id);
            }
        }
        Some(node)
    }

    pub fn contains(&self, id: VariableId) -> bool {
        self.node(id).is_some()
    }

    pub fn node(&self, id: VariableId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    /// Direct neighbours of `id` in the given direction.
    pub fn neighbours(&self, id: VariableId, direction: Direction) -> &[VariableId] {
        match (self.node(id), direction) {
            (Some(node), Direction::References) => node.dependencies(),
            (Some(node), Direction::Referencing) => node.dependents(),
            (None, _) => &[],
        }
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Every node reachable from `start`, excluding `start` itself, in
    /// breadth-first order.
    pub fn walk(&self, start: VariableId, direction: Direction) -> IndexSet<VariableId> {
        let mut reached = IndexSet::new();
        let mut queue: VecDeque<VariableId> =
            self.neighbours(start, direction).iter().copied().collect();

        while let Some(id) = queue.pop_front() {
            if id == start || !reached.insert(id) {
                continue;
            }
            queue.extend(self.neighbours(id, direction).iter().copied());
        }

        reached
    }

    /// Shortest reference path from any of `starts` to `target`, both ends
    /// included. Used to explain why a registration would close a cycle.
    pub fn find_path(&self, starts: &[VariableId], target: VariableId) -> Option<Vec<VariableId>> {
        let mut parent: HashMap<VariableId, Option<VariableId>> = HashMap::new();
        let mut queue = VecDeque::new();
        for &start in starts {
            if parent.insert(start, None).is_none() {
                queue.push_back(start);
            }
        }

        while let Some(id) = queue.pop_front() {
            if id == target {
                let mut path = vec![id];
                let mut cursor = id;
                while let Some(Some(prev)) = parent.get(&cursor) {
                    path.push(*prev);
                    cursor = *prev;
                }
                path.reverse();
                return Some(path);
            }
            for &next in self.neighbours(id, Direction::References) {
                if !parent.contains_key(&next) {
                    parent.insert(next, Some(id));
                    queue.push_back(next);
                }
            }
        }

        None
    }

    /// All live nodes ordered so that every node comes after the nodes it
    /// reads (Kahn's algorithm). Ties keep registration order.
    pub fn topological_order(&self) -> Vec<VariableId> {
        let mut in_degree: HashMap<VariableId, usize> = HashMap::new();
        let mut queue = VecDeque::new();

        for (index, slot) in self.nodes.iter().enumerate() {
            if let Some(node) = slot {
                let id = VariableId::from_index(index);
                let degree = node.dependencies().len();
                in_degree.insert(id, degree);
                if degree == 0 {
                    queue.push_back(id);
                }
            }
        }

        let mut result = Vec::with_capacity(in_degree.len());
        while let Some(id) = queue.pop_front() {
            result.push(id);
            for &dependent in self.neighbours(id, Direction::Referencing) {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        result
    }
}
