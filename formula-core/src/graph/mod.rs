//! Dependency Graph
//!
//! This module implements the directed graph that records which variables
//! read which other variables.
//!
//! # Overview
//!
//! - Nodes are variables, identified by their arena index ([`VariableId`]).
//! - An edge `A -> B` means "A's evaluator directly reads B".
//!
//! When a constant changes, the registry walks the graph in the
//! [`Direction::Referencing`] direction to find every cache that may be
//! stale.
//!
//! # Design Decisions
//!
//! 1. Nodes live in a `Vec` indexed by [`VariableId`] for O(1) lookups, and
//!    cycle checks reduce to membership tests on integer sets.
//!
//! 2. We maintain both forward (dependencies) and reverse (dependents) edges,
//!    updated together, to make traversal equally cheap in both directions.
//!
//! 3. A node can only be added with edges to nodes that already exist, so
//!    the graph is acyclic by construction.

mod dag;
mod node;

pub use dag::{DependencyGraph, Direction};
pub use node::{Node, VariableId};
