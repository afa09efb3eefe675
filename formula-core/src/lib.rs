//! Formula Core
//!
//! This crate provides a small formula engine: named variables whose values
//! are literals or arithmetic formulas over other variables, kept in a live
//! dependency graph.
//!
//! It implements:
//!
//! - An expression compiler (`+ - * / ^`, unary minus, parentheses, numeric
//!   literals, variable names) producing reusable bound evaluators
//! - Three variable kinds: constants, delegates (recomputed on every read)
//!   and lazy variables (cached until an upstream constant changes)
//! - Direct and transitive dependency queries in both directions
//! - Cache invalidation on every constant assignment
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `compiler`: Lexer, parser, lowering and the [`BoundEvaluator`]
//! - `graph`: The dependency DAG and its traversals
//! - `variable`: Variable kinds, handles and lazy caches
//! - `registry`: Ownership, registration, invalidation and lookups
//! - `config`: Compiler limits
//!
//! # Numeric semantics
//!
//! All arithmetic is IEEE 754 double precision. Division by zero produces
//! an infinity or NaN and is never reported as an error.
//!
//! # Example
//!
//! ```rust
//! use formula_core::{Mode, Registry};
//!
//! let registry = Registry::new();
//! let a = registry.add_constant("a", 1.0)?;
//! let b = registry.define_delegate("b", "a + 2")?;
//! let c = registry.define_lazy("c", "a + b")?;
//!
//! assert_eq!(registry.value(c)?, 4.0);
//!
//! // No refresh call needed: the assignment invalidates `c`.
//! registry.set_constant_value(a, 10.0)?;
//! assert_eq!(registry.value(c)?, 22.0);
//!
//! let lookup = registry.lookup();
//! let upstream = lookup.references(c, Mode::All)?;
//! assert_eq!(lookup.sorted_names(upstream)?, vec!["a", "b"]);
//! # let _ = b;
//! # Ok::<(), formula_core::FormulaError>(())
//! ```

pub mod compiler;
pub mod config;
pub mod error;
pub mod graph;
pub mod registry;
pub mod variable;

pub use compiler::{compile, BoundEvaluator, Compiler};
pub use config::CompilerConfig;
pub use error::{FormulaError, Result};
pub use registry::{Lookup, Mode, Registry, Snapshot, VariableSnapshot};
pub use variable::{CacheState, VariableHandle, VariableKind};
