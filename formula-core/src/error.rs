//! Error Types
//!
//! Every fallible operation in the crate returns [`FormulaError`]. The
//! variants fall into three groups:
//!
//! - Compile time: [`FormulaError::Syntax`], [`FormulaError::UnknownVariable`],
//!   [`FormulaError::NestingTooDeep`]. The registry is never touched.
//! - Registration time: [`FormulaError::DuplicateName`],
//!   [`FormulaError::CyclicReference`], [`FormulaError::UnknownReference`],
//!   [`FormulaError::StillReferenced`], [`FormulaError::NotConstant`]. The
//!   registry is left unchanged.
//! - Query time: [`FormulaError::ForeignVariable`] and
//!   [`FormulaError::UnknownReference`] for handles that are no longer valid.
//!
//! Division by zero is not an error: arithmetic follows IEEE 754 and
//! produces infinities or NaN.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FormulaError>;

/// Errors produced by the compiler, the registry and the lookup queries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// The expression text is malformed.
    #[error("syntax error at position {position}: {message}")]
    Syntax { message: String, position: usize },

    /// An identifier in the expression does not name a registered variable.
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// The expression nests deeper than the compiler allows.
    #[error("expression nesting exceeds the limit of {limit}")]
    NestingTooDeep { limit: usize },

    /// A variable with this name is already registered.
    #[error("a variable named '{0}' already exists")]
    DuplicateName(String),

    /// The evaluator or handle refers to a variable this registry does not hold.
    #[error("unknown reference: {0}")]
    UnknownReference(String),

    /// Only constants can be assigned a value.
    #[error("'{0}' is not a constant")]
    NotConstant(String),

    /// The handle was issued by a different registry.
    #[error("variable handle belongs to a different registry")]
    ForeignVariable,

    /// Registering the variable would close a cycle in the dependency graph.
    #[error("cyclic reference: '{name}' would depend on itself via {}", path.join(" -> "))]
    CyclicReference { name: String, path: Vec<String> },

    /// The variable cannot be removed while others reference it.
    #[error("cannot remove '{name}': referenced by {}", referencing.join(", "))]
    StillReferenced {
        name: String,
        referencing: Vec<String>,
    },

    /// Compiler configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FormulaError {
    pub(crate) fn syntax(message: impl Into<String>, position: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            position,
        }
    }
}
