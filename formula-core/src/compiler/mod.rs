//! Expression Compiler
//!
//! Turns formula text into a [`BoundEvaluator`] tied to a registry.
//!
//! # Pipeline
//!
//! 1. The lexer and recursive-descent parser build a post-order [`Ast`].
//! 2. The bind step resolves every identifier against the registry. An
//!    unknown name fails with [`FormulaError::UnknownVariable`]; this is how
//!    the registry learns a formula's references before the variable exists.
//! 3. The AST is lowered to a flat SSA [`Program`].
//!
//! Compilation only reads the registry. It takes the registry's read lock
//! once for the whole bind step, so every name resolves against the same
//! state.

mod evaluator;
mod ir;
mod lexer;
mod parser;

pub use evaluator::BoundEvaluator;
pub use ir::{Op, OpCode, Operand, Program};
pub use parser::{parse_expression, Ast, BinaryOperator, Expr, ExprId, UnaryOperator};

use indexmap::IndexSet;
use smallvec::SmallVec;
use tracing::trace;

use crate::config::CompilerConfig;
use crate::error::{FormulaError, Result};
use crate::registry::Registry;

/// Compiles formula text against a registry.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile `expression`, resolving its identifiers in `registry`.
    ///
    /// The returned evaluator exposes the referenced names through
    /// [`BoundEvaluator::reference_names`].
    pub fn compile(&self, expression: &str, registry: &Registry) -> Result<BoundEvaluator> {
        let ast = parse_expression(expression, &self.config)?;

        let mut names = IndexSet::new();
        let mut references = SmallVec::new();
        {
            let lookup = registry.lookup();
            for name in ast.identifiers() {
                let handle = lookup
                    .get(name)
                    .ok_or_else(|| FormulaError::UnknownVariable(name.to_string()))?;
                names.insert(name.to_string());
                references.push(handle.id());
            }
        }

        let program = Program::lower(&ast, &names)?;
        trace!(
            expression,
            ops = program.ops().len(),
            references = names.len(),
            "compiled formula"
        );

        Ok(BoundEvaluator::new(
            registry.id(),
            expression,
            references,
            names,
            program,
        ))
    }
}

/// Compile with the default [`CompilerConfig`].
pub fn compile(expression: &str, registry: &Registry) -> Result<BoundEvaluator> {
    Compiler::default().compile(expression, registry)
}
