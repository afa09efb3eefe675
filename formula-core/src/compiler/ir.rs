//! Lowered Program Representation
//!
//! A compiled formula is a flat list of operations in SSA form: op `i`
//! writes value `i`, and its operands only ever name earlier values,
//! literals, or input slots. Running a program is a single forward pass
//! over a value buffer with no recursion.
//!
//! Input slots are positions in the bound evaluator's reference list, not
//! variable identities; the evaluator maps them to variables.

use indexmap::IndexSet;
use serde::Serialize;
use smallvec::{smallvec, SmallVec};

use super::parser::{Ast, BinaryOperator, Expr, UnaryOperator};
use crate::error::{FormulaError, Result};

/// Operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpCode {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,

    // Other
    Const,
    Load,
}

/// An operand is an earlier value, a literal, or an input slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operand {
    /// Result of an earlier op
    Ref(usize),
    /// Literal float value
    Float(f64),
    /// Position in the evaluator's input list
    Input(usize),
}

/// A single operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Op {
    pub op: OpCode,
    /// Result value ID
    pub result: usize,
    pub operands: SmallVec<[Operand; 2]>,
}

/// A lowered formula.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    ops: Vec<Op>,
    output: usize,
    inputs: usize,
}

impl Program {
    /// Lower a post-order [`Ast`]. Each identifier loads from its index in
    /// `slots`; an identifier missing from `slots` is an unknown variable.
    pub(crate) fn lower(ast: &Ast, slots: &IndexSet<String>) -> Result<Self> {
        let ops = ast
            .nodes()
            .iter()
            .enumerate()
            .map(|(result, node)| -> Result<Op> {
                let (op, operands): (OpCode, SmallVec<[Operand; 2]>) = match node {
                    Expr::Number(n) => (OpCode::Const, smallvec![Operand::Float(*n)]),
                    Expr::VarRef(name) => {
                        let slot = slots
                            .get_index_of(name.as_str())
                            .ok_or_else(|| FormulaError::UnknownVariable(name.clone()))?;
                        (OpCode::Load, smallvec![Operand::Input(slot)])
                    }
                    Expr::UnaryOp {
                        op: UnaryOperator::Neg,
                        operand,
                    } => (OpCode::Neg, smallvec![Operand::Ref(operand.index())]),
                    Expr::BinaryOp { op, left, right } => {
                        let code = match op {
                            BinaryOperator::Add => OpCode::Add,
                            BinaryOperator::Sub => OpCode::Sub,
                            BinaryOperator::Mul => OpCode::Mul,
                            BinaryOperator::Div => OpCode::Div,
                            BinaryOperator::Pow => OpCode::Pow,
                        };
                        (
                            code,
                            smallvec![Operand::Ref(left.index()), Operand::Ref(right.index())],
                        )
                    }
                };
                Ok(Op {
                    op,
                    result,
                    operands,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            ops,
            output: ast.root().index(),
            inputs: slots.len(),
        })
    }

    /// Execute the program against the current input values.
    ///
    /// Arithmetic is plain IEEE 754: dividing by zero yields an infinity or
    /// NaN, never an error.
    pub fn run(&self, inputs: &[f64]) -> f64 {
        debug_assert_eq!(inputs.len(), self.inputs, "wrong number of inputs");

        let mut values: SmallVec<[f64; 16]> = SmallVec::with_capacity(self.ops.len());
        for op in &self.ops {
            let arg = |i: usize| match op.operands[i] {
                Operand::Ref(id) => values[id],
                Operand::Float(f) => f,
                Operand::Input(slot) => inputs[slot],
            };
            let value = match op.op {
                OpCode::Const | OpCode::Load => arg(0),
                OpCode::Neg => -arg(0),
                OpCode::Add => arg(0) + arg(1),
                OpCode::Sub => arg(0) - arg(1),
                OpCode::Mul => arg(0) * arg(1),
                OpCode::Div => arg(0) / arg(1),
                OpCode::Pow => arg(0).powf(arg(1)),
            };
            values.push(value);
        }
        values[self.output]
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn output(&self) -> usize {
        self.output
    }

    /// Get the number of inputs
    pub fn num_inputs(&self) -> usize {
        self.inputs
    }

    /// Serialize the program for inspection.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
