//! Compiler Configuration
//!
//! Limits applied while parsing expression text. Both limits exist so that
//! hostile or generated input fails with an error instead of exhausting the
//! stack or memory.

use serde::{Deserialize, Serialize};

use crate::error::{FormulaError, Result};

/// Default bound on parenthesis / unary / exponent nesting.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 256;

/// Default bound on expression length in bytes.
pub const DEFAULT_MAX_EXPRESSION_LEN: usize = 64 * 1024;

/// Settings for [`Compiler`](crate::compiler::Compiler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Deepest allowed nesting of sub-expressions.
    pub max_nesting_depth: usize,

    /// Longest accepted expression, in bytes.
    pub max_expression_len: usize,
}

impl CompilerConfig {
    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| FormulaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings under which no expression could compile.
    pub fn validate(&self) -> Result<()> {
        if self.max_nesting_depth == 0 {
            return Err(FormulaError::Config(
                "max_nesting_depth must be at least 1".to_string(),
            ));
        }
        if self.max_expression_len == 0 {
            return Err(FormulaError::Config(
                "max_expression_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            max_expression_len: DEFAULT_MAX_EXPRESSION_LEN,
        }
    }
}
