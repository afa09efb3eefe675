//! Variable evaluation.
//!
//! Reading a delegate or a stale lazy variable means first reading its
//! references, which may themselves need evaluating. Chains can be long, so
//! evaluation runs a post-order walk with an explicit stack instead of
//! recursing.
//!
//! Values computed during one walk are remembered for the rest of that
//! walk, so a delegate reachable along several paths runs once per read.
//! Nothing is remembered across walks except lazy caches.

use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::trace;

use super::RegistryState;
use crate::error::{FormulaError, Result};
use crate::graph::VariableId;

pub(crate) struct Evaluation<'s> {
    state: &'s RegistryState,
    values: HashMap<VariableId, f64>,
}

impl<'s> Evaluation<'s> {
    pub fn new(state: &'s RegistryState) -> Self {
        Self {
            state,
            values: HashMap::new(),
        }
    }

    pub fn value_of(&mut self, root: VariableId) -> Result<f64> {
        if let Some(value) = self.values.get(&root) {
            return Ok(*value);
        }

        let state = self.state;
        // (variable, references already pushed)
        let mut stack: Vec<(VariableId, bool)> = vec![(root, false)];

        while let Some((id, expanded)) = stack.pop() {
            if self.values.contains_key(&id) {
                continue;
            }

            let variable = state.variable(id).ok_or_else(|| missing(id))?;
            if let Some(value) = variable.ready_value() {
                self.values.insert(id, value);
                continue;
            }
            let Some(evaluator) = variable.evaluator() else {
                return Err(missing(id));
            };

            if !expanded {
                stack.push((id, true));
                stack.extend(
                    evaluator
                        .reference_ids()
                        .iter()
                        .filter(|dep| !self.values.contains_key(*dep))
                        .map(|&dep| (dep, false)),
                );
                continue;
            }

            // References were pushed above this entry, so they are all done.
            let inputs = evaluator
                .reference_ids()
                .iter()
                .map(|dep| self.values.get(dep).copied().ok_or_else(|| missing(*dep)))
                .collect::<Result<SmallVec<[f64; 8]>>>()?;

            let value = evaluator.evaluate(&inputs);
            variable.computed(value);
            trace!(variable = variable.name(), value, "evaluated");
            self.values.insert(id, value);
        }

        self.values.get(&root).copied().ok_or_else(|| missing(root))
    }
}

fn missing(id: VariableId) -> FormulaError {
    FormulaError::UnknownReference(format!("variable {id} no longer exists"))
}
