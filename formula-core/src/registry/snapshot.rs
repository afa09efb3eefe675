//! Registry snapshots for reporting and inspection.

use serde::Serialize;

use crate::variable::VariableKind;

/// One variable's state at the time of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableSnapshot {
    pub name: String,
    pub kind: VariableKind,
    /// NaN and infinities serialize as `null`.
    pub value: f64,
    /// Direct references, sorted by name.
    pub references: Vec<String>,
}

/// Every variable of a registry, in evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub variables: Vec<VariableSnapshot>,
}

impl Snapshot {
    pub fn get(&self, name: &str) -> Option<&VariableSnapshot> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
