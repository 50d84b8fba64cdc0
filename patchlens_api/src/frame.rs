use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One observed call of an attached method.
///
/// Values are already rendered to text by the instrumentation boundary; the
/// engine never resolves bindings itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFrame {
    /// Unix timestamp in milliseconds when the call was observed.
    pub timestamp_ms: i64,
    /// Duration of the call in microseconds.
    #[serde(default)]
    pub duration_us: u64,
    /// Parameter name to rendered value.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    /// Instance field name to rendered value.
    #[serde(default)]
    pub fields: HashMap<String, String>,
    /// Static field name to rendered value.
    #[serde(default)]
    pub statics: HashMap<String, String>,
    /// Instruction offset active at capture time.
    pub instruction_offset: u32,
}

impl ExecutionFrame {
    /// Frame with empty bindings.
    #[must_use]
    pub fn new(timestamp_ms: i64, instruction_offset: u32) -> Self {
        Self {
            timestamp_ms,
            duration_us: 0,
            parameters: HashMap::new(),
            fields: HashMap::new(),
            statics: HashMap::new(),
            instruction_offset,
        }
    }

    /// Add a parameter binding.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Add an instance field binding.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Add a static field binding.
    #[must_use]
    pub fn with_static(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.statics.insert(name.into(), value.into());
        self
    }
}
