//! Stored procedure invocation model

use crate::Value;
use serde::{Deserialize, Serialize};

/// A named parameter bound to a procedure call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name, passed to the driver verbatim (e.g. `@id` or `id`)
    pub name: String,
    /// Bound value, `Value::Null` when the caller supplied nothing
    pub value: Value,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A stored procedure name and its ordered parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureCall {
    name: String,
    parameters: Vec<Parameter>,
}

impl ProcedureCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    /// Procedure name as given by the caller
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters in registration order
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Register a parameter.
    ///
    /// Names are unique within a call: registering a name that is already
    /// present (compared ASCII case-insensitively) replaces the earlier value
    /// and keeps the earlier position.
    pub fn push(&mut self, parameter: Parameter) {
        match self
            .parameters
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&parameter.name))
        {
            Some(existing) => {
                tracing::debug!(
                    procedure = %self.name,
                    parameter = %parameter.name,
                    "replacing duplicate parameter"
                );
                existing.value = parameter.value;
            }
            None => self.parameters.push(parameter),
        }
    }
}
