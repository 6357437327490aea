//! Stored procedure command builder

use dbproc_core::{Connection, Parameter, ProcedureCall, Value};
use std::sync::Arc;

/// An executable stored procedure call bound to a connection.
///
/// A command is consumed by exactly one executor
/// ([`Command::exec_procedure`] or [`Command::exec_procedure_with_dynamic_result`]).
pub struct Command {
    connection: Arc<dyn Connection>,
    call: ProcedureCall,
}

impl Command {
    /// Create a stored procedure command on the given connection
    pub fn new(connection: Arc<dyn Connection>, procedure_name: impl Into<String>) -> Self {
        Self {
            connection,
            call: ProcedureCall::new(procedure_name),
        }
    }

    /// Register parameters in order.
    ///
    /// Values convert through `Into<Value>`; `None` becomes `Value::Null`.
    /// Nothing is checked against the procedure signature, mismatches are
    /// reported by the database at execution time.
    pub fn add_params<I, N, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in params {
            self.call.push(Parameter::new(name, value));
        }
        self
    }

    /// Register a single parameter
    pub fn add_param(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_params([(name.into(), value.into())])
    }

    pub fn procedure_name(&self) -> &str {
        self.call.name()
    }

    pub fn parameters(&self) -> &[Parameter] {
        self.call.parameters()
    }

    pub fn call(&self) -> &ProcedureCall {
        &self.call
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub(crate) fn into_parts(self) -> (Arc<dyn Connection>, ProcedureCall) {
        (self.connection, self.call)
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("driver", &self.connection.driver_name())
            .field("call", &self.call)
            .finish()
    }
}

/// Command construction on a shared connection handle
pub trait ConnectionExt {
    /// Create a stored procedure command for `procedure_name`
    fn create_command(&self, procedure_name: impl Into<String>) -> Command;
}

impl ConnectionExt for Arc<dyn Connection> {
    fn create_command(&self, procedure_name: impl Into<String>) -> Command {
        Command::new(Arc::clone(self), procedure_name)
    }
}
