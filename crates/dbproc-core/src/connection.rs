//! Connection and result cursor traits

use crate::{ColumnMeta, ProcedureCall, Result, Value};
use async_trait::async_trait;

/// Whether a connection currently holds an open session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

/// A database connection able to run stored procedures.
///
/// Drivers expose both an async and a blocking flavour of `open` and
/// `execute_reader`. Closing is synchronous so it can run from a drop
/// guard on every exit path.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "mssql")
    fn driver_name(&self) -> &str;

    /// Current connection state
    fn state(&self) -> ConnectionState;

    /// Open the connection without blocking the calling task
    async fn open(&self) -> Result<()>;

    /// Open the connection, blocking the calling thread
    fn open_blocking(&self) -> Result<()>;

    /// Execute a stored procedure and return a cursor over its first result set
    async fn execute_reader(&self, call: &ProcedureCall) -> Result<Box<dyn ResultCursor>>;

    /// Blocking counterpart of [`Connection::execute_reader`]
    fn execute_reader_blocking(&self, call: &ProcedureCall) -> Result<Box<dyn BlockingCursor>>;

    /// Close the connection. Closing a closed connection is a no-op.
    fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }
}

/// Forward-only async view over the rows of an executed command
#[async_trait]
pub trait ResultCursor: Send {
    /// Columns of the result set, fixed for the lifetime of the cursor
    fn columns(&self) -> &[ColumnMeta];

    /// Whether the result set contains at least one row
    fn has_rows(&self) -> bool;

    /// Advance to the next row, returning its values in column order
    async fn next_row(&mut self) -> Result<Option<Vec<Value>>>;
}

/// Forward-only blocking view over the rows of an executed command
pub trait BlockingCursor: Send {
    /// Columns of the result set, fixed for the lifetime of the cursor
    fn columns(&self) -> &[ColumnMeta];

    /// Advance to the next row, returning its values in column order
    fn next_row(&mut self) -> Result<Option<Vec<Value>>>;
}
