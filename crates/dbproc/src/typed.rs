//! Typed executor: run a procedure and map its rows into records

use crate::command::Command;
use crate::guard::ConnectionGuard;
use crate::mapper;
use crate::record::Record;
use dbproc_core::{Connection, ProcedureCall, Result};
use std::time::Instant;

impl Command {
    /// Execute the procedure and map every row of its first result set to `T`.
    ///
    /// The connection is opened if it is closed and is closed again before
    /// this returns, whether the call succeeds or fails. Zero rows yield an
    /// empty `Vec`.
    pub async fn exec_procedure<T: Record>(self) -> Result<Vec<T>> {
        let (connection, call) = self.into_parts();
        let start = Instant::now();
        tracing::debug!(
            procedure = %call.name(),
            parameters = call.parameters().len(),
            "executing procedure"
        );

        let guard = ConnectionGuard::open(connection).await?;

        match read_records::<T>(guard.connection(), &call).await {
            Ok(records) => {
                guard.release()?;
                tracing::debug!(
                    procedure = %call.name(),
                    row_count = records.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "procedure completed"
                );
                Ok(records)
            }
            Err(e) => {
                drop(guard);
                tracing::error!(procedure = %call.name(), error = %e, "procedure failed");
                Err(e)
            }
        }
    }
}

async fn read_records<T: Record>(connection: &dyn Connection, call: &ProcedureCall) -> Result<Vec<T>> {
    let mut cursor = connection.execute_reader(call).await?;
    mapper::map_rows::<T>(cursor.as_mut()).await
}
