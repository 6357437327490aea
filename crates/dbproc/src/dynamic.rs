//! Dynamic executor: lazily stream rows as ordered column maps

use crate::command::Command;
use crate::guard::ConnectionGuard;
use dbproc_core::{BlockingCursor, DbProcError, MappingError, Result, RowMap, Value};

impl Command {
    /// Execute the procedure lazily, yielding one [`RowMap`] per row.
    ///
    /// Nothing runs until the first call to `next()`. Each row is read from
    /// the cursor only when requested, blocking the calling thread. The
    /// connection is closed as soon as the rows run out, a row fails, or the
    /// iterator is dropped.
    pub fn exec_procedure_with_dynamic_result(self) -> DynamicRows {
        DynamicRows {
            state: State::Pending(self),
        }
    }
}

/// Single-pass row sequence returned by
/// [`Command::exec_procedure_with_dynamic_result`].
///
/// After the sequence has ended, advancing it again yields
/// `Err(DbProcError::CursorClosed)` once and then `None`; the procedure is
/// never executed a second time.
pub struct DynamicRows {
    state: State,
}

enum State {
    Pending(Command),
    Streaming(Streaming),
    Finished,
    Closed,
}

// Field order matters: the cursor drops before the guard closes the connection.
struct Streaming {
    cursor: Box<dyn BlockingCursor>,
    columns: Vec<String>,
    guard: ConnectionGuard,
}

impl Streaming {
    fn start(command: Command) -> Result<Self> {
        let (connection, call) = command.into_parts();
        tracing::debug!(procedure = %call.name(), "executing procedure with dynamic result");

        let guard = ConnectionGuard::open_blocking(connection)?;
        let cursor = guard.connection().execute_reader_blocking(&call)?;
        let columns = cursor.columns().iter().map(|c| c.name.clone()).collect();

        Ok(Self {
            cursor,
            columns,
            guard,
        })
    }

    fn finish(self) -> Result<()> {
        let Streaming { cursor, guard, .. } = self;
        drop(cursor);
        guard.release()
    }
}

/// Pair captured column names with a row's values.
///
/// Duplicate column names keep the value of the first column with that name.
fn build_row(columns: &[String], values: Vec<Value>) -> Result<RowMap> {
    if values.len() < columns.len() {
        return Err(MappingError::MissingValue {
            column: columns[values.len()].clone(),
            ordinal: values.len(),
        }
        .into());
    }

    let mut row = RowMap::with_capacity(columns.len());
    for (name, value) in columns.iter().zip(values) {
        row.entry(name.clone()).or_insert(value);
    }
    Ok(row)
}

impl Iterator for DynamicRows {
    type Item = Result<RowMap>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, State::Closed) {
                State::Pending(command) => match Streaming::start(command) {
                    Ok(streaming) => self.state = State::Streaming(streaming),
                    Err(e) => {
                        self.state = State::Finished;
                        return Some(Err(e));
                    }
                },
                State::Streaming(mut streaming) => {
                    return match streaming.cursor.next_row() {
                        Ok(Some(values)) => {
                            let row = build_row(&streaming.columns, values);
                            self.state = match row {
                                Ok(_) => State::Streaming(streaming),
                                Err(_) => State::Finished,
                            };
                            Some(row)
                        }
                        Ok(None) => {
                            self.state = State::Finished;
                            streaming.finish().err().map(Err)
                        }
                        Err(e) => {
                            self.state = State::Finished;
                            Some(Err(e))
                        }
                    };
                }
                State::Finished => return Some(Err(DbProcError::CursorClosed)),
                State::Closed => return None,
            }
        }
    }
}

impl std::fmt::Debug for DynamicRows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Pending(_) => "pending",
            State::Streaming(_) => "streaming",
            State::Finished => "finished",
            State::Closed => "closed",
        };
        f.debug_struct("DynamicRows").field("state", &state).finish()
    }
}
