//! Row cursor fed by the task that reads a result stream

use crate::runtime;
use async_trait::async_trait;
use dbproc_core::{BlockingCursor, ColumnMeta, DbProcError, Result, ResultCursor, Value};
use tokio::sync::mpsc;

/// Rows the reading task may run ahead of the cursor
pub(crate) const ROW_BUFFER: usize = 64;

/// One item of the first result set
#[derive(Debug)]
pub(crate) enum StreamEvent {
    Columns(Vec<ColumnMeta>),
    Row(Vec<Value>),
}

pub(crate) type EventSender = mpsc::Sender<Result<StreamEvent>>;
pub(crate) type EventReceiver = mpsc::Receiver<Result<StreamEvent>>;

/// Forward-only cursor over a result set that is still being read.
///
/// Construction waits for the column metadata and the first row, so
/// `columns` and `has_rows` answer without further I/O and an error raised
/// before the first row fails the execution itself.
pub(crate) struct StreamingCursor {
    columns: Vec<ColumnMeta>,
    first_row: Option<Vec<Value>>,
    rx: EventReceiver,
    finished: bool,
}

impl StreamingCursor {
    pub(crate) async fn start(mut rx: EventReceiver) -> Result<Self> {
        let mut columns = Vec::new();
        let first_row = loop {
            match rx.recv().await {
                None => break None,
                Some(Err(e)) => return Err(e),
                Some(Ok(StreamEvent::Columns(cols))) => columns = cols,
                Some(Ok(StreamEvent::Row(values))) => break Some(values),
            }
        };
        Ok(Self {
            columns,
            finished: first_row.is_none(),
            first_row,
            rx,
        })
    }

    fn accept(&mut self, event: Option<Result<StreamEvent>>) -> Result<Option<Vec<Value>>> {
        match event {
            Some(Ok(StreamEvent::Row(values))) => Ok(Some(values)),
            Some(Ok(StreamEvent::Columns(_))) => {
                self.finished = true;
                Err(DbProcError::Execution(
                    "column metadata arrived after rows".to_string(),
                ))
            }
            Some(Err(e)) => {
                self.finished = true;
                Err(e)
            }
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ResultCursor for StreamingCursor {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn has_rows(&self) -> bool {
        self.first_row.is_some()
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        if let Some(values) = self.first_row.take() {
            return Ok(Some(values));
        }
        if self.finished {
            return Ok(None);
        }
        let event = self.rx.recv().await;
        self.accept(event)
    }
}

impl BlockingCursor for StreamingCursor {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        if let Some(values) = self.first_row.take() {
            return Ok(Some(values));
        }
        if self.finished {
            return Ok(None);
        }
        let event = runtime::wait(self.rx.recv());
        self.accept(event)
    }
}
