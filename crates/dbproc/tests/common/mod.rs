//! Spy connection shared by executor tests
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dbproc::{
    BlockingCursor, BufferedCursor, ColumnMeta, Connection, ConnectionState, DbProcError,
    ProcedureCall, Result, ResultCursor, Value,
};
use parking_lot::Mutex;

/// Connection that records how it is used and serves a canned result set
pub struct SpyConnection {
    state: Mutex<ConnectionState>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    executed: Mutex<Vec<ProcedureCall>>,
    result: BufferedCursor,
    fail_open: bool,
    fail_execute: Option<String>,
    fail_after_rows: Option<usize>,
    fail_close: bool,
}

impl SpyConnection {
    pub fn new(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            state: Mutex::new(ConnectionState::Closed),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
            result: BufferedCursor::from_names(columns.iter().copied(), rows),
            fail_open: false,
            fail_execute: None,
            fail_after_rows: None,
            fail_close: false,
        }
    }

    pub fn empty() -> Self {
        Self::new(&[], Vec::new())
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_execute(mut self, message: &str) -> Self {
        self.fail_execute = Some(message.to_string());
        self
    }

    /// Make the cursor fail when asked for the row after the first `rows`
    pub fn failing_after_rows(mut self, rows: usize) -> Self {
        self.fail_after_rows = Some(rows);
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn already_open(self) -> Self {
        *self.state.lock() = ConnectionState::Open;
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<ProcedureCall> {
        self.executed.lock().clone()
    }

    pub fn into_shared(self) -> (Arc<SpyConnection>, Arc<dyn Connection>) {
        let spy = Arc::new(self);
        let conn: Arc<dyn Connection> = spy.clone();
        (spy, conn)
    }

    fn do_open(&self) -> Result<()> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(DbProcError::Connection("login failed".into()));
        }
        *self.state.lock() = ConnectionState::Open;
        Ok(())
    }

    fn do_execute(&self, call: &ProcedureCall) -> Result<SpyCursor> {
        if *self.state.lock() != ConnectionState::Open {
            return Err(DbProcError::Execution("connection is not open".into()));
        }
        self.executed.lock().push(call.clone());
        if let Some(message) = &self.fail_execute {
            return Err(DbProcError::Execution(message.clone()));
        }
        Ok(SpyCursor {
            inner: self.result.clone(),
            fail_after_rows: self.fail_after_rows,
            served: 0,
        })
    }
}

#[async_trait]
impl Connection for SpyConnection {
    fn driver_name(&self) -> &str {
        "spy"
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    async fn open(&self) -> Result<()> {
        tokio::task::yield_now().await;
        self.do_open()
    }

    fn open_blocking(&self) -> Result<()> {
        self.do_open()
    }

    async fn execute_reader(&self, call: &ProcedureCall) -> Result<Box<dyn ResultCursor>> {
        tokio::task::yield_now().await;
        Ok(Box::new(self.do_execute(call)?))
    }

    fn execute_reader_blocking(&self, call: &ProcedureCall) -> Result<Box<dyn BlockingCursor>> {
        Ok(Box::new(self.do_execute(call)?))
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = ConnectionState::Closed;
        if self.fail_close {
            return Err(DbProcError::Connection("network error while closing".into()));
        }
        Ok(())
    }
}

struct SpyCursor {
    inner: BufferedCursor,
    fail_after_rows: Option<usize>,
    served: usize,
}

impl SpyCursor {
    fn advance(&mut self) -> Result<Option<Vec<Value>>> {
        if self.fail_after_rows == Some(self.served) {
            return Err(DbProcError::Execution("transport error while reading row".into()));
        }
        self.served += 1;
        BlockingCursor::next_row(&mut self.inner)
    }
}

#[async_trait]
impl ResultCursor for SpyCursor {
    fn columns(&self) -> &[ColumnMeta] {
        ResultCursor::columns(&self.inner)
    }

    fn has_rows(&self) -> bool {
        self.inner.has_rows()
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        self.advance()
    }
}

impl BlockingCursor for SpyCursor {
    fn columns(&self) -> &[ColumnMeta] {
        BlockingCursor::columns(&self.inner)
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        self.advance()
    }
}
