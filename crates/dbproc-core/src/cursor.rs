//! In-memory cursor over an already fetched result set

use crate::{BlockingCursor, ColumnMeta, ResultCursor, Result, Value};
use async_trait::async_trait;
use std::collections::VecDeque;

/// A cursor whose rows were fully read from the wire before it was handed out.
///
/// Drivers that cannot hold a borrowed result stream past the call that
/// produced it return this type; it implements both cursor flavours.
#[derive(Debug, Clone, Default)]
pub struct BufferedCursor {
    columns: Vec<ColumnMeta>,
    rows: VecDeque<Vec<Value>>,
}

impl BufferedCursor {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
        }
    }

    /// Build a cursor from column names, assigning ordinals in order
    pub fn from_names<S: Into<String>>(
        names: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(ordinal, name)| ColumnMeta::new(name, ordinal))
            .collect();
        Self::new(columns, rows)
    }

    /// Rows not yet consumed
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait]
impl ResultCursor for BufferedCursor {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.pop_front())
    }
}

impl BlockingCursor for BufferedCursor {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.pop_front())
    }
}
