//! Row mapper: result columns to record fields

use crate::record::Record;
use dbproc_core::{ColumnMeta, MappingError, Result, ResultCursor, Value};
use std::collections::HashMap;

/// One bound field: where its value lives in the row and where it goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBinding {
    /// Zero-based position of the column in each row
    pub ordinal: usize,
    /// Column name as returned by the database
    pub column: String,
    /// Target field name
    pub field: &'static str,
}

/// Field/column bindings for one execution.
///
/// Resolved once from the cursor's columns and the record's descriptors.
/// Fields without a matching column are left out and keep their default
/// value; columns without a matching field are ignored.
#[derive(Debug, Clone, Default)]
pub struct ColumnBindings {
    bindings: Vec<ColumnBinding>,
    // false where a later binding reads the same column
    movable: Vec<bool>,
}

impl ColumnBindings {
    /// Match the record's fields against `columns` by lower-cased name.
    ///
    /// Fails with [`MappingError::AmbiguousColumn`] when several columns
    /// match the same field.
    pub fn resolve<T: Record>(columns: &[ColumnMeta]) -> std::result::Result<Self, MappingError> {
        let mut by_name: HashMap<String, Vec<(usize, &str)>> = HashMap::new();
        for (ordinal, column) in columns.iter().enumerate() {
            by_name
                .entry(column.name.to_lowercase())
                .or_default()
                .push((ordinal, column.name.as_str()));
        }

        let mut bindings = Vec::with_capacity(T::fields().len());
        for descriptor in T::fields() {
            match by_name
                .get(&descriptor.column.to_lowercase())
                .map(Vec::as_slice)
            {
                None | Some([]) => {
                    tracing::trace!(field = descriptor.field, "no column for field");
                }
                Some([(ordinal, name)]) => bindings.push(ColumnBinding {
                    ordinal: *ordinal,
                    column: (*name).to_string(),
                    field: descriptor.field,
                }),
                Some(matches) => {
                    return Err(MappingError::AmbiguousColumn {
                        field: descriptor.field.to_string(),
                        columns: matches.iter().map(|(_, name)| name.to_string()).collect(),
                    });
                }
            }
        }

        let movable = bindings
            .iter()
            .enumerate()
            .map(|(i, b)| !bindings[i + 1..].iter().any(|later| later.ordinal == b.ordinal))
            .collect();

        Ok(Self { bindings, movable })
    }

    pub fn bindings(&self) -> &[ColumnBinding] {
        &self.bindings
    }

    /// Build one record from a row's values, moving them into its fields
    pub fn materialize<T: Record>(
        &self,
        mut values: Vec<Value>,
    ) -> std::result::Result<T, MappingError> {
        let mut record = T::default();
        for (binding, &movable) in self.bindings.iter().zip(&self.movable) {
            let slot = values
                .get_mut(binding.ordinal)
                .ok_or_else(|| MappingError::MissingValue {
                    column: binding.column.clone(),
                    ordinal: binding.ordinal,
                })?;
            let value = if movable {
                std::mem::take(slot)
            } else {
                slot.clone()
            };
            record.assign(binding.field, value)?;
        }
        Ok(record)
    }
}

/// Drain `cursor` into records of type `T`.
///
/// Either every row maps or the whole call fails; no partial list is
/// returned.
pub async fn map_rows<T: Record>(cursor: &mut dyn ResultCursor) -> Result<Vec<T>> {
    let bindings = ColumnBindings::resolve::<T>(cursor.columns())?;

    if !cursor.has_rows() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    while let Some(values) = cursor.next_row().await? {
        records.push(bindings.materialize::<T>(values)?);
    }
    Ok(records)
}
