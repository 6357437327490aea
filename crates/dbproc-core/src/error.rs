//! Error types for dbproc

use thiserror::Error;

/// Core error type for stored procedure execution
#[derive(Error, Debug)]
pub enum DbProcError {
    /// The connection could not be opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// The procedure was rejected by the database or failed while running
    #[error("Execution error: {0}")]
    Execution(String),

    /// A result row could not be assigned to the target record
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// A single-pass row sequence was advanced after it had ended
    #[error("Cursor is closed: the result sequence can only be iterated once")]
    CursorClosed,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures raised while assigning column values to record fields
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("field `{field}` expects {expected} but column value is {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("field `{field}` is not nullable but column value is NULL")]
    UnexpectedNull { field: String },

    #[error("field `{field}` matches more than one result column: {}", columns.join(", "))]
    AmbiguousColumn { field: String, columns: Vec<String> },

    #[error("row has no value at ordinal {ordinal} (column `{column}`)")]
    MissingValue { column: String, ordinal: usize },

    #[error("record has no field named `{0}`")]
    UnknownField(String),
}

impl MappingError {
    /// Attach a field name to an error produced by a field-agnostic conversion
    pub fn for_field(self, name: &str) -> Self {
        match self {
            MappingError::TypeMismatch {
                expected, found, ..
            } => MappingError::TypeMismatch {
                field: name.to_string(),
                expected,
                found,
            },
            MappingError::UnexpectedNull { .. } => MappingError::UnexpectedNull {
                field: name.to_string(),
            },
            other => other,
        }
    }
}

/// Result type alias for dbproc operations
pub type Result<T> = std::result::Result<T, DbProcError>;
