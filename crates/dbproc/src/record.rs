//! Target record descriptors and strict value assignment
//!
//! A record type declares which of its fields take part in row mapping and
//! which column each field reads from. The [`impl_record!`](crate::impl_record)
//! macro generates the declaration for a plain struct:
//!
//! ```ignore
//! #[derive(Debug, Default)]
//! struct User {
//!     id: i32,
//!     name: Option<String>,
//!     email: Option<String>,
//! }
//!
//! dbproc::impl_record!(User { id, name, email => "EmailAddress" });
//! ```
//!
//! Column names are matched case-insensitively, so `id` binds to a column
//! named `ID` or `Id`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use dbproc_core::{MappingError, Value};
use uuid::Uuid;

/// Association between a record field and the result column it reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Rust field name
    pub field: &'static str,
    /// Column name to match, case-insensitively
    pub column: &'static str,
}

impl FieldDescriptor {
    pub const fn new(field: &'static str, column: &'static str) -> Self {
        Self { field, column }
    }
}

/// A type rows can be mapped into.
///
/// `Default` stands in for the parameterless constructor: every row starts
/// from `T::default()` and only bound fields are overwritten.
pub trait Record: Default + Send {
    /// Mapped fields, in declaration order
    fn fields() -> &'static [FieldDescriptor];

    /// Assign a raw column value to the field named `field`
    fn assign(&mut self, field: &str, value: Value) -> Result<(), MappingError>;
}

/// Strict conversion from a column value to a field type.
///
/// Each implementation accepts exactly one `Value` variant; there is no
/// widening or parsing. `Value::Null` is only accepted by `Option<T>` and
/// `Value` fields.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, MappingError>;
}

fn mismatch(expected: &'static str, value: &Value) -> MappingError {
    if value.is_null() {
        MappingError::UnexpectedNull {
            field: String::new(),
        }
    } else {
        MappingError::TypeMismatch {
            field: String::new(),
            expected,
            found: value.type_name(),
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, MappingError> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(mismatch(stringify!($variant), &other)),
                    }
                }
            }
        )*
    };
}

impl_from_value! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    String => String,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<Utc> => DateTimeUtc,
    serde_json::Value => Json,
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Untyped passthrough, NULL stays `Value::Null`
impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, MappingError> {
        Ok(value)
    }
}

/// Implement [`Record`] for a struct with `Default`.
///
/// List the mapped fields; append `=> "Column"` to read a field from a
/// differently named column.
#[macro_export]
macro_rules! impl_record {
    (@column $field:ident) => {
        stringify!($field)
    };
    (@column $field:ident $column:literal) => {
        $column
    };
    ($ty:ty { $($field:ident $(=> $column:literal)?),+ $(,)? }) => {
        impl $crate::Record for $ty {
            fn fields() -> &'static [$crate::FieldDescriptor] {
                const FIELDS: &[$crate::FieldDescriptor] = &[
                    $($crate::FieldDescriptor::new(
                        stringify!($field),
                        $crate::impl_record!(@column $field $($column)?),
                    )),+
                ];
                FIELDS
            }

            fn assign(
                &mut self,
                field: &str,
                value: $crate::Value,
            ) -> ::std::result::Result<(), $crate::MappingError> {
                match field {
                    $(stringify!($field) => {
                        self.$field = $crate::FromValue::from_value(value)
                            .map_err(|e| e.for_field(stringify!($field)))?;
                        Ok(())
                    })+
                    other => Err($crate::MappingError::UnknownField(other.to_string())),
                }
            }
        }
    };
}
