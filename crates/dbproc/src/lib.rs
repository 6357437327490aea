//! dbproc - stored procedure execution with typed and dynamic results
//!
//! Build a [`Command`] from a connection, bind parameters, then either map
//! the result rows into records or stream them as ordered column maps:
//!
//! ```ignore
//! use dbproc::{ConnectionExt, impl_record};
//!
//! #[derive(Debug, Default)]
//! struct User {
//!     id: i32,
//!     name: Option<String>,
//!     email: Option<String>,
//! }
//!
//! impl_record!(User { id, name, email });
//!
//! let users: Vec<User> = connection
//!     .create_command("GetUsersById")
//!     .add_params([("id", 7)])
//!     .exec_procedure()
//!     .await?;
//!
//! for row in connection
//!     .create_command("GetUsers")
//!     .exec_procedure_with_dynamic_result()
//! {
//!     println!("{:?}", row?);
//! }
//! ```

mod command;
mod dynamic;
mod guard;
pub mod mapper;
mod record;
mod typed;

pub use command::{Command, ConnectionExt};
pub use dynamic::DynamicRows;
pub use guard::ConnectionGuard;
pub use record::{FieldDescriptor, FromValue, Record};

/// Re-export commonly used types from dbproc-core
pub use dbproc_core::{
    BlockingCursor, BufferedCursor, ColumnMeta, Connection, ConnectionConfig, ConnectionState,
    DbProcError, MappingError, Parameter, ProcedureCall, Result, ResultCursor, RowMap, Value,
};
