//! dbproc core - shared abstractions for stored procedure execution
//!
//! This crate provides the traits and types that the executor crate and the
//! drivers depend on:
//!
//! - `Connection` - Trait for driver connections (async and blocking)
//! - `ResultCursor` / `BlockingCursor` - Forward-only result views
//! - `ProcedureCall` - Procedure name plus ordered parameters
//! - Common types like `Value`, `ColumnMeta`, `RowMap`

mod config;
mod connection;
mod cursor;
mod error;
mod procedure;
mod types;

pub use config::*;
pub use connection::*;
pub use cursor::*;
pub use error::*;
pub use procedure::*;
pub use types::*;
