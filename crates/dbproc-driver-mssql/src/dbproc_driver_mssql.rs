//! MS SQL Server driver for dbproc
//!
//! Implements [`dbproc_core::Connection`] over tiberius. Procedures run as
//! `EXEC` statements with positionally bound parameters, and the first
//! result set is streamed to the caller row by row.

mod connection;
mod cursor;
mod runtime;
mod statement;

#[cfg(test)]
mod connection_tests;
#[cfg(test)]
mod cursor_tests;
#[cfg(test)]
mod statement_tests;

pub use connection::{MssqlConnection, MssqlConnectionError};
