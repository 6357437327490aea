//! Scoped connection lifetime for a single command execution

use dbproc_core::{Connection, ConnectionState, Result};
use std::sync::Arc;

/// Keeps a connection open for the duration of one execution.
///
/// The connection is closed exactly once: by [`ConnectionGuard::release`] on
/// the success path, or by `Drop` on every other exit (error return, panic
/// unwind, dropped future, abandoned iterator).
pub struct ConnectionGuard {
    connection: Arc<dyn Connection>,
    released: bool,
}

impl ConnectionGuard {
    /// Open the connection if it is not open yet and take ownership of closing it
    pub async fn open(connection: Arc<dyn Connection>) -> Result<Self> {
        if connection.state() != ConnectionState::Open {
            connection.open().await?;
        }
        Ok(Self::armed(connection))
    }

    /// Blocking counterpart of [`ConnectionGuard::open`]
    pub fn open_blocking(connection: Arc<dyn Connection>) -> Result<Self> {
        if connection.state() != ConnectionState::Open {
            connection.open_blocking()?;
        }
        Ok(Self::armed(connection))
    }

    fn armed(connection: Arc<dyn Connection>) -> Self {
        tracing::trace!(driver = %connection.driver_name(), "connection guard armed");
        Self {
            connection,
            released: false,
        }
    }

    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    /// Close the connection now and report the outcome
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.connection.close()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.connection.close() {
            tracing::warn!(
                driver = %self.connection.driver_name(),
                error = %e,
                "failed to close connection during cleanup"
            );
        }
    }
}
