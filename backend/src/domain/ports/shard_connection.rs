//! Transport boundary: opening connections to shards and running statements.

use async_trait::async_trait;

use crate::domain::{Credentials, ShardLocation};

use super::define_port_error;

define_port_error! {
    /// Errors raised by transport drivers.
    pub enum DriverError {
        /// The connection could not be opened or was lost.
        Connection { message: String } => "shard connection failed: {message}",
        /// A statement failed on an open connection.
        Execution { message: String } => "statement execution failed: {message}",
    }
}

/// Open transport connection to one shard, exclusively owned by its caller.
#[async_trait]
pub trait ShardConnection: Send {
    /// Location this connection was opened against.
    fn location(&self) -> &ShardLocation;

    /// Execute `statement` with positional text parameters (`$1`, `$2`, ...).
    ///
    /// Returns the number of rows the statement reported.
    async fn execute(&mut self, statement: &str, params: &[String]) -> Result<u64, DriverError>;
}

/// Driver opening unpooled connections to shard locations.
#[async_trait]
pub trait ShardConnector: Send + Sync {
    /// Open a fresh session on `location` as the user in `credentials`.
    async fn open(
        &self,
        location: &ShardLocation,
        credentials: &Credentials,
    ) -> Result<Box<dyn ShardConnection>, DriverError>;
}
