//! PostgreSQL transport adapter for tenant shards.
//!
//! Shard connections are opened per resolution and owned by the caller, so
//! they are established directly rather than drawn from a pool.

mod pg_shard_connector;

pub use pg_shard_connector::{PgShardConnection, PgShardConnector, shard_database_url};
