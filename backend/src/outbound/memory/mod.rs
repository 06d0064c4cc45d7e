//! In-process adapters for every driven port.
//!
//! They enforce the same uniqueness rules as the PostgreSQL stores and expose
//! fault injection and inspection hooks, so the resolution algorithm can be
//! exercised end to end without a database.

mod shard_connector;
mod shard_map;
mod tenant_catalog;

pub use shard_connector::{InMemoryShardConnection, InMemoryShardConnector, RecordedSession};
pub use shard_map::{InMemoryShardMap, InMemoryShardMapManager, ShardMapOperation};
pub use tenant_catalog::{CatalogOperation, InMemoryTenantCatalog, InMemoryTenantCatalogFactory};
