//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports cover the three external collaborators of the router: the
//! shard-map store, the tenant catalog and the transport driver.

mod macros;
pub(crate) use macros::define_port_error;

mod shard_connection;
mod shard_map;
mod shard_map_manager;
mod tenant_catalog;
mod tenant_id_provider;

pub use shard_connection::{DriverError, ShardConnection, ShardConnector};
#[cfg(test)]
pub use shard_map::MockShardMap;
pub use shard_map::{ShardMap, ShardMapError};
pub use shard_map_manager::{ShardMapManager, ShardMapSlot};
#[cfg(test)]
pub use tenant_catalog::{MockTenantCatalog, MockTenantCatalogFactory};
pub use tenant_catalog::{TenantCatalog, TenantCatalogError, TenantCatalogFactory};
#[cfg(test)]
pub use tenant_id_provider::MockTenantIdProvider;
pub use tenant_id_provider::{FixedTenantIdProvider, TenantIdProvider, TenantIdProviderError};
