//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the shard-map store and tenant catalog ports,
//! backed by PostgreSQL via `diesel-async` and `bb8` connection pooling.
//!
//! - **Thin adapters**: implementations only translate between Diesel rows
//!   and domain types. Provisioning logic lives in the domain services.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Strongly typed errors**: unique violations become the duplicate
//!   variants of each port error; everything else is a connection or query
//!   error.
//!
//! # Example
//!
//! ```ignore
//! use tenant_router::outbound::persistence::{DbPool, DieselTenantCatalogFactory, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/tenant_catalog")).await?;
//! let catalogs = DieselTenantCatalogFactory::new(pool);
//! ```

mod diesel_error_mapping;
mod diesel_shard_map;
mod diesel_tenant_catalog;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_shard_map::{DieselShardMap, DieselShardMapManager};
pub use diesel_tenant_catalog::{DieselTenantCatalog, DieselTenantCatalogFactory};
pub use migrations::{MigrationError, run_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
