//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL shard-map store and tenant catalog (Diesel)
//! - **driver**: unpooled PostgreSQL connections to tenant shards
//! - **memory**: in-process adapters with the stores' uniqueness semantics
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod driver;
pub mod memory;
pub mod persistence;
