//! Port abstraction for the authoritative tenant-key → shard registry.
//!
//! The backing store enforces two uniqueness rules that the provisioning
//! algorithm relies on: one shard per [`ShardLocation`] and one point mapping
//! per tenant key. Adapters must surface violations of either rule as
//! [`ShardMapError::DuplicateShard`] and [`ShardMapError::MappingConflict`]
//! respectively, never as a generic query failure.

use async_trait::async_trait;

use crate::domain::{Credentials, PointMapping, Shard, ShardLocation, TenantId};

use super::ShardConnection;
use super::define_port_error;

define_port_error! {
    /// Errors raised by shard map adapters.
    pub enum ShardMapError {
        /// Map store connection could not be established.
        Connection { message: String } => "shard map store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "shard map store query failed: {message}",
        /// A shard already exists at the location.
        DuplicateShard { location: ShardLocation } => "a shard is already registered at {location}",
        /// The tenant key is already mapped.
        MappingConflict { tenant_id: TenantId, existing: ShardLocation } =>
            "tenant {tenant_id} is already mapped to {existing}",
        /// No point mapping exists for the tenant key.
        UnmappedKey { tenant_id: TenantId } => "no point mapping exists for tenant {tenant_id}",
        /// A list shard map with this name already exists.
        DuplicateMap { name: String } => "shard map {name} already exists",
        /// The transport connection to the resolved shard failed.
        Driver { message: String } => "opening shard connection failed: {message}",
    }
}

/// List shard map keyed by tenant identifier.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShardMap: Send + Sync {
    /// Point lookup by tenant key. Never provisions.
    async fn lookup(&self, tenant_id: &TenantId) -> Result<Option<PointMapping>, ShardMapError>;

    /// Lookup by physical location.
    async fn get_shard_by_location(
        &self,
        location: &ShardLocation,
    ) -> Result<Option<Shard>, ShardMapError>;

    /// Register a new shard at `location`.
    ///
    /// Fails with [`ShardMapError::DuplicateShard`] when a shard already
    /// exists there.
    async fn create_shard(&self, location: &ShardLocation) -> Result<Shard, ShardMapError>;

    /// Bind `tenant_id` to `shard`.
    ///
    /// Fails with [`ShardMapError::MappingConflict`] when the key is already
    /// mapped, carrying the location of the existing mapping.
    async fn create_point_mapping(
        &self,
        tenant_id: &TenantId,
        shard: &Shard,
    ) -> Result<PointMapping, ShardMapError>;

    /// Resolve `tenant_id` and open a transport connection to its shard.
    ///
    /// Fails with [`ShardMapError::UnmappedKey`] when no mapping exists.
    async fn open_connection_for_key(
        &self,
        tenant_id: &TenantId,
        credentials: &Credentials,
    ) -> Result<Box<dyn ShardConnection>, ShardMapError>;
}
