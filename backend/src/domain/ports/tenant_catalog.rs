//! Port abstraction for the tenant catalog.
//!
//! Catalog handles are scoped resources: a [`TenantCatalogFactory`] hands out
//! one handle per operation and the handle releases its underlying connection
//! when dropped, so every exit path (including `?` propagation) returns it.

use async_trait::async_trait;

use crate::domain::{TenantId, TenantRecord};

use super::define_port_error;

define_port_error! {
    /// Errors raised by tenant catalog adapters.
    pub enum TenantCatalogError {
        /// Catalog connection could not be established.
        Connection { message: String } => "tenant catalog connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "tenant catalog query failed: {message}",
        /// A record with this tenant id already exists.
        DuplicateTenant { tenant_id: TenantId } => "tenant {tenant_id} already exists in the catalog",
    }
}

/// Authoritative store of tenant records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantCatalog: Send {
    /// Persist a new record.
    ///
    /// Fails with [`TenantCatalogError::DuplicateTenant`] if the id exists.
    async fn add(&mut self, record: &TenantRecord) -> Result<(), TenantCatalogError>;

    /// Fetch a record by tenant id.
    async fn get_by_id(
        &mut self,
        tenant_id: &TenantId,
    ) -> Result<Option<TenantRecord>, TenantCatalogError>;
}

/// Source of scoped catalog handles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantCatalogFactory: Send + Sync {
    /// Acquire a catalog handle for one operation.
    async fn create_catalog(&self) -> Result<Box<dyn TenantCatalog>, TenantCatalogError>;
}
