//! In-process tenant catalog with handle accounting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::ports::{TenantCatalog, TenantCatalogError, TenantCatalogFactory};
use crate::domain::{TenantId, TenantRecord};

/// Catalog call a fault can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogOperation {
    Acquire,
    Add,
    GetById,
}

#[derive(Default)]
struct CatalogState {
    records: HashMap<TenantId, TenantRecord>,
    faults: HashMap<CatalogOperation, Vec<TenantCatalogError>>,
}

impl CatalogState {
    fn take_fault(&mut self, operation: CatalogOperation) -> Result<(), TenantCatalogError> {
        match self.faults.get_mut(&operation).and_then(Vec::pop) {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }
}

fn lock(state: &Mutex<CatalogState>) -> Result<MutexGuard<'_, CatalogState>, TenantCatalogError> {
    state
        .lock()
        .map_err(|_| TenantCatalogError::query("catalog state poisoned"))
}

/// Factory over a shared in-memory record table.
///
/// Counts handles that have been acquired and not yet dropped.
#[derive(Clone, Default)]
pub struct InMemoryTenantCatalogFactory {
    state: Arc<Mutex<CatalogState>>,
    outstanding: Arc<AtomicUsize>,
}

impl InMemoryTenantCatalogFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record, replacing any record with the same id.
    pub fn insert(&self, record: TenantRecord) {
        if let Ok(mut state) = self.state.lock() {
            state.records.insert(record.tenant_id().clone(), record);
        }
    }

    pub fn record(&self, tenant_id: &TenantId) -> Option<TenantRecord> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.records.get(tenant_id).cloned())
    }

    /// Remove a record, simulating a registration whose catalog write was lost.
    pub fn remove(&self, tenant_id: &TenantId) -> Option<TenantRecord> {
        self.state
            .lock()
            .ok()
            .and_then(|mut state| state.records.remove(tenant_id))
    }

    /// Fail the next call of `operation` with `error`.
    pub fn inject_fault(&self, operation: CatalogOperation, error: TenantCatalogError) {
        if let Ok(mut state) = self.state.lock() {
            state.faults.entry(operation).or_default().push(error);
        }
    }

    /// Handles acquired and not yet dropped.
    pub fn outstanding_handles(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TenantCatalogFactory for InMemoryTenantCatalogFactory {
    async fn create_catalog(&self) -> Result<Box<dyn TenantCatalog>, TenantCatalogError> {
        lock(&self.state)?.take_fault(CatalogOperation::Acquire)?;
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryTenantCatalog {
            state: Arc::clone(&self.state),
            outstanding: Arc::clone(&self.outstanding),
        }))
    }
}

/// Catalog handle; releases its slot in the outstanding count on drop.
pub struct InMemoryTenantCatalog {
    state: Arc<Mutex<CatalogState>>,
    outstanding: Arc<AtomicUsize>,
}

impl Drop for InMemoryTenantCatalog {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TenantCatalog for InMemoryTenantCatalog {
    async fn add(&mut self, record: &TenantRecord) -> Result<(), TenantCatalogError> {
        let mut state = lock(&self.state)?;
        state.take_fault(CatalogOperation::Add)?;
        if state.records.contains_key(record.tenant_id()) {
            return Err(TenantCatalogError::duplicate_tenant(
                record.tenant_id().clone(),
            ));
        }
        state
            .records
            .insert(record.tenant_id().clone(), record.clone());
        Ok(())
    }

    async fn get_by_id(
        &mut self,
        tenant_id: &TenantId,
    ) -> Result<Option<TenantRecord>, TenantCatalogError> {
        let mut state = lock(&self.state)?;
        state.take_fault(CatalogOperation::GetById)?;
        Ok(state.records.get(tenant_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record() -> TenantRecord {
        TenantRecord::new(TenantId::random(), "Harbour Bakery", "standard").expect("valid record")
    }

    #[rstest]
    #[tokio::test]
    async fn handles_are_counted_until_dropped() {
        let factory = InMemoryTenantCatalogFactory::new();
        let first = factory.create_catalog().await.expect("first handle");
        let second = factory.create_catalog().await.expect("second handle");
        assert_eq!(factory.outstanding_handles(), 2);

        drop(first);
        drop(second);
        assert_eq!(factory.outstanding_handles(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let factory = InMemoryTenantCatalogFactory::new();
        let record = record();
        let mut catalog = factory.create_catalog().await.expect("handle");
        catalog.add(&record).await.expect("first add");

        let error = catalog.add(&record).await.expect_err("duplicate");
        assert_eq!(
            error,
            TenantCatalogError::duplicate_tenant(record.tenant_id().clone())
        );
    }

    #[rstest]
    #[tokio::test]
    async fn acquire_faults_do_not_leak_handles() {
        let factory = InMemoryTenantCatalogFactory::new();
        factory.inject_fault(
            CatalogOperation::Acquire,
            TenantCatalogError::connection("pool exhausted"),
        );

        assert!(factory.create_catalog().await.is_err());
        assert_eq!(factory.outstanding_handles(), 0);
    }
}
