//! Idempotent shard provisioning and tenant registration.
//!
//! Both composites are check-then-act sequences that are not protected by a
//! lock. Concurrent callers can race between the check and the act; the
//! backing stores reject the loser with a uniqueness error, and this service
//! turns that error back into success when the state now in the store is the
//! state the caller wanted. Retrying either composite after a partial failure
//! converges instead of duplicating shards or mappings.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::ports::{
    ShardMap, ShardMapError, ShardMapSlot, TenantCatalog, TenantCatalogError,
    TenantCatalogFactory,
};
use super::{
    DEFAULT_STEP_TIMEOUT, DeadlineExceeded, ExistingMappingPolicy, PointMapping, Shard,
    ShardLocation, TenantId, TenantManagementError, TenantRecord, within,
};

/// Result of [`TenantManagementService::reconcile_registration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Mapping and catalog record both exist and agree.
    AlreadyConsistent,
    /// The mapping existed without its catalog record; the record was added.
    CatalogRecordRestored,
    /// No mapping exists; nothing to repair.
    MappingMissing,
}

/// Service owning the resolve-or-provision building blocks.
pub struct TenantManagementService<M, C> {
    shard_map: ShardMapSlot<M>,
    catalogs: Arc<C>,
    existing_mapping_policy: ExistingMappingPolicy,
    step_timeout: Duration,
}

impl<M, C> Clone for TenantManagementService<M, C> {
    fn clone(&self) -> Self {
        Self {
            shard_map: self.shard_map.clone(),
            catalogs: Arc::clone(&self.catalogs),
            existing_mapping_policy: self.existing_mapping_policy,
            step_timeout: self.step_timeout,
        }
    }
}

impl<M, C> TenantManagementService<M, C> {
    /// Create a service over a shard map slot and catalog factory.
    pub fn new(shard_map: ShardMapSlot<M>, catalogs: Arc<C>) -> Self {
        Self {
            shard_map,
            catalogs,
            existing_mapping_policy: ExistingMappingPolicy::default(),
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    /// Choose how registration treats a mapping that already exists.
    #[must_use]
    pub fn with_existing_mapping_policy(mut self, policy: ExistingMappingPolicy) -> Self {
        self.existing_mapping_policy = policy;
        self
    }

    /// Deadline applied to each shard-map and catalog call.
    #[must_use]
    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    /// Slot holding the shard map, or the reason it is unavailable.
    pub fn shard_map(&self) -> &ShardMapSlot<M> {
        &self.shard_map
    }

    async fn bounded<F: Future>(
        &self,
        operation: &'static str,
        future: F,
    ) -> Result<F::Output, DeadlineExceeded> {
        within(operation, self.step_timeout, future).await
    }
}

impl<M, C> TenantManagementService<M, C>
where
    M: ShardMap,
    C: TenantCatalogFactory,
{
    /// Return the shard at `(server, partition_name, port)`, creating it when
    /// no shard is registered there.
    ///
    /// Repeated calls with the same arguments return the same shard. A
    /// concurrent creation that wins the race is adopted, not duplicated.
    pub async fn create_new_shard(
        &self,
        partition_name: &str,
        server: &str,
        port: u16,
        service_plan: &str,
    ) -> Result<Shard, TenantManagementError> {
        let Some(map) = self.shard_map.get() else {
            error!(shard_map = self.shard_map.name(), "no shard map available for creating new shard");
            return Err(TenantManagementError::ShardMapUnavailable {
                name: self.shard_map.name().to_owned(),
            });
        };
        let location = ShardLocation::tcp(server, partition_name, port);
        let provisioning_error = |message: String| TenantManagementError::ShardProvisioning {
            location: location.clone(),
            service_plan: service_plan.to_owned(),
            message,
        };

        let existing = self
            .bounded("shard_map.get_shard_by_location", map.get_shard_by_location(&location))
            .await?
            .map_err(|err| provisioning_error(err.to_string()))?;
        if let Some(shard) = existing {
            debug!(%location, "shard already registered");
            return Ok(shard);
        }

        match self
            .bounded("shard_map.create_shard", map.create_shard(&location))
            .await?
        {
            Ok(shard) => {
                info!(%location, service_plan, shard_id = %shard.id(), "created shard");
                Ok(shard)
            }
            Err(ShardMapError::DuplicateShard { .. }) => {
                debug!(%location, "shard created concurrently; adopting it");
                self.bounded("shard_map.get_shard_by_location", map.get_shard_by_location(&location))
                    .await?
                    .map_err(|err| provisioning_error(err.to_string()))?
                    .ok_or_else(|| {
                        provisioning_error("store reported a duplicate shard it cannot find".to_owned())
                    })
            }
            Err(err) => {
                error!(%location, service_plan, error = %err, "shard creation failed");
                Err(provisioning_error(err.to_string()))
            }
        }
    }

    /// Map `tenant_id` to `shard` and record the tenant in the catalog.
    ///
    /// Returns `Ok(true)` once the mapping exists, including when it existed
    /// before the call; in that case the catalog is not written. Returns
    /// `Ok(false)` for failures that left no state behind. A mapping created
    /// without its catalog record is reported as
    /// [`TenantManagementError::PartialRegistration`].
    pub async fn register_new_shard(
        &self,
        tenant_id: &TenantId,
        tenant_name: &str,
        service_plan: &str,
        shard: &Shard,
    ) -> Result<bool, TenantManagementError> {
        let Some(map) = self.shard_map.get() else {
            error!(shard_map = self.shard_map.name(), "no shard map available for registering new shard");
            return Ok(false);
        };
        let record = match TenantRecord::new(tenant_id.clone(), tenant_name, service_plan) {
            Ok(record) => record,
            Err(err) => {
                warn!(%tenant_id, error = %err, "refusing to register invalid tenant record");
                return Ok(false);
            }
        };

        match self.bounded("shard_map.lookup", map.lookup(tenant_id)).await? {
            Ok(Some(existing)) => {
                return self.accept_existing_mapping(tenant_id, existing.shard().location(), shard);
            }
            Ok(None) => {}
            Err(err) => {
                error!(%tenant_id, error = %err, "error in registering new shard");
                return Ok(false);
            }
        }

        match self
            .bounded("shard_map.create_point_mapping", map.create_point_mapping(tenant_id, shard))
            .await?
        {
            Ok(mapping) => {
                info!(%tenant_id, location = %mapping.shard().location(), "created point mapping");
            }
            Err(ShardMapError::MappingConflict { existing, .. }) => {
                debug!(%tenant_id, %existing, "point mapping created concurrently");
                self.accept_existing_mapping(tenant_id, &existing, shard)?;
            }
            Err(err) => {
                error!(%tenant_id, error = %err, "error in registering new shard");
                return Ok(false);
            }
        }

        match self.write_catalog_record(&record).await {
            Ok(()) => Ok(true),
            Err(CatalogWrite::Conflict) => Err(TenantManagementError::CatalogConflict {
                tenant_id: tenant_id.clone(),
            }),
            Err(CatalogWrite::Failed(message)) => {
                error!(
                    %tenant_id,
                    location = %shard.location(),
                    error = %message,
                    "tenant mapped without catalog record; manual reconciliation required"
                );
                Err(TenantManagementError::PartialRegistration {
                    tenant_id: tenant_id.clone(),
                    location: shard.location().clone(),
                    message,
                })
            }
        }
    }

    /// Point lookup; absent when the key is unmapped or the shard map was
    /// never initialised.
    pub async fn try_get_mapping(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<PointMapping>, TenantManagementError> {
        let Some(map) = self.shard_map.get() else {
            debug!(%tenant_id, shard_map = self.shard_map.name(), "shard map unavailable; no mapping");
            return Ok(None);
        };
        self.bounded("shard_map.lookup", map.lookup(tenant_id))
            .await?
            .map_err(|err| TenantManagementError::Lookup {
                tenant_id: tenant_id.clone(),
                message: err.to_string(),
            })
    }

    /// Restore the catalog record of a tenant left partially registered.
    pub async fn reconcile_registration(
        &self,
        record: &TenantRecord,
    ) -> Result<ReconcileOutcome, TenantManagementError> {
        let tenant_id = record.tenant_id();
        let Some(map) = self.shard_map.get() else {
            return Err(TenantManagementError::ShardMapUnavailable {
                name: self.shard_map.name().to_owned(),
            });
        };
        let mapping = self
            .bounded("shard_map.lookup", map.lookup(tenant_id))
            .await?
            .map_err(|err| TenantManagementError::Lookup {
                tenant_id: tenant_id.clone(),
                message: err.to_string(),
            })?;
        if mapping.is_none() {
            return Ok(ReconcileOutcome::MappingMissing);
        }

        let catalog_error = |err: TenantCatalogError| TenantManagementError::Catalog {
            tenant_id: tenant_id.clone(),
            message: err.to_string(),
        };
        let mut catalog = self
            .bounded("catalog.acquire", self.catalogs.create_catalog())
            .await?
            .map_err(catalog_error)?;
        let current = self
            .bounded("catalog.get_by_id", catalog.get_by_id(tenant_id))
            .await?
            .map_err(catalog_error)?;
        drop(catalog);

        match current {
            Some(existing) if existing == *record => Ok(ReconcileOutcome::AlreadyConsistent),
            Some(_) => Err(TenantManagementError::CatalogConflict {
                tenant_id: tenant_id.clone(),
            }),
            None => match self.write_catalog_record(record).await {
                Ok(()) => {
                    info!(%tenant_id, "restored missing catalog record");
                    Ok(ReconcileOutcome::CatalogRecordRestored)
                }
                Err(CatalogWrite::Conflict) => Err(TenantManagementError::CatalogConflict {
                    tenant_id: tenant_id.clone(),
                }),
                Err(CatalogWrite::Failed(message)) => Err(TenantManagementError::Catalog {
                    tenant_id: tenant_id.clone(),
                    message,
                }),
            },
        }
    }

    fn accept_existing_mapping(
        &self,
        tenant_id: &TenantId,
        existing: &ShardLocation,
        requested: &Shard,
    ) -> Result<bool, TenantManagementError> {
        if existing == requested.location() {
            debug!(%tenant_id, location = %existing, "tenant already registered");
            return Ok(true);
        }
        match self.existing_mapping_policy {
            ExistingMappingPolicy::Trust => {
                warn!(
                    %tenant_id,
                    %existing,
                    requested = %requested.location(),
                    "tenant mapped to a different shard; keeping existing mapping"
                );
                Ok(true)
            }
            ExistingMappingPolicy::Verify => {
                warn!(
                    %tenant_id,
                    %existing,
                    requested = %requested.location(),
                    "tenant mapped to a different shard"
                );
                Err(TenantManagementError::MappingConflict {
                    tenant_id: tenant_id.clone(),
                    existing: existing.clone(),
                    requested: requested.location().clone(),
                })
            }
        }
    }

    /// Add `record`, treating an identical pre-existing record as success.
    ///
    /// The catalog handle is dropped before returning on every path.
    async fn write_catalog_record(&self, record: &TenantRecord) -> Result<(), CatalogWrite> {
        let tenant_id = record.tenant_id();
        let mut catalog: Box<dyn TenantCatalog> =
            match self.bounded("catalog.acquire", self.catalogs.create_catalog()).await {
                Ok(Ok(catalog)) => catalog,
                Ok(Err(err)) => return Err(CatalogWrite::Failed(err.to_string())),
                Err(elapsed) => return Err(CatalogWrite::Failed(elapsed.to_string())),
            };

        match self.bounded("catalog.add", catalog.add(record)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(TenantCatalogError::DuplicateTenant { .. })) => {
                match self.bounded("catalog.get_by_id", catalog.get_by_id(tenant_id)).await {
                    Ok(Ok(Some(existing))) if existing == *record => {
                        debug!(%tenant_id, "catalog record already present");
                        Ok(())
                    }
                    Ok(Ok(Some(_))) => Err(CatalogWrite::Conflict),
                    Ok(Ok(None)) => Err(CatalogWrite::Failed(
                        "catalog reported a duplicate tenant it cannot find".to_owned(),
                    )),
                    Ok(Err(err)) => Err(CatalogWrite::Failed(err.to_string())),
                    Err(elapsed) => Err(CatalogWrite::Failed(elapsed.to_string())),
                }
            }
            Ok(Err(err)) => Err(CatalogWrite::Failed(err.to_string())),
            Err(elapsed) => Err(CatalogWrite::Failed(elapsed.to_string())),
        }
    }
}

enum CatalogWrite {
    Conflict,
    Failed(String),
}

#[cfg(test)]
#[path = "tenant_management_service_tests.rs"]
mod tests;
