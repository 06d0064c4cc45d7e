//! Resolve-or-provision entry point handing out isolated tenant connections.
//!
//! The hot path is a single point lookup followed by opening the mapped
//! shard. On a miss the service provisions: it reads the tenant's catalog
//! record, gets or creates the shard for the tenant's service plan, maps the
//! tenant to it and looks the mapping up again. Whichever path is taken, the
//! tenant isolation context is set on the session before the connection is
//! returned; a connection whose context could not be set is dropped.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::ports::{
    ShardMap, ShardMapError, TenantCatalogError, TenantCatalogFactory, TenantIdProvider,
};
use super::{
    ConnectionOptions, DeadlineExceeded, PointMapping, ResolutionStep, SET_SESSION_CONTEXT_SQL,
    TenantConnection, TenantConnectionError, TenantId, TenantManagementError,
    TenantManagementService, TenantRecord, isolation_params, within,
};

/// Service resolving tenant keys to isolated shard connections.
pub struct TenantConnectionService<M, C> {
    management: TenantManagementService<M, C>,
    catalogs: Arc<C>,
    options: ConnectionOptions,
}

impl<M, C> Clone for TenantConnectionService<M, C> {
    fn clone(&self) -> Self {
        Self {
            management: self.management.clone(),
            catalogs: Arc::clone(&self.catalogs),
            options: self.options.clone(),
        }
    }
}

impl<M, C> TenantConnectionService<M, C>
where
    M: ShardMap,
    C: TenantCatalogFactory,
{
    /// Build a service over `management`, reading tenant records through
    /// `catalogs` when a tenant has no mapping yet.
    pub fn new(
        management: TenantManagementService<M, C>,
        catalogs: Arc<C>,
        options: ConnectionOptions,
    ) -> Self {
        Self {
            management,
            catalogs,
            options,
        }
    }

    /// Provisioning composites shared with this service.
    pub fn management(&self) -> &TenantManagementService<M, C> {
        &self.management
    }

    /// Return a connection to the shard holding `tenant_id`, provisioning
    /// the shard and mapping on first use.
    ///
    /// The returned connection already carries the tenant key in its
    /// session context.
    pub async fn resolve_connection(
        &self,
        tenant_id: &TenantId,
    ) -> Result<TenantConnection, TenantConnectionError> {
        let mapping = self
            .management
            .try_get_mapping(tenant_id)
            .await
            .map_err(|err| management_error(tenant_id, ResolutionStep::Lookup, err))?;

        match mapping {
            Some(mapping) => {
                debug!(%tenant_id, location = %mapping.shard().location(), "tenant mapping found");
            }
            None => {
                info!(%tenant_id, "no shard mapping for tenant; provisioning");
                let mapping = self.provision(tenant_id).await?;
                info!(%tenant_id, location = %mapping.shard().location(), "tenant provisioned");
            }
        }

        self.open_isolated(tenant_id).await
    }

    /// Resolve the tenant supplied by `provider`.
    pub async fn resolve_current_connection<P>(
        &self,
        provider: &P,
    ) -> Result<TenantConnection, TenantConnectionError>
    where
        P: TenantIdProvider + ?Sized,
    {
        let tenant_id = provider.current_tenant_id().await.map_err(|err| {
            warn!(error = %err, "tenant id unavailable");
            TenantConnectionError::TenantIdUnavailable {
                message: err.to_string(),
            }
        })?;
        self.resolve_connection(&tenant_id).await
    }

    async fn provision(&self, tenant_id: &TenantId) -> Result<PointMapping, TenantConnectionError> {
        let record = self.fetch_tenant(tenant_id).await?;
        let tenant_options = &self.options.tenant;
        let partition_name = tenant_options.partition_name_for(record.service_plan());

        let shard = self
            .management
            .create_new_shard(
                &partition_name,
                tenant_options.database_server(),
                tenant_options.database_port(),
                record.service_plan(),
            )
            .await
            .map_err(|err| management_error(tenant_id, ResolutionStep::ProvisionShard, err))?;

        let registered = self
            .management
            .register_new_shard(
                tenant_id,
                record.tenant_name(),
                record.service_plan(),
                &shard,
            )
            .await
            .map_err(|err| management_error(tenant_id, ResolutionStep::Register, err))?;
        if !registered {
            error!(%tenant_id, location = %shard.location(), "shard registration failed");
            return Err(TenantConnectionError::ShardRegistrationFailed {
                tenant_id: tenant_id.clone(),
                reason: format!("mapping to {} was not created", shard.location()),
            });
        }

        self.management
            .try_get_mapping(tenant_id)
            .await
            .map_err(|err| management_error(tenant_id, ResolutionStep::ReLookup, err))?
            .ok_or_else(|| TenantConnectionError::ShardNotFound {
                tenant_id: tenant_id.clone(),
                step: ResolutionStep::ReLookup,
            })
    }

    async fn fetch_tenant(&self, tenant_id: &TenantId) -> Result<TenantRecord, TenantConnectionError> {
        let step = ResolutionStep::FetchTenant;
        let catalog_error = |err: TenantCatalogError| TenantConnectionError::Catalog {
            tenant_id: tenant_id.clone(),
            message: err.to_string(),
        };

        let mut catalog = self
            .bounded(tenant_id, step, "catalog.acquire", self.catalogs.create_catalog())
            .await?
            .map_err(catalog_error)?;
        let record = self
            .bounded(tenant_id, step, "catalog.get_by_id", catalog.get_by_id(tenant_id))
            .await?
            .map_err(catalog_error)?;

        record.ok_or_else(|| {
            warn!(%tenant_id, "tenant not found in catalog");
            TenantConnectionError::TenantNotFound {
                tenant_id: tenant_id.clone(),
            }
        })
    }

    async fn open_isolated(
        &self,
        tenant_id: &TenantId,
    ) -> Result<TenantConnection, TenantConnectionError> {
        let Some(map) = self.management.shard_map().get() else {
            error!(%tenant_id, "shard map unavailable when opening connection");
            return Err(TenantConnectionError::ShardNotFound {
                tenant_id: tenant_id.clone(),
                step: ResolutionStep::Open,
            });
        };

        let opened = self
            .bounded(
                tenant_id,
                ResolutionStep::Open,
                "shard_map.open_connection_for_key",
                map.open_connection_for_key(tenant_id, &self.options.credentials),
            )
            .await?;
        let mut connection = match opened {
            Ok(connection) => connection,
            Err(ShardMapError::UnmappedKey { .. }) => {
                return Err(TenantConnectionError::ShardNotFound {
                    tenant_id: tenant_id.clone(),
                    step: ResolutionStep::Open,
                });
            }
            Err(err) => {
                error!(%tenant_id, error = %err, "failed to open shard connection");
                return Err(TenantConnectionError::Connection {
                    tenant_id: tenant_id.clone(),
                    message: err.to_string(),
                });
            }
        };

        let params = isolation_params(tenant_id);
        let injected = self
            .bounded(
                tenant_id,
                ResolutionStep::InjectContext,
                "connection.set_session_context",
                connection.execute(SET_SESSION_CONTEXT_SQL, &params),
            )
            .await;
        match injected {
            Ok(Ok(_)) => {
                debug!(%tenant_id, location = %connection.location(), "isolation context set");
                Ok(TenantConnection::isolated(tenant_id.clone(), connection))
            }
            Ok(Err(err)) => {
                error!(%tenant_id, error = %err, "failed to set isolation context; dropping connection");
                drop(connection);
                Err(TenantConnectionError::IsolationContext {
                    tenant_id: tenant_id.clone(),
                    message: err.to_string(),
                })
            }
            Err(timeout) => {
                error!(%tenant_id, error = %timeout.error, "isolation context timed out; dropping connection");
                drop(connection);
                Err(timeout.into())
            }
        }
    }

    async fn bounded<F: Future>(
        &self,
        tenant_id: &TenantId,
        step: ResolutionStep,
        operation: &'static str,
        future: F,
    ) -> Result<F::Output, StepTimeout> {
        within(operation, self.options.step_timeout, future)
            .await
            .map_err(|error| StepTimeout {
                tenant_id: tenant_id.clone(),
                step,
                error,
            })
    }
}

/// Deadline expiry tagged with the tenant and step it interrupted.
struct StepTimeout {
    tenant_id: TenantId,
    step: ResolutionStep,
    error: DeadlineExceeded,
}

impl From<StepTimeout> for TenantConnectionError {
    fn from(value: StepTimeout) -> Self {
        Self::Timeout {
            tenant_id: value.tenant_id,
            step: value.step,
            after: value.error.after,
        }
    }
}

fn management_error(
    tenant_id: &TenantId,
    step: ResolutionStep,
    error: TenantManagementError,
) -> TenantConnectionError {
    let tenant_id = tenant_id.clone();
    match error {
        TenantManagementError::ShardMapUnavailable { .. } => {
            TenantConnectionError::ShardNotFound { tenant_id, step }
        }
        err @ TenantManagementError::ShardProvisioning { .. } => {
            TenantConnectionError::ShardProvisioning {
                tenant_id,
                message: err.to_string(),
            }
        }
        TenantManagementError::MappingConflict {
            existing,
            requested,
            ..
        } => TenantConnectionError::MappingConflict {
            tenant_id,
            existing,
            requested,
        },
        TenantManagementError::PartialRegistration {
            location, message, ..
        } => TenantConnectionError::PartialRegistration {
            tenant_id,
            location,
            message,
        },
        TenantManagementError::CatalogConflict { .. } => {
            TenantConnectionError::CatalogConflict { tenant_id }
        }
        TenantManagementError::Lookup { message, .. } => TenantConnectionError::Lookup {
            tenant_id,
            step,
            message,
        },
        TenantManagementError::Catalog { message, .. } => {
            TenantConnectionError::Catalog { tenant_id, message }
        }
        TenantManagementError::Timeout(deadline) => TenantConnectionError::Timeout {
            tenant_id,
            step,
            after: deadline.after,
        },
    }
}

#[cfg(test)]
#[path = "tenant_connection_service_tests.rs"]
mod tests;
