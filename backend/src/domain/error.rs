//! Domain-level error types.
//!
//! Port errors are wrapped into these enums at the service that observed
//! them. [`TenantConnectionError`] is what callers of the router see: each
//! variant identifies the tenant, the [`ResolutionStep`] reached, and whether
//! retrying the whole resolution is worthwhile.

use std::time::Duration;

use super::{DeadlineExceeded, ResolutionStep, ShardLocation, TenantId};

/// Failures of the provisioning composites in
/// [`crate::domain::TenantManagementService`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TenantManagementError {
    /// The shard map could not be opened or created at start-up.
    #[error("shard map {name} is not available")]
    ShardMapUnavailable { name: String },
    /// Creating or fetching the shard for a plan failed.
    #[error("provisioning shard at {location} for plan {service_plan} failed: {message}")]
    ShardProvisioning {
        location: ShardLocation,
        service_plan: String,
        message: String,
    },
    /// The tenant already points at a different shard.
    #[error("tenant {tenant_id} is mapped to {existing}, not {requested}")]
    MappingConflict {
        tenant_id: TenantId,
        existing: ShardLocation,
        requested: ShardLocation,
    },
    /// The mapping was written but the catalog record was not.
    #[error(
        "tenant {tenant_id} was mapped to {location} but its catalog record was not written: {message}"
    )]
    PartialRegistration {
        tenant_id: TenantId,
        location: ShardLocation,
        message: String,
    },
    /// A catalog record with the same key but different details exists.
    #[error("tenant {tenant_id} already exists in the catalog with different details")]
    CatalogConflict { tenant_id: TenantId },
    /// Reading the shard map failed.
    #[error("shard map lookup for tenant {tenant_id} failed: {message}")]
    Lookup { tenant_id: TenantId, message: String },
    /// Reading or writing the tenant catalog failed.
    #[error("tenant catalog access for tenant {tenant_id} failed: {message}")]
    Catalog { tenant_id: TenantId, message: String },
    /// A store call exceeded the step timeout.
    #[error(transparent)]
    Timeout(#[from] DeadlineExceeded),
}

/// Failures surfaced by [`crate::domain::TenantConnectionService`].
///
/// No variant carries a connection: a failed resolution never hands one out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TenantConnectionError {
    #[error("tenant id could not be determined: {message}")]
    TenantIdUnavailable { message: String },
    #[error("no tenant found with sharding key {tenant_id}")]
    TenantNotFound { tenant_id: TenantId },
    #[error("tenant catalog unavailable while resolving {tenant_id}: {message}")]
    Catalog { tenant_id: TenantId, message: String },
    #[error("shard map lookup for {tenant_id} failed during {step}: {message}")]
    Lookup {
        tenant_id: TenantId,
        step: ResolutionStep,
        message: String,
    },
    #[error("failed to provision shard for tenant {tenant_id}: {message}")]
    ShardProvisioning { tenant_id: TenantId, message: String },
    #[error("no shard available for tenant {tenant_id} during {step}")]
    ShardNotFound {
        tenant_id: TenantId,
        step: ResolutionStep,
    },
    #[error("failed to register shard for tenant {tenant_id}: {reason}")]
    ShardRegistrationFailed { tenant_id: TenantId, reason: String },
    #[error(
        "tenant {tenant_id} is mapped to {location} without a catalog record; manual reconciliation required: {message}"
    )]
    PartialRegistration {
        tenant_id: TenantId,
        location: ShardLocation,
        message: String,
    },
    #[error("tenant {tenant_id} is mapped to {existing}, expected {requested}")]
    MappingConflict {
        tenant_id: TenantId,
        existing: ShardLocation,
        requested: ShardLocation,
    },
    /// The catalog holds a different record under this key.
    #[error(
        "tenant {tenant_id} already exists in the catalog with different details; manual reconciliation required"
    )]
    CatalogConflict { tenant_id: TenantId },
    #[error("failed to open a connection for tenant {tenant_id}: {message}")]
    Connection { tenant_id: TenantId, message: String },
    #[error("failed to set the isolation context for tenant {tenant_id}: {message}")]
    IsolationContext { tenant_id: TenantId, message: String },
    #[error("{step} for tenant {tenant_id} timed out after {after:?}")]
    Timeout {
        tenant_id: TenantId,
        step: ResolutionStep,
        after: Duration,
    },
}

impl TenantConnectionError {
    /// Tenant the failed resolution was for, when known.
    pub fn tenant_id(&self) -> Option<&TenantId> {
        match self {
            Self::TenantIdUnavailable { .. } => None,
            Self::TenantNotFound { tenant_id }
            | Self::Catalog { tenant_id, .. }
            | Self::Lookup { tenant_id, .. }
            | Self::ShardProvisioning { tenant_id, .. }
            | Self::ShardNotFound { tenant_id, .. }
            | Self::ShardRegistrationFailed { tenant_id, .. }
            | Self::PartialRegistration { tenant_id, .. }
            | Self::MappingConflict { tenant_id, .. }
            | Self::CatalogConflict { tenant_id }
            | Self::Connection { tenant_id, .. }
            | Self::IsolationContext { tenant_id, .. }
            | Self::Timeout { tenant_id, .. } => Some(tenant_id),
        }
    }

    /// Phase of the resolution that failed.
    pub fn step(&self) -> ResolutionStep {
        match self {
            Self::TenantIdUnavailable { .. } => ResolutionStep::IdentifyTenant,
            Self::TenantNotFound { .. } | Self::Catalog { .. } => ResolutionStep::FetchTenant,
            Self::Lookup { step, .. }
            | Self::ShardNotFound { step, .. }
            | Self::Timeout { step, .. } => *step,
            Self::ShardProvisioning { .. } => ResolutionStep::ProvisionShard,
            Self::ShardRegistrationFailed { .. }
            | Self::PartialRegistration { .. }
            | Self::MappingConflict { .. }
            | Self::CatalogConflict { .. } => ResolutionStep::Register,
            Self::Connection { .. } => ResolutionStep::Open,
            Self::IsolationContext { .. } => ResolutionStep::InjectContext,
        }
    }

    /// Whether retrying the whole resolution may succeed.
    ///
    /// Absent tenants, conflicting or partial state and isolation failures
    /// need an operator or a different request; everything else is transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::TenantIdUnavailable { .. }
                | Self::TenantNotFound { .. }
                | Self::PartialRegistration { .. }
                | Self::MappingConflict { .. }
                | Self::CatalogConflict { .. }
                | Self::IsolationContext { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tenant() -> TenantId {
        TenantId::new("3fa85f64-5717-4562-b3fc-2c963f66afa6").expect("valid id")
    }

    #[rstest]
    #[case(TenantConnectionError::TenantNotFound { tenant_id: tenant() }, ResolutionStep::FetchTenant, false)]
    #[case(
        TenantConnectionError::Timeout { tenant_id: tenant(), step: ResolutionStep::Open, after: Duration::from_secs(1) },
        ResolutionStep::Open,
        true
    )]
    #[case(
        TenantConnectionError::ShardNotFound { tenant_id: tenant(), step: ResolutionStep::ReLookup },
        ResolutionStep::ReLookup,
        true
    )]
    #[case(
        TenantConnectionError::ShardRegistrationFailed { tenant_id: tenant(), reason: "store offline".into() },
        ResolutionStep::Register,
        true
    )]
    #[case(
        TenantConnectionError::CatalogConflict { tenant_id: tenant() },
        ResolutionStep::Register,
        false
    )]
    #[case(
        TenantConnectionError::IsolationContext { tenant_id: tenant(), message: "denied".into() },
        ResolutionStep::InjectContext,
        false
    )]
    fn errors_report_step_and_retryability(
        #[case] error: TenantConnectionError,
        #[case] step: ResolutionStep,
        #[case] retryable: bool,
    ) {
        assert_eq!(error.step(), step);
        assert_eq!(error.is_retryable(), retryable);
        assert_eq!(error.tenant_id(), Some(&tenant()));
    }

    #[rstest]
    fn not_found_message_names_the_key() {
        let error = TenantConnectionError::TenantNotFound { tenant_id: tenant() };
        assert_eq!(
            error.to_string(),
            "no tenant found with sharding key 3fa85f64-5717-4562-b3fc-2c963f66afa6"
        );
    }
}
