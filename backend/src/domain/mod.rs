//! Domain primitives, services and ports of the tenant shard router.
//!
//! Purpose: resolve a tenant key to an open shard connection whose tenant
//! isolation context is already set, provisioning the shard and mapping on
//! first use. Keep types immutable and document invariants in each type's
//! Rustdoc.
//!
//! Public surface:
//! - TenantConnectionService — resolve-or-provision entry point.
//! - TenantManagementService — idempotent shard provisioning and
//!   registration.
//! - TenantConnection — connection with the isolation context set.
//! - TenantId, TenantRecord, ShardLocation, Shard, PointMapping — value
//!   types.
//! - TenantConnectionError, TenantManagementError — failures with the
//!   resolution step reached.

pub mod ports;

mod deadline;
mod error;
mod isolation;
mod options;
mod shard;
mod tenant;
mod tenant_connection_service;
mod tenant_management_service;

pub use self::deadline::{DEFAULT_STEP_TIMEOUT, DeadlineExceeded, ResolutionStep, within};
pub use self::error::{TenantConnectionError, TenantManagementError};
pub use self::isolation::{
    SET_SESSION_CONTEXT_SQL, TENANT_CONTEXT_KEY, TenantConnection, isolation_params,
};
pub use self::options::{
    ConnectionOptions, ExistingMappingPolicy, SERVICE_PLAN_PLACEHOLDER, TenantOptions,
    UnknownMappingPolicy,
};
pub use self::shard::{Credentials, PointMapping, Shard, ShardId, ShardLocation, SqlProtocol};
pub use self::tenant::{TenantId, TenantRecord, TenantValidationError};
pub use self::tenant_connection_service::TenantConnectionService;
pub use self::tenant_management_service::{ReconcileOutcome, TenantManagementService};
