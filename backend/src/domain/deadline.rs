//! Resolution steps and per-step deadlines.
//!
//! Every network call made while resolving a tenant connection runs under a
//! deadline. Expiry is reported as [`DeadlineExceeded`] naming the store
//! operation; services attach the tenant key and [`ResolutionStep`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;

/// Default deadline applied to each blocking step.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Phase of `resolve_connection` a failure was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStep {
    /// Asking the provider for the ambient tenant key.
    IdentifyTenant,
    /// First point lookup of the tenant mapping.
    Lookup,
    /// Reading the tenant's catalog record.
    FetchTenant,
    /// Getting or creating the shard for the tenant's plan.
    ProvisionShard,
    /// Writing the mapping and the catalog record.
    Register,
    /// Looking the mapping up again after registering.
    ReLookup,
    /// Opening the transport connection.
    Open,
    /// Setting the isolation context on the session.
    InjectContext,
}

impl ResolutionStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdentifyTenant => "identify_tenant",
            Self::Lookup => "lookup",
            Self::FetchTenant => "fetch_tenant",
            Self::ProvisionShard => "provision_shard",
            Self::Register => "register",
            Self::ReLookup => "re_lookup",
            Self::Open => "open",
            Self::InjectContext => "inject_context",
        }
    }
}

impl fmt::Display for ResolutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A store or driver call did not finish within its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{operation} did not complete within {after:?}")]
pub struct DeadlineExceeded {
    pub operation: &'static str,
    pub after: Duration,
}

/// Await `future`, failing with [`DeadlineExceeded`] after `limit`.
///
/// The future is dropped on expiry, so no partial result is observed.
pub async fn within<F>(
    operation: &'static str,
    limit: Duration,
    future: F,
) -> Result<F::Output, DeadlineExceeded>
where
    F: Future,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| DeadlineExceeded {
            operation,
            after: limit,
        })
}
