//! Tenant isolation context and the connection type handed to callers.
//!
//! Row-level security on tenant partitions filters by a session variable
//! holding the tenant key. The variable is written with one fixed
//! session-scoped statement before a connection leaves the router, and
//! [`TenantConnection`] can only be built after that statement succeeded.

use std::fmt;

use super::ports::{DriverError, ShardConnection};
use super::{ShardLocation, TenantId};

/// Name of the session variable carrying the tenant key.
pub const TENANT_CONTEXT_KEY: &str = "TenantId";

/// Session-scoped statement setting `session_context.<key>` to a value.
///
/// Parameters: `$1` is the variable name, `$2` the value. `is_local = false`
/// keeps the value for the lifetime of the session rather than the current
/// transaction.
pub const SET_SESSION_CONTEXT_SQL: &str =
    "SELECT set_config('session_context.' || $1, $2, false)";

/// Parameters binding the tenant key literal to [`TENANT_CONTEXT_KEY`].
pub fn isolation_params(tenant_id: &TenantId) -> Vec<String> {
    vec![TENANT_CONTEXT_KEY.to_owned(), tenant_id.as_ref().to_owned()]
}

/// Shard connection whose isolation context is set to its tenant.
pub struct TenantConnection {
    tenant_id: TenantId,
    inner: Box<dyn ShardConnection>,
}

impl TenantConnection {
    pub(crate) fn isolated(tenant_id: TenantId, inner: Box<dyn ShardConnection>) -> Self {
        Self { tenant_id, inner }
    }

    /// Tenant whose key is set in the session context.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Shard the connection is open against.
    pub fn location(&self) -> &ShardLocation {
        self.inner.location()
    }

    /// Run a caller statement on the isolated session.
    pub async fn execute(&mut self, statement: &str, params: &[String]) -> Result<u64, DriverError> {
        self.inner.execute(statement, params).await
    }
}

impl fmt::Debug for TenantConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantConnection")
            .field("tenant_id", &self.tenant_id)
            .field("location", self.inner.location())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_carry_the_exact_tenant_literal() {
        let tenant_id = TenantId::new("3fa85f64-5717-4562-b3fc-2c963f66afa6").expect("valid id");

        assert_eq!(
            isolation_params(&tenant_id),
            vec![
                "TenantId".to_owned(),
                "3fa85f64-5717-4562-b3fc-2c963f66afa6".to_owned()
            ]
        );
    }
}
