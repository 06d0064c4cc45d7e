//! Port supplying the tenant key of the current unit of work.

use async_trait::async_trait;

use crate::domain::TenantId;

use super::define_port_error;

define_port_error! {
    /// Errors raised when the ambient tenant cannot be determined.
    pub enum TenantIdProviderError {
        /// No tenant is associated with the current context.
        Missing => "no tenant is associated with the current context",
        /// The provider could not read its source.
        Unavailable { message: String } => "tenant id source unavailable: {message}",
    }
}

/// Source of the tenant key for the caller's context (request, job, session).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantIdProvider: Send + Sync {
    /// Tenant key of the current context.
    async fn current_tenant_id(&self) -> Result<TenantId, TenantIdProviderError>;
}

/// Provider that always answers with one tenant.
#[derive(Debug, Clone)]
pub struct FixedTenantIdProvider(TenantId);

impl FixedTenantIdProvider {
    /// Provider answering with `tenant_id`.
    pub fn new(tenant_id: TenantId) -> Self {
        Self(tenant_id)
    }
}

#[async_trait]
impl TenantIdProvider for FixedTenantIdProvider {
    async fn current_tenant_id(&self) -> Result<TenantId, TenantIdProviderError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_provider_returns_its_tenant() {
        let tenant_id = TenantId::random();
        let provider = FixedTenantIdProvider::new(tenant_id.clone());

        let current = provider
            .current_tenant_id()
            .await
            .expect("fixed provider succeeds");
        assert_eq!(current, tenant_id);
    }
}
