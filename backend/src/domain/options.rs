//! Partition parameters and policies consumed by the domain services.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Credentials, DEFAULT_STEP_TIMEOUT};

/// Placeholder replaced by the tenant's service plan in partition names.
pub const SERVICE_PLAN_PLACEHOLDER: &str = "{service_plan}";

/// How `register_new_shard` treats a mapping that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingMappingPolicy {
    /// The existing mapping must point at the requested shard location.
    #[default]
    Verify,
    /// Any existing mapping counts as a successful registration.
    Trust,
}

/// Policy name that is neither `verify` nor `trust`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown existing mapping policy {0}; expected verify or trust")]
pub struct UnknownMappingPolicy(pub String);

impl FromStr for ExistingMappingPolicy {
    type Err = UnknownMappingPolicy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("verify") {
            Ok(Self::Verify)
        } else if value.eq_ignore_ascii_case("trust") {
            Ok(Self::Trust)
        } else {
            Err(UnknownMappingPolicy(value.to_owned()))
        }
    }
}

/// Where new tenant partitions are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantOptions {
    database_name_template: String,
    database_server: String,
    database_port: u16,
}

impl TenantOptions {
    /// Name partitions from `database_name_template` and place them on
    /// `database_server:database_port`.
    pub fn new(
        database_name_template: impl Into<String>,
        database_server: impl Into<String>,
        database_port: u16,
    ) -> Self {
        Self {
            database_name_template: database_name_template.into(),
            database_server: database_server.into(),
            database_port,
        }
    }

    /// Partition name for tenants on `service_plan`.
    ///
    /// # Examples
    /// ```
    /// use tenant_router::domain::TenantOptions;
    ///
    /// let options = TenantOptions::new("tenants_{service_plan}", "db-1", 5432);
    /// assert_eq!(options.partition_name_for("premium"), "tenants_premium");
    /// ```
    pub fn partition_name_for(&self, service_plan: &str) -> String {
        self.database_name_template
            .replace(SERVICE_PLAN_PLACEHOLDER, service_plan)
    }

    pub fn database_server(&self) -> &str {
        self.database_server.as_str()
    }

    pub fn database_port(&self) -> u16 {
        self.database_port
    }
}

/// Settings for [`crate::domain::TenantConnectionService`].
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub tenant: TenantOptions,
    pub credentials: Credentials,
    pub step_timeout: Duration,
}

impl ConnectionOptions {
    /// Options with the default step timeout.
    pub fn new(tenant: TenantOptions, credentials: Credentials) -> Self {
        Self {
            tenant,
            credentials,
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    /// Override the deadline applied to each store and driver call.
    #[must_use]
    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }
}
