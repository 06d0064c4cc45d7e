//! Router wired over the in-memory adapters.
#![allow(dead_code, reason = "each test binary uses a subset of the harness")]

use std::sync::Arc;
use std::time::Duration;

use tenant_router::domain::ports::ShardMapSlot;
use tenant_router::domain::{
    ConnectionOptions, Credentials, TenantConnectionService, TenantId, TenantManagementService,
    TenantOptions, TenantRecord,
};
use tenant_router::outbound::memory::{
    InMemoryShardConnector, InMemoryShardMap, InMemoryShardMapManager,
    InMemoryTenantCatalogFactory,
};

pub const SHARD_MAP_NAME: &str = "TenantShardMap";

pub type Service = TenantConnectionService<InMemoryShardMap, InMemoryTenantCatalogFactory>;

/// Handles onto every adapter behind a [`Service`].
pub struct Router {
    pub service: Service,
    pub manager: InMemoryShardMapManager,
    pub connector: InMemoryShardConnector,
    pub catalogs: Arc<InMemoryTenantCatalogFactory>,
}

impl Router {
    /// The initialised shard map; panics when the slot is unavailable.
    pub fn map(&self) -> &InMemoryShardMap {
        self.service
            .management()
            .shard_map()
            .get()
            .expect("shard map initialised")
    }

    /// Seed a catalog record for a fresh tenant on `plan`.
    pub fn onboard(&self, name: &str, plan: &str) -> TenantRecord {
        let record = TenantRecord::new(TenantId::random(), name, plan).expect("valid record");
        self.catalogs.insert(record.clone());
        record
    }
}

pub fn connection_options() -> ConnectionOptions {
    ConnectionOptions::new(
        TenantOptions::new("tenants_{service_plan}", "db-1", 5432),
        Credentials::new("router", "s3cret"),
    )
}

/// Build a router whose shard map is created on start-up.
pub async fn router() -> Router {
    router_with(|manager| manager, Duration::from_secs(5)).await
}

/// Build a router, letting `prepare` tweak the manager before the shard map
/// slot is initialised.
pub async fn router_with(
    prepare: impl FnOnce(InMemoryShardMapManager) -> InMemoryShardMapManager,
    step_timeout: Duration,
) -> Router {
    let connector = InMemoryShardConnector::new();
    let manager = prepare(InMemoryShardMapManager::new(Arc::new(connector.clone())));
    let slot = ShardMapSlot::initialise(&manager, SHARD_MAP_NAME).await;
    let catalogs = Arc::new(InMemoryTenantCatalogFactory::new());
    let management = TenantManagementService::new(slot, Arc::clone(&catalogs))
        .with_step_timeout(step_timeout);
    let options = connection_options().with_step_timeout(step_timeout);
    let service = TenantConnectionService::new(management, Arc::clone(&catalogs), options);
    Router {
        service,
        manager,
        connector,
        catalogs,
    }
}
