//! Concurrent first-use resolution converges on one shard and one mapping.

use std::time::Duration;

use futures::future::join_all;
use tenant_router::domain::{ShardLocation, TenantConnectionError, TenantId};

#[path = "support/router.rs"]
mod router;

use router::router_with;

const CALLERS: usize = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cold_starts_converge() {
    let router = router_with(|manager| manager, Duration::from_secs(5)).await;
    let record = router.onboard("Harbour Bakery", "standard");
    // Widen the window between lookup and create so callers interleave.
    router.map().set_latency(Some(Duration::from_millis(5)));

    let tasks = (0..CALLERS).map(|_| {
        let service = router.service.clone();
        let tenant_id = record.tenant_id().clone();
        tokio::spawn(async move {
            service
                .resolve_connection(&tenant_id)
                .await
                .map(|connection| connection.location().clone())
        })
    });
    let results: Vec<Result<ShardLocation, TenantConnectionError>> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task completes"))
        .collect();

    let expected = ShardLocation::tcp("db-1", "tenants_standard", 5432);
    for result in &results {
        assert_eq!(result.as_ref(), Ok(&expected));
    }
    assert_eq!(router.map().shards().len(), 1);
    assert_eq!(router.map().mapping_count(), 1);
    assert_eq!(router.catalogs.outstanding_handles(), 0);

    let sessions = router.connector.sessions();
    assert_eq!(sessions.len(), CALLERS);
    assert!(sessions.iter().all(|session| !session.open));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_tenants_on_one_plan_share_a_single_shard() {
    let router = router_with(|manager| manager, Duration::from_secs(5)).await;
    let tenants: Vec<TenantId> = (0..CALLERS)
        .map(|i| {
            router
                .onboard(&format!("Tenant {i}"), "standard")
                .tenant_id()
                .clone()
        })
        .collect();

    let tasks = tenants.iter().cloned().map(|tenant_id| {
        let service = router.service.clone();
        tokio::spawn(async move { service.resolve_connection(&tenant_id).await.map(drop) })
    });
    for joined in join_all(tasks).await {
        joined.expect("task completes").expect("resolution");
    }

    assert_eq!(router.map().shards().len(), 1);
    assert_eq!(router.map().mapping_count(), CALLERS);
    for tenant_id in &tenants {
        assert!(router.catalogs.record(tenant_id).is_some());
    }
}
