//! End-to-end resolution behaviour over the in-memory adapters.

use std::time::Duration;

use rstest::rstest;
use tenant_router::domain::ports::{
    DriverError, FixedTenantIdProvider, ShardMapError, TenantCatalogError,
};
use tenant_router::domain::{
    ReconcileOutcome, ResolutionStep, ShardLocation, TENANT_CONTEXT_KEY, TenantConnectionError,
    TenantId, TenantManagementError, TenantRecord,
};
use tenant_router::outbound::memory::{CatalogOperation, ShardMapOperation};

#[path = "support/router.rs"]
mod router;

use router::{router, router_with};

fn standard_location() -> ShardLocation {
    ShardLocation::tcp("db-1", "tenants_standard", 5432)
}

#[rstest]
#[tokio::test]
async fn first_resolution_provisions_and_second_takes_the_warm_path() {
    let router = router().await;
    let record = router.onboard("Harbour Bakery", "standard");

    let first = router
        .service
        .resolve_connection(record.tenant_id())
        .await
        .expect("cold resolution");
    assert_eq!(first.location(), &standard_location());
    assert_eq!(first.tenant_id(), record.tenant_id());
    drop(first);

    let second = router
        .service
        .resolve_connection(record.tenant_id())
        .await
        .expect("warm resolution");
    assert_eq!(second.location(), &standard_location());

    assert_eq!(router.map().shards().len(), 1);
    assert_eq!(router.map().mapping_count(), 1);
    assert_eq!(router.catalogs.record(record.tenant_id()), Some(record));
}

#[rstest]
#[tokio::test]
async fn resolved_sessions_carry_the_tenant_key_literal() {
    let router = router().await;
    let record = router.onboard("Harbour Bakery", "standard");

    let connection = router
        .service
        .resolve_connection(record.tenant_id())
        .await
        .expect("resolution");

    let sessions = router.connector.sessions();
    let [session] = sessions.as_slice() else {
        panic!("expected exactly one session, got {}", sessions.len());
    };
    assert!(session.open);
    assert_eq!(session.user, "router");
    assert_eq!(
        session.variables.get(&format!("session_context.{TENANT_CONTEXT_KEY}")),
        Some(&record.tenant_id().to_string())
    );
    drop(connection);
    assert!(router.connector.sessions().iter().all(|s| !s.open));
}

#[rstest]
#[tokio::test]
async fn unknown_tenants_fail_without_mutating_the_shard_map() {
    let router = router().await;
    let tenant_id = TenantId::random();

    let error = router
        .service
        .resolve_connection(&tenant_id)
        .await
        .err()
        .expect("unknown tenant");

    assert_eq!(
        error,
        TenantConnectionError::TenantNotFound {
            tenant_id: tenant_id.clone()
        }
    );
    assert!(!error.is_retryable());
    assert!(router.map().shards().is_empty());
    assert_eq!(router.map().mapping_count(), 0);
    assert!(router.connector.sessions().is_empty());
    assert_eq!(router.catalogs.outstanding_handles(), 0);
}

#[rstest]
#[tokio::test]
async fn failed_isolation_closes_the_session() {
    let router = router().await;
    let record = router.onboard("Harbour Bakery", "standard");
    router
        .connector
        .set_statement_failure(Some(DriverError::execution("permission denied")));

    let error = router
        .service
        .resolve_connection(record.tenant_id())
        .await
        .err()
        .expect("isolation failure");

    assert_eq!(error.step(), ResolutionStep::InjectContext);
    assert!(matches!(error, TenantConnectionError::IsolationContext { .. }));
    let sessions = router.connector.sessions();
    assert_eq!(sessions.len(), 1);
    assert!(sessions.iter().all(|s| !s.open && s.variables.is_empty()));
}

#[rstest]
#[tokio::test]
async fn tenants_on_different_plans_land_on_different_partitions() {
    let router = router().await;
    let standard = router.onboard("Harbour Bakery", "standard");
    let premium = router.onboard("Quay Outfitters", "premium");

    let a = router
        .service
        .resolve_connection(standard.tenant_id())
        .await
        .expect("standard tenant");
    let b = router
        .service
        .resolve_connection(premium.tenant_id())
        .await
        .expect("premium tenant");

    assert_eq!(a.location().partition_name(), "tenants_standard");
    assert_eq!(b.location().partition_name(), "tenants_premium");
    assert_eq!(router.map().shards().len(), 2);
}

#[rstest]
#[tokio::test]
async fn tenants_on_the_same_plan_share_a_shard() {
    let router = router().await;
    let first = router.onboard("Harbour Bakery", "standard");
    let second = router.onboard("Quay Outfitters", "standard");

    for record in [&first, &second] {
        router
            .service
            .resolve_connection(record.tenant_id())
            .await
            .expect("resolution");
    }

    assert_eq!(router.map().shards().len(), 1);
    assert_eq!(router.map().mapping_count(), 2);
}

#[rstest]
#[tokio::test]
async fn catalog_handles_are_released_on_every_path() {
    let router = router().await;
    let record = router.onboard("Harbour Bakery", "standard");

    let connection = router
        .service
        .resolve_connection(record.tenant_id())
        .await
        .expect("resolution");
    assert_eq!(router.catalogs.outstanding_handles(), 0);
    drop(connection);

    router.catalogs.inject_fault(
        CatalogOperation::GetById,
        TenantCatalogError::connection("reset by peer"),
    );
    let error = router
        .service
        .resolve_connection(&TenantId::random())
        .await
        .err()
        .expect("catalog failure");
    assert!(matches!(error, TenantConnectionError::Catalog { .. }));
    assert!(error.is_retryable());
    assert_eq!(router.catalogs.outstanding_handles(), 0);
}

#[rstest]
#[tokio::test]
async fn provisioning_is_idempotent() {
    let router = router().await;
    let management = router.service.management();
    let tenant_id = TenantId::random();

    let first = management
        .create_new_shard("tenants_standard", "db-1", 5432, "standard")
        .await
        .expect("first shard");
    let again = management
        .create_new_shard("tenants_standard", "db-1", 5432, "standard")
        .await
        .expect("same shard");
    assert_eq!(first, again);

    for _ in 0..2 {
        let registered = management
            .register_new_shard(&tenant_id, "Harbour Bakery", "standard", &first)
            .await
            .expect("registration");
        assert!(registered);
    }
    assert_eq!(router.map().shards().len(), 1);
    assert_eq!(router.map().mapping_count(), 1);
    assert!(router.catalogs.record(&tenant_id).is_some());
}

#[rstest]
#[tokio::test]
async fn remapping_to_another_shard_is_refused() {
    let router = router().await;
    let management = router.service.management();
    let tenant_id = TenantId::random();
    let original = management
        .create_new_shard("tenants_standard", "db-1", 5432, "standard")
        .await
        .expect("original shard");
    let other = management
        .create_new_shard("tenants_premium", "db-1", 5432, "premium")
        .await
        .expect("other shard");
    management
        .register_new_shard(&tenant_id, "Harbour Bakery", "standard", &original)
        .await
        .expect("registration");

    let error = management
        .register_new_shard(&tenant_id, "Harbour Bakery", "premium", &other)
        .await
        .expect_err("conflict");

    assert_eq!(
        error,
        TenantManagementError::MappingConflict {
            tenant_id: tenant_id.clone(),
            existing: original.location().clone(),
            requested: other.location().clone(),
        }
    );
    assert_eq!(
        router.map().mapping_for(&tenant_id).map(|m| m.shard().clone()),
        Some(original)
    );
}

#[rstest]
#[tokio::test]
async fn partial_registration_is_repaired_by_reconciliation() {
    let router = router().await;
    let management = router.service.management();
    let record = TenantRecord::new(TenantId::random(), "Harbour Bakery", "standard")
        .expect("valid record");
    let shard = management
        .create_new_shard("tenants_standard", "db-1", 5432, "standard")
        .await
        .expect("shard");
    router.catalogs.inject_fault(
        CatalogOperation::Add,
        TenantCatalogError::connection("connection reset"),
    );

    let error = management
        .register_new_shard(
            record.tenant_id(),
            record.tenant_name(),
            record.service_plan(),
            &shard,
        )
        .await
        .expect_err("catalog write lost");
    assert!(matches!(
        error,
        TenantManagementError::PartialRegistration { ref location, .. } if location == shard.location()
    ));
    assert!(router.map().mapping_for(record.tenant_id()).is_some());
    assert_eq!(router.catalogs.record(record.tenant_id()), None);

    let outcome = management
        .reconcile_registration(&record)
        .await
        .expect("reconcile");
    assert_eq!(outcome, ReconcileOutcome::CatalogRecordRestored);
    assert_eq!(
        management.reconcile_registration(&record).await,
        Ok(ReconcileOutcome::AlreadyConsistent)
    );
    assert_eq!(router.catalogs.record(record.tenant_id()), Some(record));
}

#[rstest]
#[tokio::test]
async fn resolution_surfaces_partial_registration() {
    let router = router().await;
    let record = router.onboard("Harbour Bakery", "standard");
    router.catalogs.inject_fault(
        CatalogOperation::Add,
        TenantCatalogError::connection("connection reset"),
    );

    let error = router
        .service
        .resolve_connection(record.tenant_id())
        .await
        .err()
        .expect("partial registration");

    assert_eq!(error.step(), ResolutionStep::Register);
    assert!(!error.is_retryable());
    assert!(router.connector.sessions().is_empty());
}

#[rstest]
#[tokio::test]
async fn unavailable_shard_map_fails_at_provisioning() {
    let router = router_with(
        |manager| {
            manager.set_unavailable(Some("catalog store unreachable"));
            manager
        },
        Duration::from_secs(5),
    )
    .await;
    assert!(!router.service.management().shard_map().is_available());
    let record = router.onboard("Harbour Bakery", "standard");

    let error = router
        .service
        .resolve_connection(record.tenant_id())
        .await
        .err()
        .expect("no shard map");

    assert_eq!(
        error,
        TenantConnectionError::ShardNotFound {
            tenant_id: record.tenant_id().clone(),
            step: ResolutionStep::ProvisionShard,
        }
    );
}

#[rstest]
#[tokio::test]
async fn lookup_failures_are_retryable() {
    let router = router().await;
    let record = router.onboard("Harbour Bakery", "standard");
    router.map().inject_fault(
        ShardMapOperation::Lookup,
        ShardMapError::connection("connection refused"),
    );

    let error = router
        .service
        .resolve_connection(record.tenant_id())
        .await
        .err()
        .expect("lookup failure");
    assert_eq!(error.step(), ResolutionStep::Lookup);
    assert!(error.is_retryable());

    router
        .service
        .resolve_connection(record.tenant_id())
        .await
        .expect("retry succeeds");
}

#[tokio::test(start_paused = true)]
async fn slow_stores_time_out_with_the_step() {
    let router = router_with(|manager| manager, Duration::from_secs(1)).await;
    let record = router.onboard("Harbour Bakery", "standard");
    router.map().set_latency(Some(Duration::from_secs(30)));

    let error = router
        .service
        .resolve_connection(record.tenant_id())
        .await
        .err()
        .expect("timeout");

    assert_eq!(
        error,
        TenantConnectionError::Timeout {
            tenant_id: record.tenant_id().clone(),
            step: ResolutionStep::Lookup,
            after: Duration::from_secs(1),
        }
    );
    assert!(error.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn slow_isolation_times_out_and_closes_the_session() {
    let router = router_with(|manager| manager, Duration::from_secs(1)).await;
    let record = router.onboard("Harbour Bakery", "standard");
    router
        .connector
        .set_statement_latency(Some(Duration::from_secs(30)));

    let error = router
        .service
        .resolve_connection(record.tenant_id())
        .await
        .err()
        .expect("timeout");

    assert_eq!(
        error,
        TenantConnectionError::Timeout {
            tenant_id: record.tenant_id().clone(),
            step: ResolutionStep::InjectContext,
            after: Duration::from_secs(1),
        }
    );
    let sessions = router.connector.sessions();
    assert_eq!(sessions.len(), 1);
    assert!(sessions.iter().all(|s| !s.open && s.variables.is_empty()));
}

#[rstest]
#[tokio::test]
async fn ambient_tenant_resolves_to_an_isolated_connection() {
    let router = router().await;
    let record = router.onboard("Harbour Bakery", "standard");
    let provider = FixedTenantIdProvider::new(record.tenant_id().clone());

    let connection = router
        .service
        .resolve_current_connection(&provider)
        .await
        .expect("ambient resolution");

    assert_eq!(connection.tenant_id(), record.tenant_id());
    assert_eq!(connection.location(), &standard_location());
    let sessions = router.connector.sessions();
    assert_eq!(
        sessions
            .first()
            .and_then(|s| s.variables.get(&format!("session_context.{TENANT_CONTEXT_KEY}"))),
        Some(&record.tenant_id().to_string())
    );
}

#[tokio::test]
async fn shard_map_is_created_once_and_reused() {
    let router = router().await;
    let record = router.onboard("Harbour Bakery", "standard");
    router
        .service
        .resolve_connection(record.tenant_id())
        .await
        .expect("resolution");

    let slot = tenant_router::domain::ports::ShardMapSlot::initialise(
        &router.manager,
        router::SHARD_MAP_NAME,
    )
    .await;
    let reopened = slot.get().expect("existing map");
    assert_eq!(reopened.mapping_count(), 1);
}
