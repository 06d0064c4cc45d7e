//! Operator CLI for the tenant shard router.
//!
//! Store locations and credentials come from `RouterSettings`
//! (`TENANT_ROUTER_*` environment variables or the configuration file).
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ortho_config::OrthoConfig;
use serde::Serialize;
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use tenant_router::domain::ports::{
    ShardConnector, ShardMapSlot, TenantCatalog, TenantCatalogFactory,
};
use tenant_router::domain::{
    ReconcileOutcome, ShardLocation, TENANT_CONTEXT_KEY, TenantConnectionService, TenantId,
    TenantManagementService, TenantRecord,
};
use tenant_router::outbound::driver::PgShardConnector;
use tenant_router::outbound::persistence::{
    DbPool, DieselShardMap, DieselShardMapManager, DieselTenantCatalogFactory, PoolConfig,
    run_migrations,
};
use tenant_router::settings::{CatalogOptions, RouterSettings};

/// `tenant-router` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tenant-router",
    about = "Resolve, register and repair tenant shard mappings",
    version
)]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Apply pending schema migrations to the catalog store.
    Migrate,
    /// Add a tenant record to the catalog.
    RegisterTenant {
        #[arg(long = "tenant-id", value_name = "uuid")]
        tenant_id: TenantId,
        #[arg(long, value_name = "name")]
        name: String,
        #[arg(long, value_name = "plan")]
        plan: String,
    },
    /// Resolve a tenant to its shard, provisioning on first use.
    Resolve {
        #[arg(long = "tenant-id", value_name = "uuid")]
        tenant_id: TenantId,
    },
    /// Restore the catalog record of a partially registered tenant.
    Reconcile {
        #[arg(long = "tenant-id", value_name = "uuid")]
        tenant_id: TenantId,
        #[arg(long, value_name = "name")]
        name: String,
        #[arg(long, value_name = "plan")]
        plan: String,
    },
}

#[derive(Debug, Serialize)]
struct ResolveSummary<'a> {
    tenant_id: &'a str,
    location: &'a ShardLocation,
    session_context_key: &'static str,
}

type Management = TenantManagementService<DieselShardMap, DieselTenantCatalogFactory>;

fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let settings = RouterSettings::load_from_iter([OsString::from("tenant-router")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;
    let catalog_options = settings.catalog_options().map_err(invalid_input)?;

    match args.command {
        Command::Migrate => {
            let applied = run_migrations(&catalog_options.database_url)
                .await
                .map_err(io::Error::other)?;
            println!("applied_migrations={}", applied.len());
            Ok(())
        }
        Command::RegisterTenant {
            tenant_id,
            name,
            plan,
        } => {
            let record = TenantRecord::new(tenant_id, name, plan).map_err(invalid_input)?;
            let catalogs = DieselTenantCatalogFactory::new(connect(&catalog_options).await?);
            let mut catalog = catalogs.create_catalog().await.map_err(io::Error::other)?;
            catalog.add(&record).await.map_err(io::Error::other)?;
            println!("registered_tenant={}", record.tenant_id());
            Ok(())
        }
        Command::Resolve { tenant_id } => {
            let management = management(&settings, &catalog_options).await?;
            let catalogs = Arc::new(DieselTenantCatalogFactory::new(
                connect(&catalog_options).await?,
            ));
            let options = settings.connection_options().map_err(invalid_input)?;
            let service = TenantConnectionService::new(management, catalogs, options);

            let connection = service
                .resolve_connection(&tenant_id)
                .await
                .map_err(|error| io::Error::other(format!("resolve failed: {error}")))?;
            let summary = ResolveSummary {
                tenant_id: connection.tenant_id().as_ref(),
                location: connection.location(),
                session_context_key: TENANT_CONTEXT_KEY,
            };
            let rendered = serde_json::to_string(&summary).map_err(io::Error::other)?;
            println!("{rendered}");
            Ok(())
        }
        Command::Reconcile {
            tenant_id,
            name,
            plan,
        } => {
            let record = TenantRecord::new(tenant_id, name, plan).map_err(invalid_input)?;
            let outcome = management(&settings, &catalog_options)
                .await?
                .reconcile_registration(&record)
                .await
                .map_err(|error| io::Error::other(format!("reconcile failed: {error}")))?;
            let label = match outcome {
                ReconcileOutcome::AlreadyConsistent => "already_consistent",
                ReconcileOutcome::CatalogRecordRestored => "catalog_record_restored",
                ReconcileOutcome::MappingMissing => "mapping_missing",
            };
            println!("reconcile_outcome={label}");
            Ok(())
        }
    }
}

async fn connect(options: &CatalogOptions) -> io::Result<DbPool> {
    DbPool::new(PoolConfig::from_catalog_options(options))
        .await
        .map_err(|error| io::Error::other(format!("create database pool: {error}")))
}

async fn management(
    settings: &RouterSettings,
    catalog_options: &CatalogOptions,
) -> io::Result<Management> {
    let pool = connect(catalog_options).await?;
    let connector: Arc<dyn ShardConnector> = Arc::new(PgShardConnector);
    let manager = DieselShardMapManager::new(pool.clone(), connector);
    let slot = ShardMapSlot::initialise(&manager, &catalog_options.shard_map_name).await;
    let policy = settings.existing_mapping_policy();

    Ok(
        TenantManagementService::new(slot, Arc::new(DieselTenantCatalogFactory::new(pool)))
            .with_existing_mapping_policy(policy)
            .with_step_timeout(settings.step_timeout()),
    )
}

fn invalid_input(error: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, error.to_string())
}
