//! PostgreSQL-backed shard-map store.
//!
//! [`DieselShardMapManager`] resolves named list shard maps; each
//! [`DieselShardMap`] scopes its queries to one map id. Uniqueness of shard
//! locations and point mappings is enforced by table constraints and
//! reported through the dedicated `ShardMapError` variants.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{
    ShardConnection, ShardConnector, ShardMap, ShardMapError, ShardMapManager,
};
use crate::domain::{
    Credentials, PointMapping, Shard, ShardId, ShardLocation, SqlProtocol, TenantId,
};

use super::diesel_error_mapping::{StoreFailure, classify_diesel_error};
use super::models::{NewShardMapRow, NewShardMappingRow, NewShardRow, ShardMapRow, ShardRow};
use super::pool::{DbPool, PoolError};
use super::schema::{shard_mappings, shard_maps, shards};

fn map_pool_error(error: PoolError) -> ShardMapError {
    ShardMapError::connection(error.into_message())
}

fn map_failure(failure: StoreFailure) -> ShardMapError {
    match failure {
        StoreFailure::Connection(message) => ShardMapError::connection(message),
        StoreFailure::Query(message) => ShardMapError::query(message),
        StoreFailure::UniqueViolation => ShardMapError::query("unexpected unique violation"),
    }
}

fn map_diesel_error(error: &diesel::result::Error) -> ShardMapError {
    map_failure(classify_diesel_error(error))
}

fn row_to_shard(row: ShardRow) -> Result<Shard, ShardMapError> {
    let protocol = SqlProtocol::from_label(&row.protocol).ok_or_else(|| {
        ShardMapError::query(format!("unknown shard protocol {} in store", row.protocol))
    })?;
    let port = u16::try_from(row.port)
        .map_err(|_| ShardMapError::query(format!("shard port {} out of range", row.port)))?;
    Ok(Shard::new(
        ShardId::from_uuid(row.id),
        ShardLocation::new(row.server, row.partition_name, protocol, port),
    ))
}

/// Diesel-backed implementation of the `ShardMapManager` port.
#[derive(Clone)]
pub struct DieselShardMapManager {
    pool: DbPool,
    connector: Arc<dyn ShardConnector>,
}

impl DieselShardMapManager {
    /// Create a manager whose maps open shard connections via `connector`.
    pub fn new(pool: DbPool, connector: Arc<dyn ShardConnector>) -> Self {
        Self { pool, connector }
    }

    fn map_from_row(&self, row: ShardMapRow) -> DieselShardMap {
        DieselShardMap {
            pool: self.pool.clone(),
            shard_map_id: row.id,
            name: row.name,
            connector: Arc::clone(&self.connector),
        }
    }
}

#[async_trait]
impl ShardMapManager for DieselShardMapManager {
    type Map = DieselShardMap;

    async fn try_get_list_shard_map(&self, name: &str) -> Result<Option<DieselShardMap>, ShardMapError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<ShardMapRow> = shard_maps::table
            .filter(shard_maps::name.eq(name))
            .select(ShardMapRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(&err))?;

        Ok(row.map(|row| self.map_from_row(row)))
    }

    async fn create_list_shard_map(&self, name: &str) -> Result<DieselShardMap, ShardMapError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let id = Uuid::new_v4();

        diesel::insert_into(shard_maps::table)
            .values(&NewShardMapRow { id, name })
            .execute(&mut conn)
            .await
            .map_err(|err| match classify_diesel_error(&err) {
                StoreFailure::UniqueViolation => ShardMapError::duplicate_map(name),
                other => map_failure(other),
            })?;

        Ok(self.map_from_row(ShardMapRow {
            id,
            name: name.to_owned(),
        }))
    }
}

/// Diesel-backed implementation of the `ShardMap` port for one list map.
#[derive(Clone)]
pub struct DieselShardMap {
    pool: DbPool,
    shard_map_id: Uuid,
    name: String,
    connector: Arc<dyn ShardConnector>,
}

#[async_trait]
impl ShardMap for DieselShardMap {
    async fn lookup(&self, tenant_id: &TenantId) -> Result<Option<PointMapping>, ShardMapError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<ShardRow> = shard_mappings::table
            .inner_join(shards::table)
            .filter(shard_mappings::shard_map_id.eq(self.shard_map_id))
            .filter(shard_mappings::tenant_id.eq(tenant_id.as_uuid()))
            .select(ShardRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(&err))?;

        let shard = row.map(row_to_shard).transpose()?;
        Ok(shard.map(|shard| PointMapping::new(tenant_id.clone(), shard)))
    }

    async fn get_shard_by_location(
        &self,
        location: &ShardLocation,
    ) -> Result<Option<Shard>, ShardMapError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<ShardRow> = shards::table
            .filter(shards::shard_map_id.eq(self.shard_map_id))
            .filter(shards::server.eq(location.server()))
            .filter(shards::partition_name.eq(location.partition_name()))
            .filter(shards::protocol.eq(location.protocol().as_str()))
            .filter(shards::port.eq(i32::from(location.port())))
            .select(ShardRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(&err))?;

        row.map(row_to_shard).transpose()
    }

    async fn create_shard(&self, location: &ShardLocation) -> Result<Shard, ShardMapError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let id = Uuid::new_v4();
        let row = NewShardRow {
            id,
            shard_map_id: self.shard_map_id,
            server: location.server(),
            partition_name: location.partition_name(),
            protocol: location.protocol().as_str(),
            port: i32::from(location.port()),
        };

        diesel::insert_into(shards::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map_err(|err| match classify_diesel_error(&err) {
                StoreFailure::UniqueViolation => ShardMapError::duplicate_shard(location.clone()),
                other => map_failure(other),
            })?;

        debug!(shard_map = %self.name, %location, shard_id = %id, "inserted shard");
        Ok(Shard::new(ShardId::from_uuid(id), location.clone()))
    }

    async fn create_point_mapping(
        &self,
        tenant_id: &TenantId,
        shard: &Shard,
    ) -> Result<PointMapping, ShardMapError> {
        let inserted = {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            diesel::insert_into(shard_mappings::table)
                .values(&NewShardMappingRow {
                    shard_map_id: self.shard_map_id,
                    tenant_id: *tenant_id.as_uuid(),
                    shard_id: *shard.id().as_uuid(),
                })
                .execute(&mut conn)
                .await
        };

        match inserted {
            Ok(_) => Ok(PointMapping::new(tenant_id.clone(), shard.clone())),
            Err(err) => match classify_diesel_error(&err) {
                StoreFailure::UniqueViolation => {
                    let existing = self.lookup(tenant_id).await?.ok_or_else(|| {
                        ShardMapError::query("mapping reported as duplicate is missing")
                    })?;
                    Err(ShardMapError::mapping_conflict(
                        tenant_id.clone(),
                        existing.shard().location().clone(),
                    ))
                }
                other => Err(map_failure(other)),
            },
        }
    }

    async fn open_connection_for_key(
        &self,
        tenant_id: &TenantId,
        credentials: &Credentials,
    ) -> Result<Box<dyn ShardConnection>, ShardMapError> {
        let mapping = self
            .lookup(tenant_id)
            .await?
            .ok_or_else(|| ShardMapError::unmapped_key(tenant_id.clone()))?;

        self.connector
            .open(mapping.shard().location(), credentials)
            .await
            .map_err(|err| ShardMapError::driver(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn row(protocol: &str, port: i32) -> ShardRow {
        ShardRow {
            id: Uuid::new_v4(),
            server: "db-1".to_owned(),
            partition_name: "tenants".to_owned(),
            protocol: protocol.to_owned(),
            port,
        }
    }

    #[rstest]
    fn rows_convert_to_tcp_shards() {
        let shard = row_to_shard(row("tcp", 5432)).expect("valid row");
        assert_eq!(shard.location(), &ShardLocation::tcp("db-1", "tenants", 5432));
    }

    #[rstest]
    #[case("carrier-pigeon", 5432)]
    #[case("tcp", 70_000)]
    fn corrupt_rows_are_query_errors(#[case] protocol: &str, #[case] port: i32) {
        let error = row_to_shard(row(protocol, port)).expect_err("corrupt row");
        assert!(matches!(error, ShardMapError::Query { .. }));
    }

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let error = map_pool_error(PoolError::checkout("connection refused"));
        assert_eq!(error, ShardMapError::connection("connection refused"));
    }
}
