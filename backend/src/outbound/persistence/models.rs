//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{shard_mappings, shard_maps, shards, tenants};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = shard_maps)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ShardMapRow {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = shard_maps)]
pub(crate) struct NewShardMapRow<'a> {
    pub id: Uuid,
    pub name: &'a str,
}

/// Row struct for reading from the shards table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = shards)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ShardRow {
    pub id: Uuid,
    pub server: String,
    pub partition_name: String,
    pub protocol: String,
    pub port: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = shards)]
pub(crate) struct NewShardRow<'a> {
    pub id: Uuid,
    pub shard_map_id: Uuid,
    pub server: &'a str,
    pub partition_name: &'a str,
    pub protocol: &'a str,
    pub port: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = shard_mappings)]
pub(crate) struct NewShardMappingRow {
    pub shard_map_id: Uuid,
    pub tenant_id: Uuid,
    pub shard_id: Uuid,
}

/// Row struct for reading from the tenants table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tenants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct TenantRow {
    pub tenant_id: Uuid,
    pub tenant_name: String,
    pub service_plan: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tenants)]
pub(crate) struct NewTenantRow<'a> {
    pub tenant_id: Uuid,
    pub tenant_name: &'a str,
    pub service_plan: &'a str,
}
