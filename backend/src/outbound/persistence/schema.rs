//! Diesel table definitions for the shard-map store and tenant catalog.
//!
//! These definitions must match `backend/migrations` exactly.

diesel::table! {
    /// Named list shard maps.
    shard_maps (id) {
        id -> Uuid,
        name -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Registered partitions. `(shard_map_id, server, partition_name,
    /// protocol, port)` is unique.
    shards (id) {
        id -> Uuid,
        shard_map_id -> Uuid,
        server -> Varchar,
        partition_name -> Varchar,
        /// Label produced by `SqlProtocol::as_str`.
        protocol -> Varchar,
        port -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Point mappings; at most one per tenant key and map.
    shard_mappings (shard_map_id, tenant_id) {
        shard_map_id -> Uuid,
        tenant_id -> Uuid,
        shard_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Tenant catalog records.
    tenants (tenant_id) {
        tenant_id -> Uuid,
        tenant_name -> Varchar,
        service_plan -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(shards -> shard_maps (shard_map_id));
diesel::joinable!(shard_mappings -> shards (shard_id));

diesel::allow_tables_to_appear_in_same_query!(shard_maps, shards, shard_mappings, tenants);
