//! In-process shard-map store.
//!
//! State lives behind a mutex and each port call takes the lock once, so
//! concurrent callers interleave between calls exactly as they would against
//! a remote store. Uniqueness rules match the PostgreSQL schema.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ports::{
    ShardConnection, ShardConnector, ShardMap, ShardMapError, ShardMapManager,
};
use crate::domain::{Credentials, PointMapping, Shard, ShardId, ShardLocation, TenantId};

/// Shard map call a fault can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShardMapOperation {
    Lookup,
    GetShardByLocation,
    CreateShard,
    CreatePointMapping,
    OpenConnection,
}

#[derive(Default)]
struct MapState {
    shards: Vec<Shard>,
    mappings: HashMap<TenantId, ShardId>,
    faults: HashMap<ShardMapOperation, Vec<ShardMapError>>,
    latency: Option<Duration>,
}

impl MapState {
    fn take_fault(&mut self, operation: ShardMapOperation) -> Result<(), ShardMapError> {
        match self.faults.get_mut(&operation).and_then(Vec::pop) {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    fn mapping(&self, tenant_id: &TenantId) -> Option<PointMapping> {
        let shard_id = self.mappings.get(tenant_id)?;
        self.shards
            .iter()
            .find(|shard| shard.id() == *shard_id)
            .map(|shard| PointMapping::new(tenant_id.clone(), shard.clone()))
    }
}

/// List shard map held in memory.
#[derive(Clone)]
pub struct InMemoryShardMap {
    state: Arc<Mutex<MapState>>,
    connector: Arc<dyn ShardConnector>,
}

impl InMemoryShardMap {
    /// Empty map opening sessions through `connector`.
    pub fn new(connector: Arc<dyn ShardConnector>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MapState::default())),
            connector,
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, MapState>, ShardMapError> {
        self.state
            .lock()
            .map_err(|_| ShardMapError::query("shard map state poisoned"))
    }

    async fn begin(
        &self,
        operation: ShardMapOperation,
    ) -> Result<MutexGuard<'_, MapState>, ShardMapError> {
        let latency = self.state()?.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state()?;
        state.take_fault(operation)?;
        Ok(state)
    }

    /// Fail the next call of `operation` with `error`.
    ///
    /// Faults queue per operation and are consumed last-in first-out.
    pub fn inject_fault(&self, operation: ShardMapOperation, error: ShardMapError) {
        if let Ok(mut state) = self.state.lock() {
            state.faults.entry(operation).or_default().push(error);
        }
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut state) = self.state.lock() {
            state.latency = latency;
        }
    }

    pub fn shards(&self) -> Vec<Shard> {
        self.state
            .lock()
            .map(|state| state.shards.clone())
            .unwrap_or_default()
    }

    pub fn mapping_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.mappings.len())
            .unwrap_or_default()
    }

    pub fn mapping_for(&self, tenant_id: &TenantId) -> Option<PointMapping> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.mapping(tenant_id))
    }
}

#[async_trait]
impl ShardMap for InMemoryShardMap {
    async fn lookup(&self, tenant_id: &TenantId) -> Result<Option<PointMapping>, ShardMapError> {
        let state = self.begin(ShardMapOperation::Lookup).await?;
        Ok(state.mapping(tenant_id))
    }

    async fn get_shard_by_location(
        &self,
        location: &ShardLocation,
    ) -> Result<Option<Shard>, ShardMapError> {
        let state = self.begin(ShardMapOperation::GetShardByLocation).await?;
        Ok(state
            .shards
            .iter()
            .find(|shard| shard.location() == location)
            .cloned())
    }

    async fn create_shard(&self, location: &ShardLocation) -> Result<Shard, ShardMapError> {
        let mut state = self.begin(ShardMapOperation::CreateShard).await?;
        if state.shards.iter().any(|shard| shard.location() == location) {
            return Err(ShardMapError::duplicate_shard(location.clone()));
        }
        let shard = Shard::new(ShardId::random(), location.clone());
        state.shards.push(shard.clone());
        Ok(shard)
    }

    async fn create_point_mapping(
        &self,
        tenant_id: &TenantId,
        shard: &Shard,
    ) -> Result<PointMapping, ShardMapError> {
        let mut state = self.begin(ShardMapOperation::CreatePointMapping).await?;
        if let Some(existing) = state.mapping(tenant_id) {
            return Err(ShardMapError::mapping_conflict(
                tenant_id.clone(),
                existing.shard().location().clone(),
            ));
        }
        if !state.shards.iter().any(|known| known.id() == shard.id()) {
            return Err(ShardMapError::query(format!(
                "shard {} is not registered in this map",
                shard.id()
            )));
        }
        state.mappings.insert(tenant_id.clone(), shard.id());
        Ok(PointMapping::new(tenant_id.clone(), shard.clone()))
    }

    async fn open_connection_for_key(
        &self,
        tenant_id: &TenantId,
        credentials: &Credentials,
    ) -> Result<Box<dyn ShardConnection>, ShardMapError> {
        let location = {
            let state = self.begin(ShardMapOperation::OpenConnection).await?;
            state
                .mapping(tenant_id)
                .map(|mapping| mapping.shard().location().clone())
                .ok_or_else(|| ShardMapError::unmapped_key(tenant_id.clone()))?
        };
        self.connector
            .open(&location, credentials)
            .await
            .map_err(|err| ShardMapError::driver(err.to_string()))
    }
}

/// Registry of in-memory list shard maps.
#[derive(Clone)]
pub struct InMemoryShardMapManager {
    maps: Arc<Mutex<HashMap<String, InMemoryShardMap>>>,
    connector: Arc<dyn ShardConnector>,
    unavailable: Arc<Mutex<Option<String>>>,
}

impl InMemoryShardMapManager {
    /// Manager with no maps, handing `connector` to each map it creates.
    pub fn new(connector: Arc<dyn ShardConnector>) -> Self {
        Self {
            maps: Arc::new(Mutex::new(HashMap::new())),
            connector,
            unavailable: Arc::new(Mutex::new(None)),
        }
    }

    /// Make every registry call fail with a connection error.
    pub fn set_unavailable(&self, message: Option<&str>) {
        if let Ok(mut unavailable) = self.unavailable.lock() {
            *unavailable = message.map(str::to_owned);
        }
    }

    fn check_available(&self) -> Result<(), ShardMapError> {
        let unavailable = self
            .unavailable
            .lock()
            .map_err(|_| ShardMapError::query("shard map registry poisoned"))?;
        match unavailable.as_deref() {
            Some(message) => Err(ShardMapError::connection(message)),
            None => Ok(()),
        }
    }

    fn maps(&self) -> Result<MutexGuard<'_, HashMap<String, InMemoryShardMap>>, ShardMapError> {
        self.maps
            .lock()
            .map_err(|_| ShardMapError::query("shard map registry poisoned"))
    }
}

#[async_trait]
impl ShardMapManager for InMemoryShardMapManager {
    type Map = InMemoryShardMap;

    async fn try_get_list_shard_map(&self, name: &str) -> Result<Option<InMemoryShardMap>, ShardMapError> {
        self.check_available()?;
        Ok(self.maps()?.get(name).cloned())
    }

    async fn create_list_shard_map(&self, name: &str) -> Result<InMemoryShardMap, ShardMapError> {
        self.check_available()?;
        let mut maps = self.maps()?;
        if maps.contains_key(name) {
            return Err(ShardMapError::duplicate_map(name));
        }
        let map = InMemoryShardMap::new(Arc::clone(&self.connector));
        maps.insert(name.to_owned(), map.clone());
        Ok(map)
    }
}
