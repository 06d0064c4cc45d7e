//! Registry of named list shard maps and the bootstrap slot built from it.
//!
//! The map store may be unreachable when the router starts. Rather than
//! failing construction, [`ShardMapSlot::initialise`] logs the failure and
//! yields an unavailable slot; services treat an unavailable slot as "no
//! mapping" on lookup and as a provisioning failure on mutation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use super::{ShardMap, ShardMapError};

/// Port for locating or creating a named list shard map.
#[async_trait]
pub trait ShardMapManager: Send + Sync {
    /// Concrete shard map handle produced by this manager.
    type Map: ShardMap;

    /// Return the map named `name` if it exists.
    async fn try_get_list_shard_map(&self, name: &str) -> Result<Option<Self::Map>, ShardMapError>;

    /// Create the map named `name`.
    async fn create_list_shard_map(&self, name: &str) -> Result<Self::Map, ShardMapError>;
}

/// Shard map shared by the management and connection services.
pub struct ShardMapSlot<M> {
    name: String,
    map: Option<Arc<M>>,
}

impl<M> Clone for ShardMapSlot<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            map: self.map.clone(),
        }
    }
}

impl<M> std::fmt::Debug for ShardMapSlot<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardMapSlot")
            .field("name", &self.name)
            .field("available", &self.map.is_some())
            .finish()
    }
}

impl<M: ShardMap> ShardMapSlot<M> {
    /// Get the map named `name`, creating it when missing.
    ///
    /// Failures are logged and produce an unavailable slot.
    pub async fn initialise<G>(manager: &G, name: &str) -> Self
    where
        G: ShardMapManager<Map = M>,
    {
        match Self::get_or_create(manager, name).await {
            Ok(map) => Self::ready(name, Arc::new(map)),
            Err(err) => {
                error!(shard_map = name, error = %err, "shard map initialisation failed");
                Self::unavailable(name)
            }
        }
    }

    async fn get_or_create<G>(manager: &G, name: &str) -> Result<M, ShardMapError>
    where
        G: ShardMapManager<Map = M>,
    {
        if let Some(map) = manager.try_get_list_shard_map(name).await? {
            debug!(shard_map = name, "using existing shard map");
            return Ok(map);
        }
        match manager.create_list_shard_map(name).await {
            Ok(map) => {
                info!(shard_map = name, "created shard map");
                Ok(map)
            }
            // Another router created it between the two calls.
            Err(ShardMapError::DuplicateMap { .. }) => manager
                .try_get_list_shard_map(name)
                .await?
                .ok_or_else(|| ShardMapError::query(format!("shard map {name} vanished"))),
            Err(err) => Err(err),
        }
    }
}

impl<M> ShardMapSlot<M> {
    /// Slot holding an initialised map.
    pub fn ready(name: impl Into<String>, map: Arc<M>) -> Self {
        Self {
            name: name.into(),
            map: Some(map),
        }
    }

    /// Slot whose map could not be initialised.
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            map: None,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The shard map, if initialisation succeeded.
    pub fn get(&self) -> Option<&M> {
        self.map.as_deref()
    }

    pub fn is_available(&self) -> bool {
        self.map.is_some()
    }
}
