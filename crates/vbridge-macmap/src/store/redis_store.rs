//! Redis-backed snapshot store.
//!
//! Each mapping's snapshot is a Redis hash named `<prefix>|<mapping>` whose
//! fields are packed host keys (decimal) and whose values are switch ports.

use super::{HostBinding, MappingStore, StatusSnapshot, StoreError, StoreResult};
use crate::host::HostKey;
use crate::mapping::MappingId;
use async_trait::async_trait;
use log::{debug, info};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use vbridge_types::SwitchPort;

/// Configuration for the Redis snapshot store.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis server hostname or IP
    pub host: String,
    /// Redis server port
    pub port: u16,
    /// Database index
    pub db: u8,
    /// Prefix of every snapshot key
    pub key_prefix: String,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 6,
            key_prefix: "MAC_MAPPING_STATUS".to_string(),
        }
    }
}

impl RedisStoreConfig {
    /// Creates a new configuration for the given server.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Sets the database index.
    pub fn with_db(mut self, db: u8) -> Self {
        self.db = db;
        self
    }

    /// Sets the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Returns the Redis connection URI.
    fn uri(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }

    /// Returns the Redis key holding a mapping's snapshot.
    fn key(&self, id: &MappingId) -> String {
        format!("{}|{}", self.key_prefix, id)
    }
}

/// Snapshot store on a Redis server.
pub struct RedisStore {
    config: RedisStoreConfig,
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connects to the configured Redis server.
    pub async fn connect(config: RedisStoreConfig) -> StoreResult<Self> {
        let uri = config.uri();

        let client = redis::Client::open(uri.clone())
            .map_err(|e| StoreError::ConnectionError(format!("{}: {}", uri, e)))?;

        let connection = client.get_connection_manager().await.map_err(|e| {
            StoreError::ConnectionError(format!("Failed to create connection manager: {}", e))
        })?;

        info!("Connected to Redis: {} (db={})", config.host, config.db);

        Ok(Self { config, connection })
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &RedisStoreConfig {
        &self.config
    }
}

#[async_trait]
impl MappingStore for RedisStore {
    async fn read(&self, id: &MappingId) -> StoreResult<Option<StatusSnapshot>> {
        let key = self.config.key(id);
        let mut conn = self.connection.clone();

        let fields: HashMap<String, String> = conn
            .hgetall(&key)
            .await
            .map_err(|e| StoreError::CommandError(format!("HGETALL failed: {}", e)))?;
        if fields.is_empty() {
            return Ok(None);
        }

        let hosts = fields
            .iter()
            .map(|(host, port)| parse_binding(id, host, port))
            .collect::<StoreResult<Vec<_>>>()?;

        debug!("{}: read {} host bindings from {}", id, hosts.len(), key);
        Ok(Some(StatusSnapshot::new(hosts)))
    }

    async fn write(&self, id: &MappingId, snapshot: &StatusSnapshot) -> StoreResult<()> {
        if snapshot.is_empty() {
            return self.delete(id).await;
        }

        let key = self.config.key(id);
        let mut conn = self.connection.clone();
        let fields: Vec<(String, String)> = snapshot
            .hosts
            .iter()
            .map(|b| (b.host().encode().to_string(), b.port.to_string()))
            .collect();

        let _: () = redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .hset_multiple(&key, fields.as_slice())
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::CommandError(format!("HSET failed: {}", e)))?;

        debug!("{}: wrote {} host bindings to {}", id, fields.len(), key);
        Ok(())
    }

    async fn delete(&self, id: &MappingId) -> StoreResult<()> {
        let key = self.config.key(id);
        let mut conn = self.connection.clone();

        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| StoreError::CommandError(format!("DEL failed: {}", e)))?;

        debug!("{}: deleted {}", id, key);
        Ok(())
    }
}

/// Parses one snapshot hash field.
fn parse_binding(id: &MappingId, host: &str, port: &str) -> StoreResult<HostBinding> {
    let invalid = |reason: String| StoreError::InvalidSnapshot {
        mapping: id.clone(),
        reason,
    };

    let host: HostKey = host
        .parse()
        .map_err(|e| invalid(format!("host {}: {}", host, e)))?;
    let mac = host
        .mac()
        .ok_or_else(|| invalid(format!("wildcard host: {}", host)))?;
    let port: SwitchPort = port
        .parse()
        .map_err(|e| invalid(format!("port {}: {}", port, e)))?;

    Ok(HostBinding {
        mac,
        vlan: host.vlan(),
        port,
    })
}
