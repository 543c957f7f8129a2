/// Redis-backed key-value layer
///
/// Used as the shared, TTL-capable store for OTP challenges when more than
/// one process serves the patient portal.

use crate::{
    config::CacheConfig,
    error::{IcuError, IcuResult},
};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, warn};

/// Key namespaces
pub mod categories {
    pub const OTP_CHALLENGE: &str = "otp:";
}

/// Redis cache client
#[derive(Clone)]
pub struct CacheClient {
    connection: ConnectionManager,
    key_prefix: String,
}

impl CacheClient {
    /// Connect to Redis
    pub async fn new(config: &CacheConfig) -> IcuResult<Self> {
        info!("Connecting to Redis at {}", config.redis_url);

        let client = Client::open(config.redis_url.as_str()).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            IcuError::Internal(format!("Redis client creation failed: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            IcuError::Internal(format!("Redis connection failed: {}", e))
        })?;

        info!("Redis connection established");

        Ok(Self {
            connection,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn build_key(&self, category: &str, key: &str) -> String {
        build_key(&self.key_prefix, category, key)
    }

    /// Get a value from cache
    pub async fn get<T: DeserializeOwned>(&self, category: &str, key: &str) -> IcuResult<Option<T>> {
        let cache_key = self.build_key(category, key);

        let mut conn = self.connection.clone();
        let result: Option<String> = conn.get(&cache_key).await.map_err(|e| {
            warn!("Redis GET failed for {}: {}", cache_key, e);
            IcuError::Internal(format!("Cache get failed: {}", e))
        })?;

        match result {
            Some(json) => match serde_json::from_str(&json) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!("Failed to deserialize cached value: {}", e);
                    let _ = self.delete(category, key).await;
                    Ok(None)
                }
            },
            None => {
                debug!("Cache MISS: {}", cache_key);
                Ok(None)
            }
        }
    }

    /// Set a value with a TTL in seconds, replacing any previous value
    pub async fn set<T: Serialize>(
        &self,
        category: &str,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> IcuResult<()> {
        let cache_key = self.build_key(category, key);

        let json = serde_json::to_string(value).map_err(|e| {
            error!("Failed to serialize value for cache: {}", e);
            IcuError::Internal(format!("Cache serialization failed: {}", e))
        })?;

        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(&cache_key, json, ttl_secs)
            .await
            .map_err(|e| {
                warn!("Redis SET failed for {}: {}", cache_key, e);
                IcuError::Internal(format!("Cache set failed: {}", e))
            })?;

        debug!("Cache SET: {} (TTL: {}s)", cache_key, ttl_secs);
        Ok(())
    }

    /// Delete a value
    pub async fn delete(&self, category: &str, key: &str) -> IcuResult<()> {
        let cache_key = self.build_key(category, key);

        let mut conn = self.connection.clone();
        conn.del::<_, ()>(&cache_key).await.map_err(|e| {
            warn!("Redis DELETE failed for {}: {}", cache_key, e);
            IcuError::Internal(format!("Cache delete failed: {}", e))
        })?;

        Ok(())
    }
}

fn build_key(prefix: &str, category: &str, key: &str) -> String {
    format!("{}{}{}", prefix, category, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_key() {
        assert_eq!(
            build_key("icu:", categories::OTP_CHALLENGE, "jane@example.com"),
            "icu:otp:jane@example.com"
        );
    }
}
