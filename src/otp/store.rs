/// OTP challenge storage backends
use crate::{
    cache::{categories, CacheClient},
    error::IcuResult,
    otp::OtpChallenge,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Redis keeps entries this much longer than the challenge itself, so an
/// expired challenge is still seen and reported as expired.
const REDIS_GRACE_SECONDS: i64 = 60;

/// Challenge storage keyed by normalized email
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Store a challenge, replacing any existing one for `email`
    async fn put(&self, email: &str, challenge: &OtpChallenge, ttl: Duration) -> IcuResult<()>;

    async fn get(&self, email: &str) -> IcuResult<Option<OtpChallenge>>;

    /// Remove the challenge. Absent keys are not an error.
    async fn remove(&self, email: &str) -> IcuResult<()>;
}

/// Process-local store. Challenges vanish on restart and are not shared
/// between instances.
#[derive(Default)]
pub struct MemoryOtpStore {
    entries: RwLock<HashMap<String, OtpChallenge>>,
}

impl MemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    /// Also drops every expired challenge, so abandoned requests do not
    /// accumulate
    async fn put(&self, email: &str, challenge: &OtpChallenge, _ttl: Duration) -> IcuResult<()> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, existing| existing.expires_at > now);
        entries.insert(email.to_string(), challenge.clone());
        Ok(())
    }

    async fn get(&self, email: &str) -> IcuResult<Option<OtpChallenge>> {
        Ok(self.entries.read().await.get(email).cloned())
    }

    async fn remove(&self, email: &str) -> IcuResult<()> {
        self.entries.write().await.remove(email);
        Ok(())
    }
}

/// Shared store backed by Redis with key expiry
pub struct RedisOtpStore {
    cache: CacheClient,
}

impl RedisOtpStore {
    pub fn new(cache: CacheClient) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl OtpStore for RedisOtpStore {
    async fn put(&self, email: &str, challenge: &OtpChallenge, ttl: Duration) -> IcuResult<()> {
        let ttl_secs = (ttl.num_seconds() + REDIS_GRACE_SECONDS).max(1) as u64;
        self.cache
            .set(categories::OTP_CHALLENGE, email, challenge, ttl_secs)
            .await
    }

    async fn get(&self, email: &str) -> IcuResult<Option<OtpChallenge>> {
        self.cache.get(categories::OTP_CHALLENGE, email).await
    }

    async fn remove(&self, email: &str) -> IcuResult<()> {
        self.cache.delete(categories::OTP_CHALLENGE, email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(code: &str) -> OtpChallenge {
        OtpChallenge {
            code: code.to_string(),
            expires_at: Utc::now() + Duration::minutes(5),
            patient_id: "patient-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_overwrites_and_removes() {
        let store = MemoryOtpStore::new();

        store
            .put("jane@example.com", &challenge("111111"), Duration::minutes(5))
            .await
            .unwrap();
        store
            .put("jane@example.com", &challenge("222222"), Duration::minutes(5))
            .await
            .unwrap();

        let stored = store.get("jane@example.com").await.unwrap().unwrap();
        assert_eq!(stored.code, "222222");

        store.remove("jane@example.com").await.unwrap();
        store.remove("jane@example.com").await.unwrap();
        assert!(store.get("jane@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_drops_expired_on_put() {
        let store = MemoryOtpStore::new();

        let stale = OtpChallenge {
            expires_at: Utc::now() - Duration::minutes(1),
            ..challenge("111111")
        };
        store
            .put("abandoned@example.com", &stale, Duration::minutes(5))
            .await
            .unwrap();
        store
            .put("pending@example.com", &challenge("222222"), Duration::minutes(5))
            .await
            .unwrap();

        assert!(store.get("abandoned@example.com").await.unwrap().is_none());
        assert!(store.get("pending@example.com").await.unwrap().is_some());
    }
}
