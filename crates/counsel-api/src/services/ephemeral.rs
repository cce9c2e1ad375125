//! Short-lived key/value state: verification codes, request throttles and
//! the current token of each user.
//!
//! Backed by Redis when it is enabled and reachable. Otherwise an in-process
//! map with per-key expiry is used, which is enough for a single instance and
//! for tests.
//!
//! ## Configuration
//!
//! - `REDIS_ENABLED`: set to "false" to use the in-process map (default: true)
//! - `REDIS_URL`: Redis connection URL (default: redis://localhost:6379)

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use counsel_core::{Error, Result};

/// Key for a registration that is waiting for its verification code.
pub fn registration_request_key(email: &str) -> String {
    format!("email_verification_request:{email}")
}

pub fn verification_code_key(email: &str) -> String {
    format!("verification_code:{email}")
}

pub fn code_request_key(email: &str) -> String {
    format!("verification_code_request:{email}")
}

pub fn pending_user_key(email: &str) -> String {
    format!("pending_user:{email}")
}

pub fn password_reset_key(email: &str) -> String {
    format!("password_reset_request:{email}")
}

pub fn access_token_key(user_id: &uuid::Uuid) -> String {
    format!("access_token:{user_id}")
}

pub fn refresh_token_key(user_id: &uuid::Uuid) -> String {
    format!("refresh_token:{user_id}")
}

/// Which backend is serving the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Redis => "redis",
            StoreBackend::Memory => "memory",
        }
    }
}

/// Expiring key/value store.
#[derive(Clone)]
pub struct EphemeralStore {
    inner: Arc<StoreInner>,
}

enum StoreInner {
    Redis(ConnectionManager),
    Memory(Mutex<HashMap<String, (String, Instant)>>),
}

impl EphemeralStore {
    /// Connect to Redis, falling back to the in-process map when it is
    /// disabled or unreachable.
    pub async fn connect(enabled: bool, redis_url: &str) -> Self {
        if !enabled {
            info!("Redis disabled via REDIS_ENABLED=false, using in-process store");
            return Self::in_memory();
        }
        match redis::Client::open(redis_url) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(conn) => {
                    info!(
                        "Redis store connected (URL: {})",
                        redis_url.replace(|c: char| c.is_ascii_alphanumeric(), "*")
                    );
                    Self {
                        inner: Arc::new(StoreInner::Redis(conn)),
                    }
                }
                Err(e) => {
                    warn!("Failed to connect to Redis, using in-process store: {}", e);
                    Self::in_memory()
                }
            },
            Err(e) => {
                warn!("Invalid Redis URL, using in-process store: {}", e);
                Self::in_memory()
            }
        }
    }

    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(StoreInner::Memory(Mutex::new(HashMap::new()))),
        }
    }

    pub fn backend(&self) -> StoreBackend {
        match *self.inner {
            StoreInner::Redis(_) => StoreBackend::Redis,
            StoreInner::Memory(_) => StoreBackend::Memory,
        }
    }

    /// Set `key` to `value`, expiring after `ttl`.
    pub async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        match &*self.inner {
            StoreInner::Redis(conn) => {
                let mut conn = conn.clone();
                conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                    .await
                    .map_err(redis_error)?;
            }
            StoreInner::Memory(map) => {
                let now = Instant::now();
                let mut map = lock(map);
                // Throttle keys are often never read again, so expiry happens on write too.
                map.retain(|_, (_, expires)| *expires > now);
                map.insert(key.to_string(), (value.to_string(), now + ttl));
            }
        }
        debug!(key, ttl_secs = ttl.as_secs(), "Store SET");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        match &*self.inner {
            StoreInner::Redis(conn) => {
                let mut conn = conn.clone();
                conn.get::<_, Option<String>>(key).await.map_err(redis_error)
            }
            StoreInner::Memory(map) => {
                let mut map = lock(map);
                match map.get(key) {
                    Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
                    Some(_) => {
                        map.remove(key);
                        Ok(None)
                    }
                    None => Ok(None),
                }
            }
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        match &*self.inner {
            StoreInner::Redis(conn) => {
                let mut conn = conn.clone();
                conn.exists::<_, bool>(key).await.map_err(redis_error)
            }
            StoreInner::Memory(_) => Ok(self.get(key).await?.is_some()),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        match &*self.inner {
            StoreInner::Redis(conn) => {
                let mut conn = conn.clone();
                conn.del::<_, ()>(key).await.map_err(redis_error)?;
            }
            StoreInner::Memory(map) => {
                lock(map).remove(key);
            }
        }
        debug!(key, "Store DEL");
        Ok(())
    }

    /// Live entries held in process, `None` when backed by Redis.
    pub fn memory_len(&self) -> Option<usize> {
        match &*self.inner {
            StoreInner::Redis(_) => None,
            StoreInner::Memory(map) => Some(lock(map).len()),
        }
    }

    /// Round-trip check for the health endpoint.
    pub async fn ping(&self) -> bool {
        match &*self.inner {
            StoreInner::Redis(conn) => {
                let mut conn = conn.clone();
                redis::cmd("PING")
                    .query_async::<String>(&mut conn)
                    .await
                    .is_ok()
            }
            StoreInner::Memory(_) => true,
        }
    }
}

fn lock(
    map: &Mutex<HashMap<String, (String, Instant)>>,
) -> MutexGuard<'_, HashMap<String, (String, Instant)>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn redis_error(e: redis::RedisError) -> Error {
    Error::Internal(format!("Redis error: {e}"))
}
