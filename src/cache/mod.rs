pub mod redis;

pub use self::redis::RedisCache;

use crate::error::Result;
use crate::registry::parse_timestamp;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Key/value store remembering tag creation dates between runs.
#[async_trait]
pub trait TagCache: Send + Sync {
    /// `Ok(None)` is a clean miss.
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

pub fn cache_key(image: &str, tag: &str) -> String {
    return format!("{}:{}", image, tag);
}

pub fn format_timestamp(date: &DateTime<Utc>) -> String {
    return date.to_rfc3339_opts(SecondsFormat::AutoSi, true);
}

/// Cache-aside lookup of a tag date.
///
/// The cache never makes the lookup fail: read errors and unreadable entries
/// fall through to `fetch`, and write errors are only logged.
pub async fn cached_tag_date<F, Fut>(
    cache: &dyn TagCache,
    key: &str,
    ttl: Duration,
    fetch: F,
) -> Result<DateTime<Utc>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<DateTime<Utc>>>,
{
    match cache.get(key).await {
        Ok(Some(value)) => match parse_timestamp(&value) {
            Ok(date) => {
                debug!("Image tag {} present in cache", key);
                return Ok(date);
            }
            Err(err) => warn!("Ignoring cache entry for {}: {}", key, err),
        },
        Ok(None) => debug!("Image tag {} not in cache, calling container registry", key),
        Err(err) => warn!("Cache lookup for {} failed, calling container registry: {}", key, err),
    }

    let date = fetch().await?;
    if let Err(err) = cache.set(key, &format_timestamp(&date), ttl).await {
        warn!("Could not store {} in cache: {}", key, err);
    }
    return Ok(date);
}

/// In-process cache with per-entry expiry. A zero TTL never expires.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

fn is_live(expires: &Option<Instant>, now: Instant) -> bool {
    return expires.map_or(true, |expires| expires > now);
}

impl MemoryCache {
    pub fn new() -> MemoryCache {
        return MemoryCache::default();
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        return entries.values().filter(|(_, expires)| is_live(expires, now)).count();
    }

    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }
}

#[async_trait]
impl TagCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match entries.get(key) {
            Some((value, expires)) if is_live(expires, Instant::now()) => {
                return Ok(Some(value.clone()))
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        return Ok(None);
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let expires = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        entries.insert(key.to_string(), (value.to_string(), expires));
        return Ok(());
    }
}
