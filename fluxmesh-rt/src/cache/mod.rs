//! In-memory TTL cache with expiry notification.
//!
//! Expired entries are delivered as [`Event::CacheExpiry`] to a
//! registered component queue, giving components a uniform way to react
//! to timeouts alongside ordinary messages.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

// Layer 3: Internal module imports
use crate::message::Event;

const REAPER_INTERVAL_MS: u64 = 250;

struct CacheEntry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

/// Connector-scoped cache service.
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct CacheService {
    entries: Arc<DashMap<String, CacheEntry>>,
    expiry_target: Arc<RwLock<Option<mpsc::Sender<Event>>>>,
}

impl CacheService {
    /// Create the service and start its expiry reaper.
    pub fn start(cancel: CancellationToken) -> Self {
        let service = Self {
            entries: Arc::new(DashMap::new()),
            expiry_target: Arc::new(RwLock::new(None)),
        };
        let reaper = service.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_millis(REAPER_INTERVAL_MS)) => {}
                }
                reaper.reap();
            }
        });
        service
    }

    /// Deliver expiry events to `target` (one queue per connector).
    pub fn set_expiry_target(&self, target: mpsc::Sender<Event>) {
        *self.expiry_target.write() = Some(target);
    }

    /// Store `value` under `key`, expiring after `ttl` if given.
    pub fn put(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| {
            Utc::now()
                + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero())
        });
        self.entries
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Fetch a value, if present and not expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        let entry = self.entries.get(key)?;
        if let Some(expires_at) = entry.expires_at {
            if expires_at <= Utc::now() {
                return None;
            }
        }
        Some(entry.value.clone())
    }

    /// Remove a key. Returns the stored value when it existed.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    /// Number of live entries (including not-yet-reaped expired ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn reap(&self) {
        let now = Utc::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .expires_at
                    .map(|deadline| deadline <= now)
                    .unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect();

        for key in expired {
            if let Some((key, entry)) = self.entries.remove(&key) {
                let target = self.expiry_target.read().clone();
                if let Some(target) = target {
                    let event = Event::CacheExpiry {
                        key,
                        value: entry.value,
                    };
                    if target.try_send(event).is_err() {
                        warn!("cache expiry target full; expiry event dropped");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_remove() {
        let cache = CacheService::start(CancellationToken::new());
        cache.put("k", json!({"v": 1}), None);
        assert_eq!(cache.get("k"), Some(json!({"v": 1})));
        assert_eq!(cache.remove("k"), Some(json!({"v": 1})));
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_gone() {
        let cache = CacheService::start(CancellationToken::new());
        cache.put("k", json!(1), Some(Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test]
    async fn test_expiry_event_delivered() {
        let cache = CacheService::start(CancellationToken::new());
        let (tx, mut rx) = mpsc::channel(4);
        cache.set_expiry_target(tx);

        cache.put("expiring", json!("v"), Some(Duration::from_millis(10)));
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            Event::CacheExpiry { key, value } => {
                assert_eq!(key, "expiring");
                assert_eq!(value, json!("v"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
