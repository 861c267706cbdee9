//! Per-user context cache shared by workflow runs.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::models::UserContext;

#[derive(Debug, Clone, Copy)]
pub struct ContextSettings {
    /// Maximum number of users held at once.
    pub capacity: usize,
    /// Idle time after which a context is forgotten; `None` keeps it forever.
    pub ttl: Option<Duration>,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl: None,
        }
    }
}

struct Entry {
    context: UserContext,
    touched: Instant,
}

pub struct ContextStore {
    entries: RwLock<HashMap<String, Entry>>,
    settings: ContextSettings,
}

impl ContextStore {
    pub fn new(settings: ContextSettings) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            settings,
        }
    }

    pub async fn get(&self, user_id: &str) -> Option<UserContext> {
        let entries = self.entries.read().await;
        entries
            .get(user_id)
            .filter(|entry| !self.is_expired(entry, Instant::now()))
            .map(|entry| entry.context.clone())
    }

    /// Replaces whatever is stored for `user_id`.
    pub async fn put(&self, user_id: &str, context: UserContext) {
        let mut entries = self.entries.write().await;
        entries.insert(
            user_id.to_string(),
            Entry {
                context,
                touched: Instant::now(),
            },
        );
        self.enforce_limits(&mut entries);
    }

    /// Get-or-create, mutate, and write back under a single write lock.
    pub async fn update<F>(&self, user_id: &str, mutate: F) -> UserContext
    where
        F: FnOnce(&mut UserContext),
    {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        if entries
            .get(user_id)
            .is_some_and(|entry| self.is_expired(entry, now))
        {
            entries.remove(user_id);
        }

        let entry = entries.entry(user_id.to_string()).or_insert_with(|| Entry {
            context: UserContext::new(user_id),
            touched: now,
        });
        mutate(&mut entry.context);
        entry.touched = now;
        let snapshot = entry.context.clone();

        self.enforce_limits(&mut entries);
        snapshot
    }

    /// Number of live (unexpired) contexts.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| !self.is_expired(entry, now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        self.settings
            .ttl
            .is_some_and(|ttl| now.duration_since(entry.touched) > ttl)
    }

    /// Expired entries are only swept once the map outgrows its capacity;
    /// until then reads filter them out.
    fn enforce_limits(&self, entries: &mut HashMap<String, Entry>) {
        if entries.len() <= self.settings.capacity {
            return;
        }

        let now = Instant::now();
        if self.settings.ttl.is_some() {
            entries.retain(|_, entry| !self.is_expired(entry, now));
        }

        while entries.len() > self.settings.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.touched)
                .map(|(user_id, _)| user_id.clone());
            match oldest {
                Some(user_id) => {
                    debug!(user_id = %user_id, "Evicting least recently written context");
                    entries.remove(&user_id);
                }
                None => break,
            }
        }
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new(ContextSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_user_has_no_context() {
        let store = ContextStore::default();
        assert!(store.get("nobody").await.is_none());
    }

    #[tokio::test]
    async fn put_replaces_the_whole_context() {
        let store = ContextStore::default();
        let mut ctx = UserContext::new("u1");
        ctx.cart_items.push("sku-1".to_string());
        store.put("u1", ctx).await;

        store.put("u1", UserContext::new("u1")).await;
        let stored = store.get("u1").await.unwrap();
        assert!(stored.cart_items.is_empty());
    }

    #[tokio::test]
    async fn update_creates_missing_context() {
        let store = ContextStore::default();
        let ctx = store.update("u1", |ctx| ctx.record_query("boots", 10)).await;
        assert_eq!(ctx.user_id, "u1");
        assert_eq!(ctx.history, ["boots"]);
        assert_eq!(store.get("u1").await.unwrap(), ctx);
    }

    #[tokio::test]
    async fn concurrent_updates_are_not_lost() {
        let store = std::sync::Arc::new(ContextStore::default());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update("shared", |ctx| ctx.record_query(&format!("q{}", i), 10))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.get("shared").await.unwrap().history.len(), 8);
    }

    #[tokio::test]
    async fn evicts_least_recently_written_when_full() {
        let store = ContextStore::new(ContextSettings {
            capacity: 2,
            ttl: None,
        });
        store.put("a", UserContext::new("a")).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        store.put("b", UserContext::new("b")).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        store.update("a", |_| {}).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        store.put("c", UserContext::new("c")).await;

        assert_eq!(store.len().await, 2);
        assert!(store.get("a").await.is_some());
        assert!(store.get("b").await.is_none());
        assert!(store.get("c").await.is_some());
    }

    #[tokio::test]
    async fn expired_context_is_treated_as_absent() {
        let store = ContextStore::new(ContextSettings {
            capacity: 10,
            ttl: Some(Duration::from_millis(20)),
        });
        store.update("u1", |ctx| ctx.record_query("old", 10)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.get("u1").await.is_none());
        let fresh = store.update("u1", |ctx| ctx.record_query("new", 10)).await;
        assert_eq!(fresh.history, ["new"]);
    }

    #[tokio::test]
    async fn len_skips_expired_contexts() {
        let store = ContextStore::new(ContextSettings {
            capacity: 10,
            ttl: Some(Duration::from_millis(20)),
        });
        store.put("old", UserContext::new("old")).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        store.put("new", UserContext::new("new")).await;

        assert_eq!(store.len().await, 1);
        assert_eq!(store.entries.read().await.len(), 2);
    }

    #[tokio::test]
    async fn expired_contexts_are_swept_before_evicting_live_ones() {
        let store = ContextStore::new(ContextSettings {
            capacity: 2,
            ttl: Some(Duration::from_millis(20)),
        });
        store.put("stale", UserContext::new("stale")).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        store.put("a", UserContext::new("a")).await;
        store.put("b", UserContext::new("b")).await;

        let entries = store.entries.read().await;
        assert_eq!(entries.len(), 2);
        assert!(entries.contains_key("a"));
        assert!(entries.contains_key("b"));
    }
}
