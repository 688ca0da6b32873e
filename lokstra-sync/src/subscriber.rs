//! Local change callbacks (spec §4.I `Subscribe`/`Unsubscribe`): each
//! subscriber receives `(key, newValue|None)` on a fresh task per delivery
//! (spec §5 "SyncConfig per-key updates ... delivered in DB notification
//! order; deliveries for different keys may interleave" - a fresh task per
//! delivery is what makes that interleaving possible).

use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type Callback = Arc<dyn Fn(String, Option<Value>) + Send + Sync>;

#[derive(Default)]
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    subscribers: DashMap<u64, Callback>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        SubscriberRegistry::default()
    }

    pub fn subscribe(&self, cb: Callback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, cb);
        id
    }

    pub fn unsubscribe(&self, id: u64) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Deliver `(key, value)` to every current subscriber, each on its own
    /// spawned task so one slow subscriber never blocks another or the
    /// listener loop driving this call.
    pub fn dispatch(&self, key: &str, value: Option<Value>) {
        for entry in self.subscribers.iter() {
            let cb = entry.value().clone();
            let key = key.to_string();
            let value = value.clone();
            tokio::spawn(async move { cb(key, value) });
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as O};

    #[tokio::test]
    async fn subscribers_are_called_with_key_and_value() {
        let registry = SubscriberRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        registry.subscribe(Arc::new(move |key, value| {
            assert_eq!(key, "k");
            assert_eq!(value, Some(json!("v")));
            seen2.fetch_add(1, O::SeqCst);
        }));

        registry.dispatch("k", Some(json!("v")));
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(seen.load(O::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_future_deliveries() {
        let registry = SubscriberRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let id = registry.subscribe(Arc::new(move |_, _| {
            seen2.fetch_add(1, O::SeqCst);
        }));
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));

        registry.dispatch("k", None);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(seen.load(O::SeqCst), 0);
    }

    #[test]
    fn len_tracks_live_subscriptions() {
        let registry = SubscriberRegistry::new();
        assert!(registry.is_empty());
        let id = registry.subscribe(Arc::new(|_, _| {}));
        assert_eq!(registry.len(), 1);
        registry.unsubscribe(id);
        assert!(registry.is_empty());
    }
}
