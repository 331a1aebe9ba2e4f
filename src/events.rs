use crate::query::Query;
use dashmap::DashMap;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lifecycle of a request that reached the network.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestEvent {
    Started { query: Query },
    Succeeded { data: Value },
    Failed { error: String },
}

impl RequestEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RequestEvent::Started { .. } => "api:request:start",
            RequestEvent::Succeeded { .. } => "api:request:success",
            RequestEvent::Failed { .. } => "api:request:error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&RequestEvent) + Send + Sync>;

/// Best-effort fan-out of [`RequestEvent`]s. A panicking observer is logged
/// and skipped; it never reaches the requester or the other observers.
#[derive(Default)]
pub struct EventObservers {
    observers: DashMap<SubscriptionId, Observer>,
    next_id: AtomicU64,
}

impl EventObservers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&RequestEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.insert(id, Arc::new(observer));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn emit(&self, event: &RequestEvent) {
        // Snapshot first so observers may (un)subscribe while being notified.
        let observers: Vec<Observer> = self
            .observers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for observer in observers {
            if catch_unwind(AssertUnwindSafe(|| observer(event))).is_err() {
                tracing::error!("observer panicked while handling {}", event.name());
            }
        }
    }
}
