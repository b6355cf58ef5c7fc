//! Lightweight multi-subscriber events.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Handler = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<Listener>,
}

struct Listener {
    id: u64,
    once: bool,
    handler: Handler,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Event with any number of listeners.
///
/// `trigger` calls every listener synchronously, in registration order.
/// Listeners run outside the registry lock, so they may subscribe,
/// unsubscribe or trigger other events. A listener removed while a dispatch
/// is in progress still receives that dispatch.
#[derive(Clone, Default)]
pub struct LiteEvent {
    registry: Arc<Mutex<Registry>>,
}

/// Handle returned by `LiteEvent::on`.
///
/// Dropping it leaves the listener registered; call `unsubscribe` to remove it.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).handlers.retain(|l| l.id != self.id);
        }
    }
}

impl LiteEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener called on every trigger
    pub fn on<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(Arc::new(handler), false)
    }

    /// Register a listener called on the next trigger only
    pub fn once<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(Arc::new(handler), true)
    }

    fn register(&self, handler: Handler, once: bool) -> Subscription {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.push(Listener { id, once, handler });
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Call every listener. Returns how many were called.
    pub fn trigger(&self) -> usize {
        let snapshot: Vec<Handler> = {
            let mut registry = lock(&self.registry);
            let snapshot = registry.handlers.iter().map(|l| l.handler.clone()).collect();
            registry.handlers.retain(|l| !l.once);
            snapshot
        };

        for handler in &snapshot {
            handler();
        }
        snapshot.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_trigger_in_registration_order() {
        let event = LiteEvent::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            event.on(move || order.lock().unwrap().push(i));
        }

        assert_eq!(event.trigger(), 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unsubscribe() {
        let event = LiteEvent::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        let sub = event.on(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        event.trigger();
        sub.unsubscribe();
        event.trigger();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(event.is_empty());
    }

    #[test]
    fn test_dropped_subscription_stays_registered() {
        let event = LiteEvent::new();
        drop(event.on(|| {}));
        assert_eq!(event.len(), 1);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let event = LiteEvent::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        event.once(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        event.trigger();
        event.trigger();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(event.is_empty());
    }

    #[test]
    fn test_listener_can_subscribe_during_dispatch() {
        let event = LiteEvent::new();
        let inner = event.clone();
        event.once(move || {
            inner.on(|| {});
        });

        assert_eq!(event.trigger(), 1);
        assert_eq!(event.len(), 1);
    }
}
