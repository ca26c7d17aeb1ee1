//! In-process publish/subscribe channels.
//!
//! This module provides the two dispatch buses used by the front end:
//! - `CommandBus`: user-intent commands flowing from the UI to controllers
//! - `EventBus`: status events flowing from the machine core back to the UI
//!
//! Both are thin typed wrappers over `Bus<M>`, a synchronous multicast
//! observer list. Delivery happens inside `publish`, in subscription order,
//! to a snapshot of the handlers registered at the time of the call. A
//! panicking handler is logged and skipped; later handlers still run.

mod command;
mod event;

pub use command::{Command, CommandBus, CommandType};
pub use event::{ConsoleEvent, ConsoleEventType, EventBus};

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Handler<M> = Arc<dyn Fn(&M) + Send + Sync>;

struct BusInner<M> {
    next_id: u64,
    /// Ids are allocated in increasing order, so key order is subscription order.
    handlers: BTreeMap<u64, Handler<M>>,
}

impl<M> Default for BusInner<M> {
    fn default() -> Self {
        Self {
            next_id: 0,
            handlers: BTreeMap::new(),
        }
    }
}

fn lock_inner<M>(inner: &Mutex<BusInner<M>>) -> MutexGuard<'_, BusInner<M>> {
    // Handlers never run under the lock, so a poisoned map is still consistent.
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Synchronous multicast channel.
///
/// Clone is cheap (just clones the Arc); clones publish to the same handlers.
pub struct Bus<M> {
    name: &'static str,
    inner: Arc<Mutex<BusInner<M>>>,
}

impl<M> Clone for Bus<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> fmt::Debug for Bus<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("name", &self.name)
            .field("subscribers", &lock_inner(&self.inner).handlers.len())
            .finish()
    }
}

impl<M: fmt::Debug> Bus<M> {
    /// Create a bus. `name` only appears in diagnostics.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(BusInner::default())),
        }
    }

    /// Register a handler. It sees every message published after this call
    /// returns, and none published before.
    pub fn subscribe<F>(&self, handler: F) -> Subscription<M>
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        let mut inner = lock_inner(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.insert(id, Arc::new(handler));
        log::trace!("{}: subscriber {} added", self.name, id);
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a handler. Idempotent.
    pub fn unsubscribe(&self, subscription: &Subscription<M>) {
        lock_inner(&self.inner).handlers.remove(&subscription.id);
    }

    /// Deliver `message` to every current subscriber, in subscription order.
    pub fn publish(&self, message: M) {
        let handlers: Vec<(u64, Handler<M>)> = lock_inner(&self.inner)
            .handlers
            .iter()
            .map(|(id, handler)| (*id, Arc::clone(handler)))
            .collect();

        if handlers.is_empty() {
            log::trace!("{}: dropped {:?} (no subscribers)", self.name, message);
            return;
        }

        for (id, handler) in handlers {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| handler(&message)));
            if let Err(payload) = delivered {
                log::error!(
                    "{}: subscriber {} panicked handling {:?}: {}",
                    self.name,
                    id,
                    message,
                    panic_message(&*payload)
                );
            }
        }
    }

    /// Number of registered handlers.
    pub fn subscriber_count(&self) -> usize {
        lock_inner(&self.inner).handlers.len()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping the handle does not unsubscribe; call `unsubscribe` explicitly.
pub struct Subscription<M> {
    id: u64,
    bus: Weak<Mutex<BusInner<M>>>,
}

impl<M> Subscription<M> {
    /// Remove the handler from its bus. Idempotent, and a no-op once the
    /// bus itself is gone.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.bus.upgrade() {
            lock_inner(&inner).handlers.remove(&self.id);
        }
    }

    /// True while the handler is still registered.
    pub fn is_active(&self) -> bool {
        self.bus
            .upgrade()
            .is_some_and(|inner| lock_inner(&inner).handlers.contains_key(&self.id))
    }
}

impl<M> fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(&u32) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |m: &u32| sink.lock().unwrap().push(*m))
    }

    #[test]
    fn test_no_replay() {
        let bus: Bus<u32> = Bus::new("test");
        bus.publish(1);
        bus.publish(2);

        let (seen, handler) = recorder();
        bus.subscribe(handler);
        bus.publish(3);

        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_unsubscribe_is_immediate_and_idempotent() {
        let bus: Bus<u32> = Bus::new("test");
        let (seen, handler) = recorder();
        let sub = bus.subscribe(handler);

        bus.publish(1);
        sub.unsubscribe();
        bus.publish(2);
        sub.unsubscribe();
        bus.unsubscribe(&sub);
        bus.publish(3);

        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert!(!sub.is_active());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscription_order() {
        let bus: Bus<u32> = Bus::new("test");
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            bus.subscribe(move |m: &u32| order.lock().unwrap().push((tag, *m)));
        }

        bus.publish(7);
        bus.publish(8);

        assert_eq!(
            *order.lock().unwrap(),
            vec![("a", 7), ("b", 7), ("c", 7), ("a", 8), ("b", 8), ("c", 8)]
        );
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let bus: Bus<u32> = Bus::new("test");
        bus.subscribe(|_: &u32| panic!("handler A failed"));
        let (seen, handler) = recorder();
        bus.subscribe(handler);

        bus.publish(42);
        bus.publish(43);

        assert_eq!(*seen.lock().unwrap(), vec![42, 43]);
    }

    #[test]
    fn test_unsubscribe_during_delivery() {
        let bus: Bus<u32> = Bus::new("test");
        let slot: Arc<Mutex<Option<Subscription<u32>>>> = Arc::new(Mutex::new(None));

        let slot_in_handler = Arc::clone(&slot);
        let sub = bus.subscribe(move |_: &u32| {
            if let Some(sub) = slot_in_handler.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        let (seen, handler) = recorder();
        bus.subscribe(handler);

        bus.publish(1);
        bus.publish(2);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_publish_without_subscribers_is_lost() {
        let bus: Bus<u32> = Bus::new("test");
        bus.publish(1);

        let (seen, handler) = recorder();
        bus.subscribe(handler);
        assert!(seen.lock().unwrap().is_empty());
    }
}
