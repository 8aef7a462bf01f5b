//! Per-category callback registries.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type Entries<T> = Mutex<Vec<(u64, Callback<T>)>>;

fn lock<T: ?Sized>(entries: &Entries<T>) -> MutexGuard<'_, Vec<(u64, Callback<T>)>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An ordered list of callbacks for one event category.
///
/// Callbacks run in subscription order. Each one is isolated: a panicking
/// callback is logged and the rest still run. The list is snapshotted before
/// dispatch, so callbacks may subscribe or unsubscribe while being notified.
pub struct Registry<T: ?Sized> {
    name: &'static str,
    entries: Arc<Entries<T>>,
    next_id: AtomicU64,
}

impl<T: ?Sized + 'static> Registry<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback`. The returned [`Subscription`] removes exactly this
    /// registration.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Callback<T> = Arc::new(callback);
        lock(&self.entries).push((id, callback));

        let entries: Weak<Entries<T>> = Arc::downgrade(&self.entries);
        Subscription {
            category: self.name,
            remove: Box::new(move || {
                if let Some(entries) = entries.upgrade() {
                    lock(&entries).retain(|(entry_id, _)| *entry_id != id);
                }
            }),
        }
    }

    /// Invoke every registered callback with `value`. Returns how many
    /// completed without panicking.
    pub fn notify(&self, value: &T) -> usize {
        let snapshot: Vec<Callback<T>> = lock(&self.entries)
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        let mut delivered = 0;
        for callback in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(value))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::error!("{} subscriber panicked; continuing with the rest", self.name);
                }
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Disposer returned by a subscribe call.
///
/// Dropping it leaves the callback registered; call [`Subscription::unsubscribe`]
/// to remove it. Unsubscribing more than once is a no-op.
pub struct Subscription {
    category: &'static str,
    remove: Box<dyn Fn() + Send + Sync>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        (self.remove)();
    }

    pub fn category(&self) -> &'static str {
        self.category
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (log.clone(), log)
    }

    #[test]
    fn notifies_in_subscription_order() {
        let registry: Registry<str> = Registry::new("error");
        let (log, seen) = recorder();
        let first = log.clone();
        let _a =
            registry.subscribe(move |msg: &str| first.lock().unwrap().push(format!("a:{msg}")));
        let _b =
            registry.subscribe(move |msg: &str| log.lock().unwrap().push(format!("b:{msg}")));

        assert_eq!(registry.notify("boom"), 2);
        assert_eq!(*seen.lock().unwrap(), vec!["a:boom", "b:boom"]);
    }

    #[test]
    fn panicking_subscriber_does_not_starve_the_rest() {
        let registry: Registry<u32> = Registry::new("score");
        let (log, seen) = recorder();
        let _bad = registry.subscribe(|_: &u32| panic!("subscriber failure"));
        let _good =
            registry.subscribe(move |value: &u32| log.lock().unwrap().push(value.to_string()));

        assert_eq!(registry.notify(&7), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["7"]);
    }

    #[test]
    fn unsubscribe_twice_only_removes_its_own_entry() {
        let registry: Registry<u32> = Registry::new("stat");
        let (log, seen) = recorder();
        let first = registry.subscribe(|_: &u32| {});
        first.unsubscribe();

        let _second =
            registry.subscribe(move |value: &u32| log.lock().unwrap().push(value.to_string()));
        first.unsubscribe();

        assert_eq!(registry.len(), 1);
        registry.notify(&3);
        assert_eq!(*seen.lock().unwrap(), vec!["3"]);
    }

    #[test]
    fn same_closure_registered_twice_is_removed_individually() {
        let registry: Registry<u32> = Registry::new("news");
        let (log, seen) = recorder();
        let callback = move |value: &u32| log.lock().unwrap().push(value.to_string());
        let a = registry.subscribe(callback.clone());
        let _b = registry.subscribe(callback);

        a.unsubscribe();
        registry.notify(&1);
        assert_eq!(*seen.lock().unwrap(), vec!["1"]);
    }

    #[test]
    fn callbacks_may_unsubscribe_during_dispatch() {
        let registry: Arc<Registry<u32>> = Arc::new(Registry::new("status"));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_for_cb = slot.clone();
        let subscription = registry.subscribe(move |_: &u32| {
            if let Some(sub) = slot_for_cb.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(subscription);

        assert_eq!(registry.notify(&1), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn subscription_outliving_registry_is_harmless() {
        let registry: Registry<u32> = Registry::new("game");
        let subscription = registry.subscribe(|_: &u32| {});
        drop(registry);
        subscription.unsubscribe();
        assert_eq!(subscription.category(), "game");
    }
}
