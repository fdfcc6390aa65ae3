use std::sync::{Arc, Mutex, Weak};

use smallvec::SmallVec;

type Observer<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Slots<E> {
    next_id: u64,
    observers: SmallVec<[(u64, Observer<E>); 4]>,
}

/// Typed subscriber list. Subscribing hands back a [`Subscription`] guard;
/// dropping the guard removes the observer.
pub struct ObserverRegistry<E> {
    slots: Arc<Mutex<Slots<E>>>,
}

impl<E> Clone for ObserverRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}

impl<E: 'static> Default for ObserverRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> ObserverRegistry<E> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                observers: SmallVec::new(),
            })),
        }
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let Ok(mut slots) = self.slots.lock() else {
            return Subscription::inert();
        };
        let id = slots.next_id;
        slots.next_id += 1;
        slots.observers.push((id, Arc::new(observer)));
        drop(slots);

        let weak: Weak<Mutex<Slots<E>>> = Arc::downgrade(&self.slots);
        Subscription {
            release: Some(Box::new(move || {
                let Some(slots) = weak.upgrade() else {
                    return;
                };
                if let Ok(mut slots) = slots.lock() {
                    slots.observers.retain(|(slot_id, _)| *slot_id != id);
                }
            })),
        }
    }

    /// Notify every observer registered at the time of the call.
    ///
    /// The list is copied first, so observers may subscribe or unsubscribe
    /// from inside the callback.
    pub fn emit(&self, event: &E) {
        let snapshot: SmallVec<[Observer<E>; 4]> = match self.slots.lock() {
            Ok(slots) => slots.observers.iter().map(|(_, o)| o.clone()).collect(),
            Err(_) => return,
        };
        for observer in snapshot {
            observer(event);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.observers.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn inert() -> Self {
        Self { release: None }
    }

    /// Keep the observer registered for the registry's lifetime.
    pub fn detach(mut self) {
        self.release = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_drop_unsubscribes() {
        let registry = ObserverRegistry::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let sub = registry.subscribe(move |v| {
            counter.fetch_add(*v as usize, Ordering::SeqCst);
        });
        registry.emit(&2);
        assert_eq!(registry.len(), 1);

        drop(sub);
        registry.emit(&5);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resubscribe_does_not_grow() {
        let registry = ObserverRegistry::<()>::new();
        for _ in 0..10 {
            let _sub = registry.subscribe(|_| {});
        }
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_detach_keeps_observer() {
        let registry = ObserverRegistry::<()>::new();
        registry.subscribe(|_| {}).detach();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_observer_may_unsubscribe_during_emit() {
        let registry = ObserverRegistry::<()>::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicUsize::new(0));

        let inner_slot = slot.clone();
        let counter = hits.clone();
        let sub = registry.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            inner_slot.lock().unwrap().take();
        });
        *slot.lock().unwrap() = Some(sub);

        registry.emit(&());
        registry.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
