use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::disposable::Disposable;

/// Callback invoked with each fired event.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

type ListenerMap<T> = Mutex<BTreeMap<u64, Listener<T>>>;

/// Minimal observer list used by editor providers to publish lifecycle events.
/// 編輯器提供者用來發布生命週期事件的觀察者清單。
///
/// Listeners run in registration order. The internal lock is released before
/// any listener runs, so a listener may subscribe, unsubscribe or fire again.
pub struct EventEmitter<T> {
    listeners: Arc<ListenerMap<T>>,
    next_id: AtomicU64,
}

impl<T: 'static> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a listener; it stays active until the returned subscription is disposed.
    /// 註冊監聽器；在回傳的訂閱被釋放前持續有效。
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).insert(id, Arc::new(listener));

        let weak: Weak<ListenerMap<T>> = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = weak.upgrade() {
                lock(&listeners).remove(&id);
            }
        })
    }

    /// Delivers `event` to every registered listener.
    pub fn fire(&self, event: &T) {
        let snapshot: Vec<Listener<T>> = lock(&self.listeners).values().cloned().collect();
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

impl<T: 'static> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventEmitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.listeners.lock().map(|map| map.len()).unwrap_or_default();
        f.debug_struct("EventEmitter")
            .field("listeners", &count)
            .finish()
    }
}

fn lock<T>(map: &ListenerMap<T>) -> std::sync::MutexGuard<'_, BTreeMap<u64, Listener<T>>> {
    // A panicking listener never runs while the lock is held, so the map itself is intact.
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle returned by [`EventEmitter::subscribe`]; unregisters on dispose or drop.
/// 訂閱控制代碼；釋放或離開作用域時取消註冊。
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }
}

impl Disposable for Subscription {
    fn dispose(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
