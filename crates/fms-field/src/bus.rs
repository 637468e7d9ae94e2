use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

/// Identifies one subscriber for the lifetime of the bus.
pub type SubscriberId = u64;

/// Fan-out from the single control loop to a dynamic set of display tasks.
///
/// Publishing never blocks and never fails: each subscriber has its own
/// bounded queue, and a subscriber that cannot keep up loses that delivery
/// instead of stalling the loop. Display clients compensate by requesting a
/// full snapshot on connect and treating every event as superseded by a later
/// one of the same kind.
#[derive(Debug)]
pub struct EventBus<T> {
    inner: Arc<Mutex<Registry<T>>>,
    capacity: usize,
}

#[derive(Debug)]
struct Registry<T> {
    next_id: SubscriberId,
    subscribers: HashMap<SubscriberId, mpsc::Sender<T>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            capacity: self.capacity,
        }
    }
}

impl<T: Clone> EventBus<T> {
    /// Creates a bus whose subscribers each buffer up to `capacity` pending
    /// events.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                subscribers: HashMap::new(),
            })),
            capacity,
        }
    }

    /// Registers a new delivery queue. Safe concurrently with `publish`.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut registry = self.inner.lock().unwrap();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.insert(id, tx);
        Subscription {
            id,
            rx,
            bus: Arc::clone(&self.inner),
        }
    }

    /// Removes a subscriber. Repeated or unknown ids are a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.lock().unwrap().subscribers.remove(&id);
    }

    /// Delivers `event` to every current subscriber.
    ///
    /// A subscriber whose queue is saturated misses this delivery; a
    /// subscriber whose receiver is gone is pruned.
    pub fn publish(&self, event: T) {
        let mut registry = self.inner.lock().unwrap();
        registry.subscribers.retain(|id, tx| {
            match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::trace!("Subscriber {} lagging, dropping event", id);
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }
}

/// The receiving end of one subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription<T> {
    id: SubscriberId,
    rx: mpsc::Receiver<T>,
    bus: Arc<Mutex<Registry<T>>>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next event. Returns `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Returns the next pending event without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.bus.lock().unwrap().subscribers.remove(&self.id);
    }
}
