//! Observer list for transport events.
//!
//! Broadcasts run synchronously, in subscription order, on the thread that
//! raised the event: the accept thread for `Connected`, the receive thread for
//! `Received` and `Error`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;

/// What happened to an incoming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The connection became the active client.
    Accepted,
    /// Another client was already active; the connection was closed.
    Rejected,
}

/// An event raised by the transport server.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Connected {
        endpoint: String,
        outcome: ConnectOutcome,
    },
    Received {
        endpoint: String,
        message: Bytes,
    },
    Error {
        description: String,
    },
}

/// Handle returned by [`EventHub::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Ordered list of event observers.
#[derive(Default)]
pub struct EventHub {
    observers: Mutex<Vec<(SubscriptionId, Observer)>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer. It sees every event raised after this call.
    pub fn subscribe(&self, observer: impl Fn(&ServerEvent) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(observer)));
        id
    }

    /// Remove an observer. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every observer in subscription order.
    ///
    /// The list is snapshotted first, so observers may subscribe or
    /// unsubscribe from inside a callback.
    pub fn broadcast(&self, event: &ServerEvent) {
        let snapshot: Vec<Observer> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in snapshot {
            observer(event);
        }
    }
}
