//! Response Futures - Blocking, timeout-bounded request completion
//!
//! # Architecture
//! A transport registers every in-flight request in a [`PendingRequests`]
//! table and hands the caller a [`ResponseFuture`]. When the matching
//! response frame arrives the transport calls [`PendingRequests::complete`],
//! which removes the entry and delivers the value under the table lock.
//!
//! ```text
//! caller                         transport
//!   │ register(key) ──────────────▶ entries[key] = (ticket, tx)
//!   │ value(timeout)                  │
//!   │    ├─ Ready ◀─────────────────── complete(key, v)
//!   │    └─ TimedOut: cancel(ticket) ─▶ entries.remove(key)
//! ```
//!
//! Cancellation on timeout happens under the same lock as completion, so a
//! timed-out request can never leave a stale entry behind, and a late
//! response is dropped instead of being handed to an unrelated caller.

use core::time::Duration;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

/// Identifies one registration in a pending-request table
pub type Ticket = u64;

/// Outcome of waiting on a [`ResponseFuture`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// The device answered
    Ready(T),
    /// No answer within the timeout; the request has been deregistered
    TimedOut,
    /// The transport dropped the request without answering
    Closed,
}

impl<T> Resolution<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Resolution::Ready(value) => Some(value),
            _ => None,
        }
    }
}

trait CancelRequest: Send + Sync {
    fn cancel(&self, ticket: Ticket) -> bool;
}

struct Registration {
    ticket: Ticket,
    table: Arc<dyn CancelRequest>,
}

/// Handle to an in-flight device request
pub struct ResponseFuture<T> {
    rx: Receiver<T>,
    registration: Option<Registration>,
}

impl<T> ResponseFuture<T> {
    /// Future that is already resolved with `value`
    pub fn ready(value: T) -> Self {
        let (tx, rx) = channel::bounded(1);
        // Capacity 1 and the receiver is alive, so this cannot fail
        let _ = tx.send(value);
        Self {
            rx,
            registration: None,
        }
    }

    /// Future whose transport has already gone away
    pub fn closed() -> Self {
        let (_, rx) = channel::bounded(1);
        Self {
            rx,
            registration: None,
        }
    }

    /// Future fed by an externally owned channel, without a pending table
    pub fn from_receiver(rx: Receiver<T>) -> Self {
        Self {
            rx,
            registration: None,
        }
    }

    /// Block until the response arrives or `timeout` elapses
    ///
    /// On timeout the request is removed from its pending table before this
    /// returns. A response that was delivered before the removal is still
    /// returned as `Ready`.
    pub fn value(mut self, timeout: Duration) -> Resolution<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Resolution::Ready(value),
            Err(RecvTimeoutError::Timeout) => {
                if let Some(registration) = self.registration.take() {
                    registration.table.cancel(registration.ticket);
                }
                match self.rx.try_recv() {
                    Ok(value) => Resolution::Ready(value),
                    Err(_) => Resolution::TimedOut,
                }
            }
            Err(RecvTimeoutError::Disconnected) => Resolution::Closed,
        }
    }
}

impl<T> Drop for ResponseFuture<T> {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration.table.cancel(registration.ticket);
        }
    }
}

struct PendingInner<K, T> {
    next_ticket: AtomicU64,
    entries: Mutex<HashMap<K, (Ticket, Sender<T>)>>,
}

impl<K, T> PendingInner<K, T> {
    fn lock(&self) -> MutexGuard<'_, HashMap<K, (Ticket, Sender<T>)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, T> CancelRequest for PendingInner<K, T>
where
    K: Eq + Hash + Send,
    T: Send,
{
    fn cancel(&self, ticket: Ticket) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, (t, _)| *t != ticket);
        before != entries.len()
    }
}

/// Table of requests awaiting a response, keyed by request address
///
/// Cloning yields another handle to the same table.
pub struct PendingRequests<K, T> {
    inner: Arc<PendingInner<K, T>>,
}

impl<K, T> Clone for PendingRequests<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, T> Default for PendingRequests<K, T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(PendingInner {
                next_ticket: AtomicU64::new(0),
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }
}

impl<K, T> PendingRequests<K, T>
where
    K: Eq + Hash + Send + 'static,
    T: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request awaiting a response for `key`
    ///
    /// A request already pending on the same key is dropped (its future
    /// resolves as `Closed`) so that one response is never attributed to two
    /// callers.
    pub fn register(&self, key: K) -> ResponseFuture<T> {
        let (tx, rx) = channel::bounded(1);
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        if self.inner.lock().insert(key, (ticket, tx)).is_some() {
            log::warn!("replaced a pending request that was still awaiting its response");
        }
        let table: Arc<dyn CancelRequest> = self.inner.clone();
        ResponseFuture {
            rx,
            registration: Some(Registration { ticket, table }),
        }
    }

    /// Deliver `value` to the request pending on `key`
    ///
    /// Returns `false` when nothing is waiting (never registered, already
    /// completed, or cancelled by a timeout).
    pub fn complete(&self, key: &K, value: T) -> bool {
        let mut entries = self.inner.lock();
        match entries.remove(key) {
            Some((_, tx)) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Number of requests still awaiting a response
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every pending request; their futures resolve as `Closed`
    pub fn close_all(&self) {
        self.inner.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const SHORT: Duration = Duration::from_millis(20);

    #[test]
    fn test_ready_future() {
        assert_eq!(ResponseFuture::ready(7).value(SHORT), Resolution::Ready(7));
        assert_eq!(ResponseFuture::<i32>::closed().value(SHORT), Resolution::Closed);
    }

    #[test]
    fn test_complete_delivers() {
        let pending = PendingRequests::new();
        let future = pending.register("a");
        assert_eq!(pending.len(), 1);
        assert!(pending.complete(&"a", 42));
        assert!(pending.is_empty());
        assert_eq!(future.value(SHORT), Resolution::Ready(42));
    }

    #[test]
    fn test_timeout_deregisters() {
        let pending: PendingRequests<&str, i32> = PendingRequests::new();
        let future = pending.register("a");
        assert_eq!(future.value(SHORT), Resolution::TimedOut);
        assert!(pending.is_empty());

        // A late response is dropped, not handed to the next caller
        assert!(!pending.complete(&"a", 1));
        let next = pending.register("a");
        assert!(pending.complete(&"a", 2));
        assert_eq!(next.value(SHORT), Resolution::Ready(2));
    }

    #[test]
    fn test_dropped_future_deregisters() {
        let pending: PendingRequests<u8, i32> = PendingRequests::new();
        drop(pending.register(1));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_duplicate_key_closes_previous() {
        let pending: PendingRequests<u8, i32> = PendingRequests::new();
        let first = pending.register(1);
        let second = pending.register(1);
        assert_eq!(pending.len(), 1);
        assert!(pending.complete(&1, 5));
        assert_eq!(first.value(SHORT), Resolution::Closed);
        assert_eq!(second.value(SHORT), Resolution::Ready(5));
    }

    #[test]
    fn test_completion_from_another_thread() {
        let pending: PendingRequests<u8, Vec<u8>> = PendingRequests::new();
        let future = pending.register(3);
        let responder = pending.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            responder.complete(&3, vec![1, 2, 3])
        });
        assert_eq!(
            future.value(Duration::from_secs(1)),
            Resolution::Ready(vec![1, 2, 3])
        );
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_close_all() {
        let pending: PendingRequests<u8, i32> = PendingRequests::new();
        let future = pending.register(9);
        pending.close_all();
        assert_eq!(future.value(SHORT), Resolution::Closed);
    }
}
