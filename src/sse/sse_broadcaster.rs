use crate::sse::models::Frame;
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, interval_at};
use uuid::Uuid;

/// Shortest period the liveness sweep will run at.
const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(100);

/// Identifies one registered event-stream subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("subscriber has gone away")]
    Closed,
    #[error("subscriber buffer is full")]
    Full,
}

/// The write side of one open event stream.
///
/// Writes must never block: a sink that cannot take a frame right now
/// reports an error and gets evicted.
pub trait EventSink: Send + Sync {
    fn try_write(&self, frame: Frame) -> Result<(), SinkError>;
}

impl EventSink for mpsc::Sender<Frame> {
    fn try_write(&self, frame: Frame) -> Result<(), SinkError> {
        self.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

/// In-process fan-out of forum events to every open event stream.
///
/// Delivery is best effort: a subscriber whose write fails is dropped from
/// the registry and never retried. Nothing is persisted or replayed.
pub struct EventBroadcaster {
    connections: DashMap<ConnectionId, Box<dyn EventSink>>,
    admission: Mutex<()>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            admission: Mutex::new(()),
            sweeper: Mutex::new(None),
        }
    }

    /// Add an already-admitted stream. Capacity is the caller's concern, see [`Self::count`].
    pub fn register(&self, sink: Box<dyn EventSink>) -> ConnectionId {
        let connection_id = ConnectionId::new();
        self.connections.insert(connection_id, sink);
        debug!("Registered event stream {connection_id}");
        connection_id
    }

    /// Register `sink` only if fewer than `max` streams are open.
    ///
    /// The check and the insert happen under one lock, so concurrent callers
    /// can never push the registry past `max`. Returns `None` when full.
    pub fn try_register(&self, sink: Box<dyn EventSink>, max: usize) -> Option<ConnectionId> {
        let _admission = self.admission.lock().unwrap_or_else(PoisonError::into_inner);
        if self.count() >= max {
            return None;
        }
        Some(self.register(sink))
    }

    /// Remove a stream. Unknown or already removed ids are ignored.
    pub fn unregister(&self, connection_id: &ConnectionId) {
        if self.connections.remove(connection_id).is_some() {
            debug!("Unregistered event stream {connection_id}");
        }
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Serialize `event` once and write it to every registered stream.
    ///
    /// Only a serialization failure is reported; it leaves the registry untouched.
    pub fn broadcast<E>(&self, event: &E) -> Result<(), serde_json::Error>
    where
        E: Serialize + ?Sized,
    {
        let payload: Arc<str> = serde_json::to_string(event)?.into();
        let evicted = self.deliver(Frame::Data(payload));
        if evicted > 0 {
            debug!("Evicted {evicted} event stream(s) during broadcast");
        }
        Ok(())
    }

    /// Write a keep-alive to every stream, evicting those that fail.
    pub fn ping(&self) {
        let evicted = self.deliver(Frame::Ping);
        if evicted > 0 {
            info!("Liveness sweep evicted {evicted} dead event stream(s)");
        }
    }

    fn deliver(&self, frame: Frame) -> usize {
        // The iterator holds shard locks, so removal waits until enumeration is done.
        let dead: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter_map(|entry| match entry.value().try_write(frame.clone()) {
                Ok(()) => None,
                Err(e) => {
                    debug!("Write to event stream {} failed: {e}", entry.key());
                    Some(*entry.key())
                }
            })
            .collect();

        for connection_id in &dead {
            self.connections.remove(connection_id);
        }

        dead.len()
    }

    /// Start the periodic liveness sweep. Replaces any sweep already running.
    ///
    /// The task only holds a weak reference and ends once the broadcaster is dropped.
    pub fn spawn_liveness_sweep(self: &Arc<Self>, period: Duration) {
        let period = period.max(MIN_SWEEP_PERIOD);
        let broadcaster: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                match broadcaster.upgrade() {
                    Some(broadcaster) => broadcaster.ping(),
                    None => break,
                }
            }
        });

        if let Ok(mut sweeper) = self.sweeper.lock() {
            if let Some(previous) = sweeper.replace(handle) {
                previous.abort();
            }
        }
    }

    fn stop_sweep(&self) {
        if let Ok(mut sweeper) = self.sweeper.lock() {
            if let Some(handle) = sweeper.take() {
                handle.abort();
            }
        }
    }

    /// Stop the liveness sweep and close every open stream.
    pub fn shutdown(&self) {
        self.stop_sweep();

        let open = self.count();
        self.connections.clear();
        info!("Event broadcaster shut down, closed {open} stream(s)");
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventBroadcaster {
    fn drop(&mut self) {
        self.stop_sweep();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct TestEvent {
        #[serde(rename = "type")]
        kind: &'static str,
        #[serde(skip_serializing_if = "Value::is_null")]
        data: Value,
    }

    fn event(kind: &'static str, data: Value) -> TestEvent {
        TestEvent { kind, data }
    }

    fn subscriber(broadcaster: &EventBroadcaster) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(8);
        (broadcaster.register(Box::new(tx)), rx)
    }

    fn data(json: &str) -> Frame {
        Frame::Data(Arc::from(json))
    }

    #[test]
    fn register_and_unregister_track_count() {
        let broadcaster = EventBroadcaster::new();
        assert_eq!(broadcaster.count(), 0);

        let (a, _rx_a) = subscriber(&broadcaster);
        assert_eq!(broadcaster.count(), 1);
        let (_b, _rx_b) = subscriber(&broadcaster);
        assert_eq!(broadcaster.count(), 2);

        broadcaster.unregister(&a);
        assert_eq!(broadcaster.count(), 1);
    }

    #[test]
    fn unregister_is_idempotent_and_ignores_unknown_ids() {
        let broadcaster = EventBroadcaster::new();
        let (a, _rx_a) = subscriber(&broadcaster);
        let (_b, _rx_b) = subscriber(&broadcaster);

        broadcaster.unregister(&ConnectionId::new());
        assert_eq!(broadcaster.count(), 2);

        broadcaster.unregister(&a);
        broadcaster.unregister(&a);
        assert_eq!(broadcaster.count(), 1);
    }

    #[test]
    fn broadcast_reaches_registered_streams_and_evicts_dead_ones() {
        let broadcaster = EventBroadcaster::new();
        let (_a, mut rx_a) = subscriber(&broadcaster);
        let (_b, rx_b) = subscriber(&broadcaster);
        let (_c, mut rx_c) = subscriber(&broadcaster);

        broadcaster
            .broadcast(&event("new_post", json!({"id": 1})))
            .unwrap();

        let expected = data(r#"{"type":"new_post","data":{"id":1}}"#);
        assert_eq!(rx_a.try_recv().unwrap(), expected);
        assert_eq!(rx_c.try_recv().unwrap(), expected);

        // B's peer disconnects without a clean close.
        drop(rx_b);
        broadcaster.ping();
        assert_eq!(broadcaster.count(), 2);
        assert_eq!(rx_a.try_recv().unwrap(), Frame::Ping);
        assert_eq!(rx_c.try_recv().unwrap(), Frame::Ping);

        broadcaster
            .broadcast(&event("new_thread", json!({"id": 2})))
            .unwrap();
        let second = data(r#"{"type":"new_thread","data":{"id":2}}"#);
        assert_eq!(rx_a.try_recv().unwrap(), second);
        assert_eq!(rx_c.try_recv().unwrap(), second);
        assert_eq!(broadcaster.count(), 2);
    }

    #[test]
    fn failed_broadcast_write_is_gone_by_next_count() {
        let broadcaster = EventBroadcaster::new();
        let (_a, rx_a) = subscriber(&broadcaster);
        let (_b, mut rx_b) = subscriber(&broadcaster);
        drop(rx_a);

        broadcaster.broadcast(&event("new_post", Value::Null)).unwrap();

        assert_eq!(broadcaster.count(), 1);
        assert_eq!(rx_b.try_recv().unwrap(), data(r#"{"type":"new_post"}"#));
    }

    #[test]
    fn late_subscribers_get_no_replay() {
        let broadcaster = EventBroadcaster::new();
        let (_early, mut rx_early) = subscriber(&broadcaster);
        broadcaster.broadcast(&event("new_post", Value::Null)).unwrap();

        let (late, mut rx_late) = subscriber(&broadcaster);
        assert!(rx_early.try_recv().is_ok());
        assert!(rx_late.try_recv().is_err());

        broadcaster.unregister(&late);
        broadcaster.broadcast(&event("new_thread", Value::Null)).unwrap();
        assert!(rx_early.try_recv().is_ok());
        assert!(rx_late.try_recv().is_err());
    }

    #[test]
    fn unserializable_event_leaves_registry_alone() {
        let broadcaster = EventBroadcaster::new();
        let (_a, mut rx_a) = subscriber(&broadcaster);

        // serde_json refuses non-string map keys.
        let mut bad = BTreeMap::new();
        bad.insert(vec![1u8, 2], "value");

        assert!(broadcaster.broadcast(&bad).is_err());
        assert_eq!(broadcaster.count(), 1);
        assert!(rx_a.try_recv().is_err());

        broadcaster.broadcast(&event("new_post", Value::Null)).unwrap();
        assert!(rx_a.try_recv().is_ok());
    }

    #[test]
    fn backed_up_stream_is_evicted() {
        let broadcaster = EventBroadcaster::new();
        let (tx, mut rx) = mpsc::channel(1);
        broadcaster.register(Box::new(tx));

        broadcaster.broadcast(&event("new_post", Value::Null)).unwrap();
        assert_eq!(broadcaster.count(), 1);
        broadcaster.broadcast(&event("new_post", Value::Null)).unwrap();
        assert_eq!(broadcaster.count(), 0);

        // The frame that did fit is still delivered, then the stream ends.
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn try_register_stops_at_capacity() {
        let broadcaster = EventBroadcaster::new();
        let (tx_a, _rx_a) = mpsc::channel(8);
        let (tx_b, _rx_b) = mpsc::channel(8);
        let (tx_c, _rx_c) = mpsc::channel(8);

        let a = broadcaster.try_register(Box::new(tx_a), 2).unwrap();
        assert!(broadcaster.try_register(Box::new(tx_b), 2).is_some());
        assert!(broadcaster.try_register(Box::new(tx_c), 2).is_none());
        assert_eq!(broadcaster.count(), 2);

        broadcaster.unregister(&a);
        let (tx_d, _rx_d) = mpsc::channel(8);
        assert!(broadcaster.try_register(Box::new(tx_d), 2).is_some());
        assert_eq!(broadcaster.count(), 2);
    }

    #[test]
    fn concurrent_admission_never_exceeds_capacity() {
        let broadcaster = &EventBroadcaster::new();
        let barrier = &std::sync::Barrier::new(16);

        let admitted = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..16)
                .map(|_| {
                    scope.spawn(move || {
                        let (tx, rx) = mpsc::channel(8);
                        barrier.wait();
                        let admitted = broadcaster.try_register(Box::new(tx), 1).is_some();
                        (admitted, rx)
                    })
                })
                .collect();
            workers
                .into_iter()
                .map(|worker| worker.join().unwrap())
                .filter(|(admitted, _rx)| *admitted)
                .count()
        });

        assert_eq!(admitted, 1);
        assert_eq!(broadcaster.count(), 1);
    }

    #[tokio::test]
    async fn shutdown_closes_every_stream() {
        let broadcaster = Arc::new(EventBroadcaster::new());
        broadcaster.spawn_liveness_sweep(Duration::from_secs(30));
        let (_a, mut rx_a) = subscriber(&broadcaster);
        let (_b, mut rx_b) = subscriber(&broadcaster);

        broadcaster.shutdown();

        assert_eq!(broadcaster.count(), 0);
        assert!(rx_a.recv().await.is_none());
        assert!(rx_b.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn liveness_sweep_reclaims_silent_disconnects() {
        let broadcaster = Arc::new(EventBroadcaster::new());
        broadcaster.spawn_liveness_sweep(Duration::from_secs(30));
        let (_alive, mut rx_alive) = subscriber(&broadcaster);
        let (_gone, rx_gone) = subscriber(&broadcaster);
        drop(rx_gone);

        assert_eq!(broadcaster.count(), 2);
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(broadcaster.count(), 1);
        assert_eq!(rx_alive.recv().await, Some(Frame::Ping));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_sweep_period_still_reclaims() {
        let broadcaster = Arc::new(EventBroadcaster::new());
        broadcaster.spawn_liveness_sweep(Duration::ZERO);
        let (_gone, rx_gone) = subscriber(&broadcaster);
        drop(rx_gone);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(broadcaster.count(), 0);
    }
}
