//! Event sinks and the fan-out dispatcher.
//!
//! Two sink kinds with different delivery contracts: the broadcast sink
//! fans out to however many live WebSocket subscribers exist and never
//! fails a dispatch, while the document store is written once per event and
//! awaited, making it the only failure mode. Each event is timestamped at
//! dispatch and serialized once.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use shuttle_sim_core::Event;

use crate::config::mask_credentials;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("document store rejected write: {0}")]
    Store(String),
}

const BROADCAST_CAPACITY: usize = 256;

/// Fan-out sink for ephemeral WebSocket subscribers.
///
/// Backed by a broadcast channel of serialized events. A slow or vanished
/// subscriber only affects its own receiver; sends never block and never
/// fail the dispatch. Closing drops the channel so live subscriber tasks
/// observe the close and disconnect.
#[derive(Default)]
pub struct BroadcastSink {
    sender: RwLock<Option<broadcast::Sender<String>>>,
}

impl BroadcastSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the channel if it is not already open.
    pub fn open(&self) {
        let mut sender = self.sender.write().expect("sink lock");
        if sender.is_none() {
            *sender = Some(broadcast::channel(BROADCAST_CAPACITY).0);
        }
    }

    pub fn is_open(&self) -> bool {
        self.sender.read().expect("sink lock").is_some()
    }

    /// New subscription; `None` until the sink has been opened.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<String>> {
        self.sender
            .read()
            .expect("sink lock")
            .as_ref()
            .map(broadcast::Sender::subscribe)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender
            .read()
            .expect("sink lock")
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Deliver a payload to every live subscriber.
    pub fn send(&self, payload: String) {
        if let Some(sender) = self.sender.read().expect("sink lock").as_ref() {
            match sender.send(payload) {
                Ok(subscribers) => trace!(subscribers, "event broadcast"),
                Err(_) => trace!("no live subscribers, broadcast skipped"),
            }
        }
    }

    pub fn close(&self) {
        self.sender.write().expect("sink lock").take();
    }
}

/// Durable event store, one JSON document per event.
pub trait DocumentStore: Send + Sync {
    /// Verify the store is reachable before the run begins.
    fn check<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;

    /// Write one event document. A failure here is fatal for the run.
    fn insert<'a>(
        &'a self,
        document: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;

    /// Target description for logs, with credentials masked.
    fn describe(&self) -> String;
}

/// CouchDB-compatible store addressed as `scheme://host[:port]/dbname`.
pub struct CouchStore {
    client: reqwest::Client,
    database_url: String,
}

impl CouchStore {
    pub fn from_target(target: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            database_url: target.trim_end_matches('/').to_string(),
        }
    }
}

impl DocumentStore for CouchStore {
    fn check<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
        Box::pin(async move {
            self.client
                .get(&self.database_url)
                .send()
                .await?
                .error_for_status()?;
            Ok(())
        })
    }

    fn insert<'a>(
        &'a self,
        document: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
        Box::pin(async move {
            self.client
                .post(&self.database_url)
                .json(document)
                .send()
                .await?
                .error_for_status()?;
            Ok(())
        })
    }

    fn describe(&self) -> String {
        mask_credentials(&self.database_url)
    }
}

/// An event with its dispatch timestamp: the exact wire shape.
#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    event: &'a Event,
    /// Epoch milliseconds, assigned at dispatch.
    ts: i64,
}

/// Fans one event out to every configured sink.
#[derive(Clone, Default)]
pub struct Dispatcher {
    broadcast: Option<Arc<BroadcastSink>>,
    store: Option<Arc<dyn DocumentStore>>,
}

impl Dispatcher {
    pub fn new(
        broadcast: Option<Arc<BroadcastSink>>,
        store: Option<Arc<dyn DocumentStore>>,
    ) -> Self {
        Self { broadcast, store }
    }

    /// Stamp and deliver one event.
    ///
    /// Broadcast delivery is fire-and-forget; the store write is awaited
    /// and its failure is the only way a dispatch can fail. With no sink
    /// connected the event is dropped and the dispatch trivially succeeds.
    pub async fn dispatch(&self, event: &Event) -> Result<(), SinkError> {
        let envelope = Envelope {
            event,
            ts: Utc::now().timestamp_millis(),
        };

        let broadcast = self.broadcast.as_ref().filter(|sink| sink.is_open());
        let store = self.store.as_ref();
        if broadcast.is_none() && store.is_none() {
            debug!(kind = event.kind(), "no sink connected, dropping event");
            return Ok(());
        }

        let payload = serde_json::to_string(&envelope)?;
        if let Some(sink) = broadcast {
            sink.send(payload.clone());
        }
        if let Some(store) = store {
            let document: Value = serde_json::from_str(&payload)?;
            store.insert(&document).await?;
            trace!(kind = event.kind(), "event stored");
        }
        Ok(())
    }

    /// Live broadcast subscribers, 0 when no broadcast sink is connected.
    pub fn live_subscribers(&self) -> usize {
        self.broadcast
            .as_ref()
            .map_or(0, |sink| sink.subscriber_count())
    }

    /// Release sink connections at the end of a run.
    pub async fn close(&self) {
        if let Some(sink) = &self.broadcast {
            sink.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shuttle_sim_core::event;
    use std::sync::Mutex;

    struct RecordingStore(Mutex<Vec<Value>>);

    impl DocumentStore for RecordingStore {
        fn check<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
            Box::pin(async { Ok(()) })
        }

        fn insert<'a>(
            &'a self,
            document: &'a Value,
        ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
            Box::pin(async move {
                self.0.lock().unwrap().push(document.clone());
                Ok(())
            })
        }

        fn describe(&self) -> String {
            "recording".into()
        }
    }

    #[tokio::test]
    async fn dispatch_without_sinks_succeeds() {
        let dispatcher = Dispatcher::default();
        assert!(dispatcher.dispatch(&event::door_open()).await.is_ok());
        assert_eq!(dispatcher.live_subscribers(), 0);
    }

    #[tokio::test]
    async fn dispatch_stamps_and_fans_out() {
        let broadcast = Arc::new(BroadcastSink::new());
        broadcast.open();
        let mut receiver = broadcast.subscribe().unwrap();

        let store = Arc::new(RecordingStore(Mutex::new(Vec::new())));
        let dispatcher = Dispatcher::new(Some(Arc::clone(&broadcast)), Some(store.clone()));

        dispatcher.dispatch(&event::door_open()).await.unwrap();

        let payload = receiver.recv().await.unwrap();
        let value: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["type"], "door_open");
        assert!(value["ts"].as_i64().is_some());

        let stored = store.0.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["type"], "door_open");
    }

    #[tokio::test]
    async fn store_failure_propagates_but_broadcast_failure_cannot() {
        struct FailingStore;
        impl DocumentStore for FailingStore {
            fn check<'a>(
                &'a self,
            ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
                Box::pin(async { Ok(()) })
            }
            fn insert<'a>(
                &'a self,
                _document: &'a Value,
            ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
                Box::pin(async { Err(SinkError::Store("disk full".into())) })
            }
            fn describe(&self) -> String {
                "failing".into()
            }
        }

        // No subscriber at all: the broadcast leg is a no-op, never an error.
        let broadcast = Arc::new(BroadcastSink::new());
        broadcast.open();
        let dispatcher = Dispatcher::new(Some(broadcast), Some(Arc::new(FailingStore)));

        let result = dispatcher.dispatch(&event::door_close()).await;
        assert!(matches!(result, Err(SinkError::Store(_))));
    }

    #[tokio::test]
    async fn closing_disconnects_subscribers() {
        let broadcast = Arc::new(BroadcastSink::new());
        broadcast.open();
        let mut receiver = broadcast.subscribe().unwrap();
        assert_eq!(broadcast.subscriber_count(), 1);

        broadcast.close();
        assert!(!broadcast.is_open());
        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
        assert!(broadcast.subscribe().is_none());
    }
}
