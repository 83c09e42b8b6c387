//! Landmark publisher: state machine plus bounded outbound queue.
//!
//! `Disconnected -> Connecting -> Connected`, with an automatic fall back
//! to `Connecting` when the transport drops. Publishing is best-effort:
//! calls made while not `Connected` are dropped, not buffered, and a full
//! queue drops rather than blocking the frame loop.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::streaming::transport::ChannelTransport;
use crate::types::Part;

const OUTBOUND_QUEUE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

fn store_state(cell: &AtomicU8, state: LinkState) {
    cell.store(state as u8, Ordering::SeqCst);
}

fn load_state(cell: &AtomicU8) -> LinkState {
    match cell.load(Ordering::SeqCst) {
        0 => LinkState::Disconnected,
        1 => LinkState::Connecting,
        _ => LinkState::Connected,
    }
}

/// One LandmarkSet part on the wire: the part name plus its ordered
/// `[x, y]` pairs in raw (un-mirrored) device pixel space.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PartMessage {
    pub part: String,
    pub points: Vec<[f32; 2]>,
}

impl PartMessage {
    pub fn from_part(part: &Part) -> Self {
        Self {
            part: part.name.to_string(),
            points: part.points.iter().map(|lm| [lm.x, lm.y]).collect(),
        }
    }
}

/// Owner of the outbound publish channel.
///
/// The transport lives on a background task; `publish` only enqueues, so
/// the frame loop never waits on the network.
pub struct LandmarkPublisher {
    state: Arc<AtomicU8>,
    tx: Option<mpsc::Sender<PartMessage>>,
    task: Option<JoinHandle<()>>,
    reconnect_delay: Duration,
}

impl Default for LandmarkPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl LandmarkPublisher {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(LinkState::Disconnected as u8)),
            tx: None,
            task: None,
            reconnect_delay: Duration::from_secs(1),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn state(&self) -> LinkState {
        load_state(&self.state)
    }

    /// Join `room` over the given transport. Spawns the transport task and
    /// returns immediately; the link state moves to `Connected` once the
    /// join completes. Rejected while a link is already up so transitions
    /// follow one total order.
    pub fn connect(
        &mut self,
        transport: Box<dyn ChannelTransport>,
        room: &str,
    ) -> Result<(), StreamError> {
        if self.task.is_some() {
            return Err(StreamError::InvalidState("link already established"));
        }
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        store_state(&self.state, LinkState::Connecting);
        let task = tokio::spawn(run_link(
            transport,
            room.to_string(),
            rx,
            Arc::clone(&self.state),
            self.reconnect_delay,
        ));
        self.tx = Some(tx);
        self.task = Some(task);
        Ok(())
    }

    /// Transmit one part message. No-op unless the link is `Connected`;
    /// delivery order across calls is preserved by the queue.
    pub fn publish(&self, message: PartMessage) {
        if self.state() != LinkState::Connected {
            debug!(part = %message.part, "publish dropped: link not connected");
            return;
        }
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.try_send(message).is_err() {
            debug!("publish dropped: outbound queue full");
        }
    }

    /// Tear the link down. The queue is closed and the transport task
    /// exits after draining.
    pub fn disconnect(&mut self) {
        self.tx = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        store_state(&self.state, LinkState::Disconnected);
    }
}

impl Drop for LandmarkPublisher {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn run_link(
    mut transport: Box<dyn ChannelTransport>,
    room: String,
    mut rx: mpsc::Receiver<PartMessage>,
    state: Arc<AtomicU8>,
    reconnect_delay: Duration,
) {
    loop {
        store_state(&state, LinkState::Connecting);
        let joined = match transport.connect().await {
            Ok(()) => transport.join(&room).await,
            Err(e) => Err(e),
        };

        match joined {
            Ok(()) => {
                store_state(&state, LinkState::Connected);
                info!(%room, "streaming link established");
                loop {
                    match rx.recv().await {
                        Some(message) => {
                            let data = match serde_json::to_value(&message) {
                                Ok(data) => data,
                                Err(e) => {
                                    warn!(error = %e, "unserializable part message dropped");
                                    continue;
                                }
                            };
                            if let Err(e) = transport.emit("msg", data).await {
                                warn!(error = %e, "transport dropped, reconnecting");
                                break;
                            }
                        }
                        None => {
                            transport.close().await;
                            store_state(&state, LinkState::Disconnected);
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, %room, "connect failed, retrying");
            }
        }

        store_state(&state, LinkState::Connecting);
        tokio::time::sleep(reconnect_delay).await;
        if rx.is_closed() {
            store_state(&state, LinkState::Disconnected);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct TransportLog {
        joins: Vec<String>,
        emits: Vec<serde_json::Value>,
    }

    /// Counting fake transport. `fail_next_emits` makes that many emit
    /// calls fail to exercise the reconnect path.
    struct FakeTransport {
        log: Arc<Mutex<TransportLog>>,
        fail_next_emits: Arc<AtomicU8>,
    }

    impl FakeTransport {
        fn new() -> (Box<dyn ChannelTransport>, Arc<Mutex<TransportLog>>, Arc<AtomicU8>) {
            let log = Arc::new(Mutex::new(TransportLog::default()));
            let failures = Arc::new(AtomicU8::new(0));
            let transport = Box::new(Self {
                log: Arc::clone(&log),
                fail_next_emits: Arc::clone(&failures),
            });
            (transport, log, failures)
        }
    }

    #[async_trait]
    impl ChannelTransport for FakeTransport {
        async fn connect(&mut self) -> Result<(), StreamError> {
            Ok(())
        }
        async fn join(&mut self, room: &str) -> Result<(), StreamError> {
            self.log.lock().unwrap().joins.push(room.to_string());
            Ok(())
        }
        async fn emit(&mut self, _event: &str, data: serde_json::Value) -> Result<(), StreamError> {
            if self.fail_next_emits.load(Ordering::SeqCst) > 0 {
                self.fail_next_emits.fetch_sub(1, Ordering::SeqCst);
                return Err(StreamError::ConnectionDropped("fake drop".into()));
            }
            self.log.lock().unwrap().emits.push(data);
            Ok(())
        }
        async fn close(&mut self) {}
    }

    fn message(part: &str) -> PartMessage {
        PartMessage {
            part: part.to_string(),
            points: vec![[1.0, 2.0]],
        }
    }

    async fn wait_for_state(publisher: &LandmarkPublisher, want: LinkState) {
        for _ in 0..200 {
            if publisher.state() == want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("publisher never reached {want:?}");
    }

    #[tokio::test]
    async fn publish_while_disconnected_is_a_noop() {
        let (_, log, _) = FakeTransport::new();
        let publisher = LandmarkPublisher::new();
        assert_eq!(publisher.state(), LinkState::Disconnected);
        publisher.publish(message("thumb"));
        assert_eq!(log.lock().unwrap().emits.len(), 0);
    }

    #[tokio::test]
    async fn connect_joins_room_and_delivers_in_order() {
        let (transport, log, _) = FakeTransport::new();
        let mut publisher = LandmarkPublisher::new();
        publisher.connect(transport, "webclient").unwrap();
        wait_for_state(&publisher, LinkState::Connected).await;

        for part in ["thumb", "indexFinger", "middleFinger"] {
            publisher.publish(message(part));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let log = log.lock().unwrap();
        assert_eq!(log.joins, vec!["webclient"]);
        let parts: Vec<String> = log
            .emits
            .iter()
            .map(|v| v["part"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(parts, vec!["thumb", "indexFinger", "middleFinger"]);
    }

    #[tokio::test]
    async fn second_connect_is_rejected() {
        let (transport, _, _) = FakeTransport::new();
        let (transport2, _, _) = FakeTransport::new();
        let mut publisher = LandmarkPublisher::new();
        publisher.connect(transport, "a").unwrap();
        let err = publisher.connect(transport2, "b").unwrap_err();
        assert!(matches!(err, StreamError::InvalidState(_)));
    }

    #[tokio::test]
    async fn dropped_transport_reconnects() {
        let (transport, log, failures) = FakeTransport::new();
        let mut publisher =
            LandmarkPublisher::new().with_reconnect_delay(Duration::from_millis(10));
        publisher.connect(transport, "webclient").unwrap();
        wait_for_state(&publisher, LinkState::Connected).await;

        failures.store(1, Ordering::SeqCst);
        publisher.publish(message("lost"));
        // The failed emit tears the link down; it must come back up.
        wait_for_state(&publisher, LinkState::Connected).await;

        publisher.publish(message("after"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let log = log.lock().unwrap();
        assert_eq!(log.joins.len(), 2, "reconnect must re-join the room");
        assert_eq!(log.emits.last().unwrap()["part"], "after");
    }

    #[tokio::test]
    async fn disconnect_returns_to_disconnected() {
        let (transport, _, _) = FakeTransport::new();
        let mut publisher = LandmarkPublisher::new();
        publisher.connect(transport, "webclient").unwrap();
        wait_for_state(&publisher, LinkState::Connected).await;
        publisher.disconnect();
        assert_eq!(publisher.state(), LinkState::Disconnected);
    }

    #[test]
    fn part_message_serializes_points_as_pairs() {
        let msg = message("thumb");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["part"], "thumb");
        assert_eq!(value["points"][0][0], 1.0);
        assert_eq!(value["points"][0][1], 2.0);
    }
}
