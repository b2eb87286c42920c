//! The persistent socket to the execution service.
//!
//! A `Transport` is driven entirely from the session's event handler: it
//! spawns background tasks for the connection attempt, the inbound pump and
//! the reconnect timer, and those tasks report back through the application
//! event channel. Every report carries the generation (or timer id) it belongs
//! to, so anything from a superseded connection is ignored.

use std::time::Duration;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::SessionError;
use crate::event::AppEvent;
use crate::protocol::emit::to_frame;
use crate::protocol::types::OutboundMessage;

use super::state::ConnectionState;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// One live connection. Dropping `outbound` closes it; `inbound` ends when the
/// connection is gone for any reason.
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Opens connections. The WebSocket implementation is `WsConnector`; tests
/// substitute in-memory channels.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, endpoint: &str) -> BoxFuture<'static, Result<Connection>>;
}

/// Connects over WebSocket (`ws://` or `wss://`).
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, endpoint: &str) -> BoxFuture<'static, Result<Connection>> {
        let endpoint = endpoint.to_string();
        Box::pin(async move {
            let (ws, _) = connect_async(endpoint).await?;
            let (mut sink, mut stream) = ws.split();
            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
            let (in_tx, in_rx) = mpsc::unbounded_channel();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        outgoing = out_rx.recv() => {
                            let Some(text) = outgoing else {
                                // Transport let go of the connection.
                                let _ = sink.close().await;
                                break;
                            };
                            if let Err(e) = sink.send(Message::text(text)).await {
                                warn!(error = %e, "WebSocket send failed");
                                break;
                            }
                        }
                        incoming = stream.next() => {
                            match incoming {
                                Some(Ok(Message::Text(text))) => {
                                    if in_tx.send(text.as_str().to_owned()).is_err() {
                                        break;
                                    }
                                }
                                Some(Ok(Message::Close(frame))) => {
                                    debug!(?frame, "WebSocket closed by remote");
                                    break;
                                }
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    warn!(error = %e, "WebSocket error");
                                    break;
                                }
                                None => break,
                            }
                        }
                    }
                }
            });

            Ok(Connection {
                outbound: out_tx,
                inbound: in_rx,
            })
        })
    }
}

/// Reports from the transport's background tasks.
#[derive(Debug)]
pub enum TransportEvent {
    Opened {
        generation: u64,
        outbound: mpsc::UnboundedSender<String>,
    },
    Frame {
        generation: u64,
        text: String,
    },
    Closed {
        generation: u64,
    },
    ReconnectDue {
        timer: u64,
    },
}

/// What a transport event meant once stale reports are filtered out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    Opened,
    Frame(String),
    Closed { retry_in: Option<Duration> },
    Reconnecting,
    Ignored,
}

struct PendingReconnect {
    timer: u64,
    handle: JoinHandle<()>,
}

pub struct Transport<C: Connector = WsConnector> {
    connector: C,
    endpoint: String,
    reconnect_delay: Duration,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    state: ConnectionState,
    outbound: Option<mpsc::UnboundedSender<String>>,
    generation: u64,
    reconnect: Option<PendingReconnect>,
    timer_seq: u64,
    auto_reconnect: bool,
}

impl<C: Connector> Transport<C> {
    pub fn new(
        connector: C,
        endpoint: impl Into<String>,
        event_tx: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            connector,
            endpoint: endpoint.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            event_tx,
            state: ConnectionState::Closed,
            outbound: None,
            generation: 0,
            reconnect: None,
            timer_seq: 0,
            auto_reconnect: false,
        }
    }

    /// Fixed delay between a close and the next attempt. There is no backoff.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether a reconnect attempt is currently scheduled.
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.is_some()
    }

    /// Start a connection attempt. Never fails: a failed attempt is reported
    /// as a close and falls into the reconnect schedule.
    pub fn connect(&mut self) {
        self.cancel_reconnect();
        self.auto_reconnect = true;
        self.generation += 1;
        self.outbound = None;
        self.state = ConnectionState::Connecting;

        let generation = self.generation;
        let attempt = self.connector.connect(&self.endpoint);
        let tx = self.event_tx.clone();
        info!(endpoint = %self.endpoint, generation, "Connecting to execution service");

        tokio::spawn(async move {
            match attempt.await {
                Ok(Connection {
                    outbound,
                    mut inbound,
                }) => {
                    let opened = TransportEvent::Opened {
                        generation,
                        outbound,
                    };
                    if tx.send(AppEvent::Transport(opened)).is_err() {
                        return;
                    }
                    while let Some(text) = inbound.recv().await {
                        let frame = TransportEvent::Frame { generation, text };
                        if tx.send(AppEvent::Transport(frame)).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => warn!(error = %e, generation, "Connection attempt failed"),
            }
            let _ = tx.send(AppEvent::Transport(TransportEvent::Closed { generation }));
        });
    }

    /// Send a message. Nothing is queued while disconnected.
    pub fn send(&self, message: &OutboundMessage) -> Result<(), SessionError> {
        let outbound = match (&self.outbound, self.state) {
            (Some(outbound), ConnectionState::Open) => outbound,
            _ => return Err(SessionError::TransportUnavailable),
        };
        let frame = to_frame(message).map_err(|e| {
            error!(error = %e, "Failed to encode outbound message");
            SessionError::TransportUnavailable
        })?;
        outbound
            .send(frame)
            .map_err(|_| SessionError::TransportUnavailable)
    }

    /// Close the live socket and cancel any scheduled reconnect. No automatic
    /// reconnects happen until `connect` is called again.
    pub fn disconnect(&mut self) {
        self.auto_reconnect = false;
        self.cancel_reconnect();
        self.generation += 1;
        self.outbound = None;
        self.state = ConnectionState::Closed;
        info!("Disconnected from execution service");
    }

    /// Apply a report from one of the background tasks.
    pub fn handle(&mut self, event: TransportEvent) -> TransportSignal {
        match event {
            TransportEvent::Opened {
                generation,
                outbound,
            } if generation == self.generation => {
                self.cancel_reconnect();
                self.outbound = Some(outbound);
                self.state = ConnectionState::Open;
                info!(generation, "Connected to execution service");
                TransportSignal::Opened
            }
            TransportEvent::Frame { generation, text } if generation == self.generation => {
                TransportSignal::Frame(text)
            }
            TransportEvent::Closed { generation } if generation == self.generation => {
                self.outbound = None;
                self.state = ConnectionState::Closed;
                let retry_in = self.auto_reconnect.then(|| {
                    self.schedule_reconnect();
                    self.reconnect_delay
                });
                warn!(generation, ?retry_in, "Execution service connection closed");
                TransportSignal::Closed { retry_in }
            }
            TransportEvent::ReconnectDue { timer }
                if self.reconnect.as_ref().is_some_and(|p| p.timer == timer) =>
            {
                self.reconnect = None;
                self.connect();
                TransportSignal::Reconnecting
            }
            other => {
                debug!(event = ?other, "Ignoring stale transport event");
                TransportSignal::Ignored
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        self.cancel_reconnect();
        self.timer_seq += 1;
        let timer = self.timer_seq;
        let delay = self.reconnect_delay;
        let tx = self.event_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(AppEvent::Transport(TransportEvent::ReconnectDue { timer }));
        });
        self.reconnect = Some(PendingReconnect { timer, handle });
    }

    fn cancel_reconnect(&mut self) {
        if let Some(pending) = self.reconnect.take() {
            pending.handle.abort();
        }
    }
}

impl<C: Connector> Drop for Transport<C> {
    fn drop(&mut self) {
        self.cancel_reconnect();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use anyhow::anyhow;

    use super::*;

    /// The far side of an in-memory connection.
    pub struct RemoteEnd {
        pub from_client: mpsc::UnboundedReceiver<String>,
        pub to_client: mpsc::UnboundedSender<String>,
    }

    /// Connector that hands out in-memory connections, or refuses them while
    /// `refuse` is set. Counts every attempt.
    #[derive(Clone, Default)]
    pub struct MemoryConnector {
        pub attempts: Arc<AtomicUsize>,
        pub refuse: Arc<AtomicBool>,
        remotes: Arc<Mutex<Vec<RemoteEnd>>>,
    }

    impl MemoryConnector {
        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        pub fn set_refuse(&self, refuse: bool) {
            self.refuse.store(refuse, Ordering::SeqCst);
        }

        /// Take the remote end of the most recent successful connection.
        #[allow(clippy::unwrap_used)]
        pub fn take_remote(&self) -> Option<RemoteEnd> {
            self.remotes.lock().unwrap().pop()
        }
    }

    impl Connector for MemoryConnector {
        #[allow(clippy::unwrap_used)]
        fn connect(&self, _endpoint: &str) -> BoxFuture<'static, Result<Connection>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.refuse.load(Ordering::SeqCst) {
                return Box::pin(async { Err(anyhow!("connection refused")) });
            }
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            self.remotes.lock().unwrap().push(RemoteEnd {
                from_client: out_rx,
                to_client: in_tx,
            });
            Box::pin(async move {
                Ok(Connection {
                    outbound: out_tx,
                    inbound: in_rx,
                })
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::time::Instant;

    use super::testing::MemoryConnector;
    use super::*;
    use crate::protocol::emit::run_request;

    fn transport(
        connector: &MemoryConnector,
    ) -> (
        Transport<MemoryConnector>,
        mpsc::UnboundedReceiver<AppEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Transport::new(connector.clone(), "ws://test", tx), rx)
    }

    fn assert_fired_after(start: Instant, delay: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= delay && elapsed < delay + Duration::from_millis(1),
            "fired after {elapsed:?}, expected {delay:?}"
        );
    }

    async fn next_signal(
        transport: &mut Transport<MemoryConnector>,
        rx: &mut mpsc::UnboundedReceiver<AppEvent>,
    ) -> TransportSignal {
        match rx.recv().await.unwrap() {
            AppEvent::Transport(event) => transport.handle(event),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn opens_and_sends() {
        let connector = MemoryConnector::default();
        let (mut t, mut rx) = transport(&connector);
        t.connect();
        assert_eq!(t.state(), ConnectionState::Connecting);
        assert_eq!(next_signal(&mut t, &mut rx).await, TransportSignal::Opened);
        assert!(t.is_open());

        t.send(&run_request("print(1)", "python")).unwrap();
        let mut remote = connector.take_remote().unwrap();
        let frame = remote.from_client.recv().await.unwrap();
        assert!(frame.contains("\"command\":\"run\""));
    }

    #[tokio::test(start_paused = true)]
    async fn send_while_closed_is_refused() {
        let connector = MemoryConnector::default();
        let (t, _rx) = transport(&connector);
        assert_eq!(
            t.send(&run_request("x", "python")),
            Err(SessionError::TransportUnavailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn frames_arrive_in_order() {
        let connector = MemoryConnector::default();
        let (mut t, mut rx) = transport(&connector);
        t.connect();
        next_signal(&mut t, &mut rx).await;
        let remote = connector.take_remote().unwrap();
        for text in ["one", "two", "three"] {
            remote.to_client.send(text.to_string()).unwrap();
        }
        for expected in ["one", "two", "three"] {
            assert_eq!(
                next_signal(&mut t, &mut rx).await,
                TransportSignal::Frame(expected.to_string())
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn close_schedules_exactly_one_reconnect_after_fixed_delay() {
        let connector = MemoryConnector::default();
        let (mut t, mut rx) = transport(&connector);
        t.connect();
        next_signal(&mut t, &mut rx).await;

        for round in 1..=2 {
            // Remote hangs up.
            drop(connector.take_remote().unwrap());
            assert_eq!(
                next_signal(&mut t, &mut rx).await,
                TransportSignal::Closed {
                    retry_in: Some(DEFAULT_RECONNECT_DELAY)
                }
            );
            assert!(t.reconnect_pending());
            let closed_at = Instant::now();

            assert_eq!(
                next_signal(&mut t, &mut rx).await,
                TransportSignal::Reconnecting
            );
            assert_fired_after(closed_at, DEFAULT_RECONNECT_DELAY);
            assert_eq!(connector.attempts(), round + 1);

            assert_eq!(next_signal(&mut t, &mut rx).await, TransportSignal::Opened);
            assert!(!t.reconnect_pending());
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempts_retry_forever_without_backoff() {
        let connector = MemoryConnector::default();
        connector.set_refuse(true);
        let (mut t, mut rx) = transport(&connector);
        t.connect();

        for attempt in 1..=4 {
            assert_eq!(
                next_signal(&mut t, &mut rx).await,
                TransportSignal::Closed {
                    retry_in: Some(DEFAULT_RECONNECT_DELAY)
                }
            );
            let start = Instant::now();
            assert_eq!(
                next_signal(&mut t, &mut rx).await,
                TransportSignal::Reconnecting
            );
            assert_fired_after(start, DEFAULT_RECONNECT_DELAY);
            assert_eq!(connector.attempts(), attempt + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_reconnect() {
        let connector = MemoryConnector::default();
        connector.set_refuse(true);
        let (mut t, mut rx) = transport(&connector);
        t.connect();
        next_signal(&mut t, &mut rx).await;
        assert!(t.reconnect_pending());

        t.disconnect();
        assert!(!t.reconnect_pending());
        tokio::time::sleep(DEFAULT_RECONNECT_DELAY * 3).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(connector.attempts(), 1);
        assert_eq!(t.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn events_from_a_superseded_connection_are_ignored() {
        let connector = MemoryConnector::default();
        let (mut t, mut rx) = transport(&connector);
        t.connect();
        next_signal(&mut t, &mut rx).await;
        let old = connector.take_remote().unwrap();

        t.disconnect();
        old.to_client.send("late".to_string()).unwrap();
        drop(old);
        assert_eq!(next_signal(&mut t, &mut rx).await, TransportSignal::Ignored);
        assert_eq!(next_signal(&mut t, &mut rx).await, TransportSignal::Ignored);
        assert!(!t.reconnect_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn custom_delay_is_honoured() {
        let connector = MemoryConnector::default();
        connector.set_refuse(true);
        let (t, mut rx) = transport(&connector);
        let mut t = t.with_reconnect_delay(Duration::from_millis(250));
        t.connect();
        next_signal(&mut t, &mut rx).await;
        let start = Instant::now();
        next_signal(&mut t, &mut rx).await;
        assert_fired_after(start, Duration::from_millis(250));
    }
}
