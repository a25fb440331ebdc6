//! Connection adapter: bridges one transport to the hub.
//!
//! An [`Adapter`] owns two activities:
//!
//! - the **read pump** (runs inline in [`Adapter::run`]) decodes inbound
//!   frames and forwards them to the hub;
//! - the **write pump** (a spawned task) drains the outbound queue onto
//!   the transport.
//!
//! Whichever pump hits a terminal condition first moves the adapter to
//! `Leaving`; leave is idempotent at the hub, so both pumps may trigger it.
//! The hub dropping the registration (eviction or shutdown) ends the
//! adapter too, even while the write pump is stuck on a stalled transport.
//!
//! ```text
//! Connecting ──join──▶ Admitted ──first terminal condition──▶ Leaving ──pumps done──▶ Closed
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::transport::{Frame, FrameSink, FrameSource};
use crate::domain::{ChatMessage, ClientId, Envelope, InboundMessage};
use crate::hub::{HubHandle, OutboundReceiver, Registration};

/// Default time the write pump may take to flush and close after leave.
pub const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Per-connection tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterSettings {
    /// Slots in the outbound queue. A full queue drops new messages for
    /// this connection only.
    pub outbound_capacity: usize,
    /// Close the connection after this long without an inbound frame.
    pub idle_timeout: Option<Duration>,
    /// How long the write pump may keep flushing after leave before it is
    /// aborted.
    pub close_grace: Duration,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            idle_timeout: None,
            close_grace: CLOSE_GRACE,
        }
    }
}

/// Lifecycle of one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, not yet admitted by the hub.
    Connecting,
    /// In the hub's client set, both pumps running.
    Admitted,
    /// A pump stopped; leaving the hub and releasing the transport.
    Leaving,
    /// Both pumps exited and the transport was released.
    Closed,
}

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// The peer sent a close frame or the stream ended.
    PeerClosed,
    /// An inbound frame was not a valid message.
    DecodeFailed,
    /// Receiving from the transport failed.
    ReadFailed,
    /// No inbound frame arrived within the idle timeout.
    IdleTimeout,
    /// Sending to the transport failed.
    WriteFailed,
    /// The hub dropped this connection's registration (eviction or
    /// shutdown).
    Released,
    /// The hub was shut down.
    HubClosed,
}

/// One connection's bridge to the hub.
#[derive(Debug)]
pub struct Adapter {
    id: ClientId,
    name: String,
    hub: HubHandle,
    settings: AdapterSettings,
    state: ConnectionState,
}

impl Adapter {
    /// Creates an adapter for a connection shown to others as `name`.
    #[must_use]
    pub fn new(hub: HubHandle, name: impl Into<String>, settings: AdapterSettings) -> Self {
        Self {
            id: ClientId::new(),
            name: name.into(),
            hub,
            settings,
            state: ConnectionState::Connecting,
        }
    }

    /// Returns this connection's registration id.
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Joins the hub, starts the write pump, then runs the read pump until
    /// either pump stops. Returns once the adapter is `Closed`.
    ///
    /// Join completes before the write pump is spawned and before the
    /// first inbound frame is read.
    pub async fn run<Si, St>(&mut self, mut sink: Si, mut source: St) -> Disconnect
    where
        Si: FrameSink,
        St: FrameSource,
    {
        let (registration, queue, mut released) =
            Registration::new(self.id, self.name.clone(), self.settings.outbound_capacity);
        if self.hub.join(registration).await.is_err() {
            let _ = sink.close().await;
            self.transition(ConnectionState::Closed);
            return Disconnect::HubClosed;
        }
        self.transition(ConnectionState::Admitted);
        tracing::info!(client_id = %self.id, name = %self.name, "client connected");

        let mut writer = tokio::spawn(write_pump(sink, queue, self.id));
        let idle = self.settings.idle_timeout;
        let reason = tokio::select! {
            reason = read_pump(&mut source, &self.hub, self.id, &self.name, idle) => reason,
            written = &mut writer => written.unwrap_or(Disconnect::WriteFailed),
            _ = &mut released => Disconnect::Released,
        };

        self.transition(ConnectionState::Leaving);
        self.hub.leave(self.id).await;
        drop(source);
        finish_writer(writer, self.id, self.settings.close_grace).await;
        self.transition(ConnectionState::Closed);

        tracing::info!(
            client_id = %self.id,
            name = %self.name,
            reason = ?reason,
            "client disconnected"
        );
        reason
    }

    fn transition(&mut self, next: ConnectionState) {
        tracing::debug!(client_id = %self.id, from = ?self.state, to = ?next, "connection state");
        self.state = next;
    }
}

/// Reads frames and forwards them until a terminal condition.
async fn read_pump<St: FrameSource>(
    source: &mut St,
    hub: &HubHandle,
    id: ClientId,
    name: &str,
    idle_timeout: Option<Duration>,
) -> Disconnect {
    loop {
        let next = match idle_timeout {
            Some(limit) => match timeout(limit, source.next()).await {
                Ok(next) => next,
                Err(_) => return Disconnect::IdleTimeout,
            },
            None => source.next().await,
        };

        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                tracing::debug!(client_id = %id, error = %e, "read failed");
                return Disconnect::ReadFailed;
            }
            None => return Disconnect::PeerClosed,
        };
        let Some(payload) = frame.payload() else {
            return Disconnect::PeerClosed;
        };
        let inbound = match InboundMessage::decode(payload) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::debug!(client_id = %id, error = %e, "undecodable frame");
                return Disconnect::DecodeFailed;
            }
        };

        let envelope = Envelope::new(id, ChatMessage::new(name, inbound.body));
        if hub.forward(envelope).await.is_err() {
            return Disconnect::HubClosed;
        }
    }
}

/// Drains the outbound queue onto the transport. Closes the transport on
/// exit.
async fn write_pump<Si: FrameSink>(
    mut sink: Si,
    mut queue: OutboundReceiver,
    id: ClientId,
) -> Disconnect {
    while let Some(envelope) = queue.recv().await {
        let text = match envelope.message.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(client_id = %id, error = %e, "skipping unencodable message");
                continue;
            }
        };
        if let Err(e) = sink.send(Frame::Text(text)).await {
            tracing::debug!(client_id = %id, error = %e, "write failed");
            return Disconnect::WriteFailed;
        }
    }
    let _ = sink.send(Frame::Close).await;
    let _ = sink.close().await;
    Disconnect::Released
}

/// Waits for the write pump after leave; aborts it if the transport does
/// not drain within `grace`.
async fn finish_writer(mut writer: JoinHandle<Disconnect>, id: ClientId, grace: Duration) {
    if writer.is_finished() {
        return;
    }
    if timeout(grace, &mut writer).await.is_err() {
        tracing::warn!(client_id = %id, "write pump did not stop, aborting");
        writer.abort();
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use futures_util::{future, sink, stream};
    use tokio::sync::mpsc;

    use super::*;
    use crate::connection::transport::TransportError;
    use crate::domain::NoopTracer;
    use crate::hub::{Hub, HubSettings};

    const WAIT: Duration = Duration::from_secs(2);

    /// Test side of an in-memory transport.
    struct Peer {
        inbound: mpsc::Sender<Result<Frame, TransportError>>,
        outbound: mpsc::Receiver<Frame>,
    }

    impl Peer {
        async fn send_text(&self, text: &str) {
            let Ok(()) = self.inbound.send(Ok(Frame::Text(text.to_string()))).await else {
                panic!("adapter stopped reading");
            };
        }

        async fn recv(&mut self) -> Option<Frame> {
            match timeout(WAIT, self.outbound.recv()).await {
                Ok(frame) => frame,
                Err(_) => panic!("timed out waiting for outbound frame"),
            }
        }

        async fn recv_message(&mut self) -> ChatMessage {
            let Some(Frame::Text(text)) = self.recv().await else {
                panic!("expected a text frame");
            };
            let Ok(msg) = serde_json::from_str(&text) else {
                panic!("outbound frame is not a chat message");
            };
            msg
        }
    }

    fn memory_transport() -> (impl FrameSink, impl FrameSource, Peer) {
        let (in_tx, in_rx) = mpsc::channel::<Result<Frame, TransportError>>(16);
        let (out_tx, out_rx) = mpsc::channel::<Frame>(16);
        let source = Box::pin(stream::unfold(in_rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        }));
        let sink = Box::pin(sink::unfold(out_tx, |tx, frame: Frame| async move {
            tx.send(frame).await.map_err(|_| TransportError::Closed)?;
            Ok::<_, TransportError>(tx)
        }));
        (
            sink,
            source,
            Peer {
                inbound: in_tx,
                outbound: out_rx,
            },
        )
    }

    /// Transport whose sink never completes a send, like a peer that
    /// stopped reading. Keep the returned sender alive to hold the read
    /// side open.
    fn stalled_transport() -> (
        impl FrameSink,
        impl FrameSource,
        mpsc::Sender<Result<Frame, TransportError>>,
    ) {
        let (in_tx, in_rx) = mpsc::channel::<Result<Frame, TransportError>>(1);
        let source = Box::pin(stream::unfold(in_rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        }));
        let sink = Box::pin(sink::unfold((), |(), _frame: Frame| {
            future::pending::<Result<(), TransportError>>()
        }));
        (sink, source, in_tx)
    }

    fn quick_close() -> AdapterSettings {
        AdapterSettings {
            outbound_capacity: 1,
            close_grace: Duration::from_millis(50),
            ..AdapterSettings::default()
        }
    }

    fn hub() -> (HubHandle, JoinHandle<()>) {
        Hub::spawn(HubSettings::default(), Arc::new(NoopTracer))
    }

    async fn wait_for_clients(hub: &HubHandle, expected: usize) {
        let poll = async {
            while hub.client_count().await != Ok(expected) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        let Ok(()) = timeout(WAIT, poll).await else {
            panic!("client count never reached {expected}");
        };
    }

    type AdapterTask = JoinHandle<(Disconnect, ConnectionState)>;

    fn connect(hub: &HubHandle, name: &str, settings: AdapterSettings) -> (Peer, AdapterTask) {
        let (sink, source, peer) = memory_transport();
        let mut adapter = Adapter::new(hub.clone(), name, settings);
        let task = tokio::spawn(async move {
            let reason = adapter.run(sink, source).await;
            (reason, adapter.state())
        });
        (peer, task)
    }

    async fn finished(task: AdapterTask) -> (Disconnect, ConnectionState) {
        match timeout(WAIT, task).await {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => panic!("adapter task failed: {e}"),
            Err(_) => panic!("adapter did not finish"),
        }
    }

    #[tokio::test]
    async fn relays_messages_between_peers() {
        let (hub, _loop) = hub();
        let (alice, _a) = connect(&hub, "alice", AdapterSettings::default());
        let (mut bob, _b) = connect(&hub, "bob", AdapterSettings::default());
        wait_for_clients(&hub, 2).await;

        alice.send_text(r#"{"body":"hi bob"}"#).await;
        let msg = bob.recv_message().await;
        assert_eq!(msg.name, "alice");
        assert_eq!(msg.body, "hi bob");
    }

    #[tokio::test]
    async fn sender_receives_own_message_by_default() {
        let (hub, _loop) = hub();
        let (mut alice, _a) = connect(&hub, "alice", AdapterSettings::default());
        wait_for_clients(&hub, 1).await;

        alice.send_text(r#"{"message":"echo"}"#).await;
        assert_eq!(alice.recv_message().await.body, "echo");
    }

    #[tokio::test]
    async fn peer_close_leaves_hub_and_closes_transport() {
        let (hub, _loop) = hub();
        let (mut alice, task) = connect(&hub, "alice", AdapterSettings::default());
        wait_for_clients(&hub, 1).await;

        let Ok(()) = alice.inbound.send(Ok(Frame::Close)).await else {
            panic!("adapter stopped reading");
        };
        let (reason, state) = finished(task).await;
        assert_eq!(reason, Disconnect::PeerClosed);
        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(hub.client_count().await, Ok(0));

        assert_eq!(alice.recv().await, Some(Frame::Close));
        assert_eq!(alice.recv().await, None);
    }

    #[tokio::test]
    async fn dropped_stream_counts_as_peer_close() {
        let (hub, _loop) = hub();
        let (alice, task) = connect(&hub, "alice", AdapterSettings::default());
        wait_for_clients(&hub, 1).await;
        drop(alice);

        let (reason, _) = finished(task).await;
        assert_eq!(reason, Disconnect::PeerClosed);
        assert_eq!(hub.client_count().await, Ok(0));
    }

    #[tokio::test]
    async fn undecodable_frame_terminates_connection() {
        let (hub, _loop) = hub();
        let (alice, task) = connect(&hub, "alice", AdapterSettings::default());
        wait_for_clients(&hub, 1).await;

        alice.send_text("definitely not json").await;
        let (reason, _) = finished(task).await;
        assert_eq!(reason, Disconnect::DecodeFailed);
        assert_eq!(hub.client_count().await, Ok(0));
    }

    #[tokio::test]
    async fn read_error_terminates_connection() {
        let (hub, _loop) = hub();
        let (alice, task) = connect(&hub, "alice", AdapterSettings::default());
        wait_for_clients(&hub, 1).await;

        let Ok(()) = alice.inbound.send(Err(TransportError::Closed)).await else {
            panic!("adapter stopped reading");
        };
        let (reason, _) = finished(task).await;
        assert_eq!(reason, Disconnect::ReadFailed);
    }

    #[tokio::test]
    async fn write_failure_leaves_hub() {
        let (hub, _loop) = hub();
        let (alice, _a) = connect(&hub, "alice", AdapterSettings::default());
        let (bob, bob_task) = connect(&hub, "bob", AdapterSettings::default());
        wait_for_clients(&hub, 2).await;

        // Bob's outbound side is gone but his inbound side stays open.
        let Peer { inbound: _bob_in, outbound } = bob;
        drop(outbound);

        alice.send_text(r#"{"body":"anyone?"}"#).await;
        let (reason, state) = finished(bob_task).await;
        assert_eq!(reason, Disconnect::WriteFailed);
        assert_eq!(state, ConnectionState::Closed);
        wait_for_clients(&hub, 1).await;
    }

    #[tokio::test]
    async fn idle_connection_times_out() {
        let (hub, _loop) = hub();
        let settings = AdapterSettings {
            idle_timeout: Some(Duration::from_millis(50)),
            ..AdapterSettings::default()
        };
        let (_alice, task) = connect(&hub, "alice", settings);

        let (reason, _) = finished(task).await;
        assert_eq!(reason, Disconnect::IdleTimeout);
        assert_eq!(hub.client_count().await, Ok(0));
    }

    #[tokio::test]
    async fn hub_shutdown_releases_connection() {
        let (hub, _loop) = hub();
        let (mut alice, task) = connect(&hub, "alice", AdapterSettings::default());
        wait_for_clients(&hub, 1).await;

        hub.shutdown().await;
        let (reason, state) = finished(task).await;
        assert_eq!(reason, Disconnect::Released);
        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(alice.recv().await, Some(Frame::Close));
    }

    #[tokio::test]
    async fn join_after_shutdown_closes_immediately() {
        let (hub, hub_loop) = hub();
        hub.shutdown().await;
        let Ok(Ok(())) = timeout(WAIT, hub_loop).await else {
            panic!("hub loop did not stop");
        };

        let (mut alice, task) = connect(&hub, "alice", AdapterSettings::default());
        let (reason, state) = finished(task).await;
        assert_eq!(reason, Disconnect::HubClosed);
        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(alice.recv().await, None);
    }

    #[tokio::test]
    async fn eviction_releases_adapter_with_stalled_transport() {
        let (hub, _loop) = Hub::spawn(
            HubSettings {
                max_consecutive_drops: 2,
                ..HubSettings::default()
            },
            Arc::new(NoopTracer),
        );
        let (sink, source, _inbound) = stalled_transport();
        let mut adapter = Adapter::new(hub.clone(), "stuck", quick_close());
        let task: AdapterTask = tokio::spawn(async move {
            let reason = adapter.run(sink, source).await;
            (reason, adapter.state())
        });
        wait_for_clients(&hub, 1).await;

        // One envelope blocks the write pump, one fills the queue, the rest
        // are dropped until the hub evicts.
        let sender = ClientId::new();
        for i in 0..6 {
            let envelope = Envelope::new(sender, ChatMessage::new("x", i.to_string()));
            let Ok(()) = hub.forward(envelope).await else {
                panic!("hub closed");
            };
        }

        let (reason, state) = finished(task).await;
        assert_eq!(reason, Disconnect::Released);
        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(hub.client_count().await, Ok(0));
    }

    #[tokio::test]
    async fn shutdown_releases_adapter_with_stalled_transport() {
        let (hub, _loop) = hub();
        let (sink, source, _inbound) = stalled_transport();
        let mut adapter = Adapter::new(hub.clone(), "stuck", quick_close());
        let task: AdapterTask = tokio::spawn(async move {
            let reason = adapter.run(sink, source).await;
            (reason, adapter.state())
        });
        wait_for_clients(&hub, 1).await;

        let Ok(()) = hub
            .forward(Envelope::new(ClientId::new(), ChatMessage::new("x", "stuck")))
            .await
        else {
            panic!("hub closed");
        };
        hub.shutdown().await;

        let (reason, state) = finished(task).await;
        assert_eq!(reason, Disconnect::Released);
        assert_eq!(state, ConnectionState::Closed);
    }
}
