//! Transport layer: the signaling WebSocket and per-node data channels.
//!
//! Every data channel is a small state machine driven by a task that owns
//! the underlying connection and reports back over queues: ready-state
//! changes through a watch channel, traffic and lifecycle events through the
//! socket's shared event queue. The [`DataChannelOpener`] trait is the seam
//! between the socket and a concrete transport; production uses the WebRTC
//! opener, tests and same-process setups use the in-memory one.

pub mod memory;
pub mod signaling;
pub mod webrtc;

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use veles_protocol::NodeType;

use self::signaling::SignalingChannel;

/// Data-channel ready state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// What a channel task reports to its consumer.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    Open,
    Message(Bytes),
    Error(String),
    Closed,
}

/// A [`LinkEvent`] tagged with the channel it came from.
#[derive(Debug, Clone)]
pub struct ChannelEvent {
    pub node_type: NodeType,
    pub event: LinkEvent,
}

/// Handle to one data channel. The owning task holds the other ends.
pub struct DataChannel {
    node_type: NodeType,
    state_tx: Arc<watch::Sender<LinkState>>,
    state_rx: watch::Receiver<LinkState>,
    outgoing_tx: mpsc::Sender<Bytes>,
    close_tx: mpsc::Sender<()>,
    events_tx: mpsc::Sender<ChannelEvent>,
}

/// The task-side ends of a channel created by [`channel_pair`].
pub struct ChannelShell {
    pub node_type: NodeType,
    pub state_tx: Arc<watch::Sender<LinkState>>,
    pub outgoing_rx: mpsc::Receiver<Bytes>,
    pub close_rx: mpsc::Receiver<()>,
    pub events_tx: mpsc::Sender<ChannelEvent>,
}

/// Builds a handle/shell pair for a channel starting in `Connecting`.
pub fn channel_pair(
    node_type: NodeType,
    events_tx: mpsc::Sender<ChannelEvent>,
) -> (DataChannel, ChannelShell) {
    let (state_tx, state_rx) = watch::channel(LinkState::Connecting);
    let state_tx = Arc::new(state_tx);
    let (outgoing_tx, outgoing_rx) = mpsc::channel(64);
    let (close_tx, close_rx) = mpsc::channel(1);

    let channel = DataChannel {
        node_type,
        state_tx: state_tx.clone(),
        state_rx,
        outgoing_tx,
        close_tx,
        events_tx: events_tx.clone(),
    };
    let shell = ChannelShell {
        node_type,
        state_tx,
        outgoing_rx,
        close_rx,
        events_tx,
    };
    (channel, shell)
}

impl DataChannel {
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn ready_state(&self) -> LinkState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LinkState> {
        self.state_rx.clone()
    }

    /// Queues a payload for the channel task. Succeeds only while the
    /// channel is open; a send on a closed channel reports an error event
    /// and returns false instead of panicking.
    pub fn send(&self, payload: Bytes) -> bool {
        if self.ready_state() != LinkState::Open {
            let _ = self.events_tx.try_send(ChannelEvent {
                node_type: self.node_type,
                event: LinkEvent::Error("send on a data channel that is not open".into()),
            });
            return false;
        }
        self.outgoing_tx.try_send(payload).is_ok()
    }

    /// Starts closing the channel. Idempotent; the owning task finishes the
    /// transition to `Closed`.
    pub fn close(&self) {
        let current = self.ready_state();
        if current == LinkState::Closed || current == LinkState::Closing {
            return;
        }
        let _ = self.state_tx.send(LinkState::Closing);
        let _ = self.close_tx.try_send(());
    }
}

/// Creates data channels for the socket. `open` returns immediately with a
/// channel in `Connecting`; negotiation proceeds in a task and failures
/// surface as an error event plus the `Closed` state.
pub trait DataChannelOpener: Send + Sync {
    fn open(
        &self,
        node_type: NodeType,
        signaling: Option<&SignalingChannel>,
        events_tx: mpsc::Sender<ChannelEvent>,
    ) -> DataChannel;

    /// Whether this opener negotiates through a signaling channel. The
    /// socket skips dialing the signaling WebSocket when it does not.
    fn requires_signaling(&self) -> bool {
        true
    }
}
