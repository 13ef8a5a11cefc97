//! The one-to-many datagram socket.
//!
//! A socket owns exactly one signaling channel and one data channel per
//! remote node type; nothing else may close those handles. Channel events
//! flow into a single queue whose receiver the node list holds.

use std::collections::HashMap;
use std::time::Instant;

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use veles_protocol::NodeType;

use crate::transport::signaling::SignalingChannel;
use crate::transport::{ChannelEvent, DataChannel, DataChannelOpener, LinkState};

/// Connection state of one peer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Unconnected,
    Connecting,
    Connected,
}

pub struct Socket {
    opener: Arc<dyn DataChannelOpener>,
    signaling: Option<SignalingChannel>,
    channels: HashMap<NodeType, DataChannel>,
    events_tx: mpsc::Sender<ChannelEvent>,
    last_teardown: Option<Instant>,
}

impl Socket {
    /// Builds a socket and the queue its channel events arrive on.
    pub fn new(opener: Arc<dyn DataChannelOpener>) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::channel(256);
        (
            Self {
                opener,
                signaling: None,
                channels: HashMap::new(),
                events_tx,
                last_teardown: None,
            },
            events_rx,
        )
    }

    /// Opens the signaling channel to `url` if needed, then starts a data
    /// channel to the given node type. Non-blocking: negotiation proceeds
    /// in the background and progress is reported through the event queue.
    pub fn connect_to_host(&mut self, url: &str, node_type: NodeType) {
        if matches!(
            self.state(node_type),
            SocketState::Connecting | SocketState::Connected
        ) {
            return;
        }

        if self.opener.requires_signaling() {
            let signaling_up = self
                .signaling
                .as_ref()
                .is_some_and(|s| s.state() != LinkState::Closed);
            if !signaling_up {
                self.signaling = Some(SignalingChannel::open(url));
            }
        }

        self.open_data_channel(node_type);
    }

    /// Starts a data channel over the already-open signaling channel.
    pub fn open_data_channel(&mut self, node_type: NodeType) {
        if matches!(
            self.state(node_type),
            SocketState::Connecting | SocketState::Connected
        ) {
            return;
        }
        debug!(node_type = %node_type, "Opening data channel");
        let channel = self
            .opener
            .open(node_type, self.signaling.as_ref(), self.events_tx.clone());
        self.channels.insert(node_type, channel);
    }

    pub fn state(&self, node_type: NodeType) -> SocketState {
        match self.channels.get(&node_type) {
            None => SocketState::Unconnected,
            Some(channel) => match channel.ready_state() {
                LinkState::Open => SocketState::Connected,
                LinkState::Connecting => SocketState::Connecting,
                LinkState::Closing | LinkState::Closed => SocketState::Unconnected,
            },
        }
    }

    /// Sends one datagram to a peer. Returns false when the peer has no
    /// open channel.
    pub fn write_datagram(&self, node_type: NodeType, payload: Bytes) -> bool {
        match self.channels.get(&node_type) {
            Some(channel) => channel.send(payload),
            None => false,
        }
    }

    /// Closes one peer's channel, leaving the rest of the socket up.
    pub fn close_channel(&mut self, node_type: NodeType) {
        if let Some(channel) = self.channels.remove(&node_type) {
            channel.close();
        }
    }

    /// Closes every data channel and the signaling channel. The socket can
    /// be reconnected immediately; the reconnect barrier is enforced by
    /// [`Socket::reconnect_allowed`].
    pub fn clear_connections(&mut self) {
        info!("Clearing socket connections");
        for (_, channel) in self.channels.drain() {
            channel.close();
        }
        if let Some(signaling) = self.signaling.take() {
            signaling.close();
        }
        self.last_teardown = Some(Instant::now());
    }

    /// Drops everything without graceful closes.
    pub fn abort(&mut self) {
        self.channels.clear();
        self.signaling = None;
        self.last_teardown = Some(Instant::now());
    }

    /// Whether enough time has passed since the last teardown for a redial
    /// to the same host to succeed.
    pub fn reconnect_allowed(&self, min_delay: std::time::Duration) -> bool {
        self.last_teardown
            .map_or(true, |at| at.elapsed() >= min_delay)
    }
}
