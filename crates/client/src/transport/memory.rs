//! In-memory data channels for tests and same-process servers.
//!
//! The memory opener skips WebRTC negotiation and hands the server half of
//! each channel to whoever holds the accept queue, which lets a scripted
//! domain server run in the same process. A network can also be put in a
//! refusing mode to exercise the failure path of channel creation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;
use veles_protocol::NodeType;

use super::signaling::SignalingChannel;
use super::{channel_pair, ChannelEvent, DataChannel, DataChannelOpener, LinkEvent, LinkState};

/// The server half of an in-memory channel.
pub struct MemoryPeer {
    pub node_type: NodeType,
    /// Payloads the client sent.
    pub incoming_rx: mpsc::Receiver<Bytes>,
    /// Payloads to deliver to the client.
    pub outgoing_tx: mpsc::Sender<Bytes>,
}

/// A process-local fabric of channel pairs.
#[derive(Clone)]
pub struct MemoryNetwork {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    refusing: Arc<AtomicBool>,
}

impl MemoryNetwork {
    /// Creates a network plus the queue on which server halves arrive.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (
            Self {
                accept_tx,
                refusing: Arc::new(AtomicBool::new(false)),
            },
            accept_rx,
        )
    }

    /// While set, every open attempt fails with an error event, like
    /// dialing an unreachable host.
    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }
}

/// Opens in-memory channels on a [`MemoryNetwork`].
pub struct MemoryOpener {
    network: MemoryNetwork,
}

impl MemoryOpener {
    pub fn new(network: MemoryNetwork) -> Self {
        Self { network }
    }
}

impl DataChannelOpener for MemoryOpener {
    fn requires_signaling(&self) -> bool {
        false
    }

    fn open(
        &self,
        node_type: NodeType,
        _signaling: Option<&SignalingChannel>,
        events_tx: mpsc::Sender<ChannelEvent>,
    ) -> DataChannel {
        let (channel, mut shell) = channel_pair(node_type, events_tx);
        let network = self.network.clone();

        tokio::spawn(async move {
            if network.refusing.load(Ordering::SeqCst) {
                let _ = shell.state_tx.send(LinkState::Closed);
                let _ = shell
                    .events_tx
                    .send(ChannelEvent {
                        node_type,
                        event: LinkEvent::Error("connection refused".into()),
                    })
                    .await;
                let _ = shell
                    .events_tx
                    .send(ChannelEvent {
                        node_type,
                        event: LinkEvent::Closed,
                    })
                    .await;
                return;
            }

            let (to_server_tx, to_server_rx) = mpsc::channel(64);
            let (to_client_tx, mut to_client_rx) = mpsc::channel::<Bytes>(64);
            let peer = MemoryPeer {
                node_type,
                incoming_rx: to_server_rx,
                outgoing_tx: to_client_tx,
            };
            if network.accept_tx.send(peer).is_err() {
                let _ = shell.state_tx.send(LinkState::Closed);
                let _ = shell
                    .events_tx
                    .send(ChannelEvent {
                        node_type,
                        event: LinkEvent::Error("no listener on memory network".into()),
                    })
                    .await;
                let _ = shell
                    .events_tx
                    .send(ChannelEvent {
                        node_type,
                        event: LinkEvent::Closed,
                    })
                    .await;
                return;
            }

            let _ = shell.state_tx.send(LinkState::Open);
            let _ = shell
                .events_tx
                .send(ChannelEvent {
                    node_type,
                    event: LinkEvent::Open,
                })
                .await;

            loop {
                tokio::select! {
                    Some(payload) = shell.outgoing_rx.recv() => {
                        if to_server_tx.send(payload).await.is_err() {
                            debug!(node_type = %node_type, "Memory peer dropped");
                            break;
                        }
                    }

                    inbound = to_client_rx.recv() => {
                        match inbound {
                            Some(payload) => {
                                let _ = shell.events_tx.send(ChannelEvent {
                                    node_type,
                                    event: LinkEvent::Message(payload),
                                }).await;
                            }
                            None => break,
                        }
                    }

                    _ = shell.close_rx.recv() => break,
                }
            }

            let _ = shell.state_tx.send(LinkState::Closed);
            let _ = shell
                .events_tx
                .send(ChannelEvent {
                    node_type,
                    event: LinkEvent::Closed,
                })
                .await;
        });

        channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn next_event(events_rx: &mut mpsc::Receiver<ChannelEvent>) -> LinkEvent {
        tokio::time::timeout(std::time::Duration::from_secs(1), events_rx.recv())
            .await
            .expect("timed out waiting for channel event")
            .expect("event queue closed")
            .event
    }

    #[tokio::test]
    async fn echo_through_a_memory_channel() {
        let (network, mut accept_rx) = MemoryNetwork::new();
        let opener = MemoryOpener::new(network);
        let (events_tx, mut events_rx) = mpsc::channel(16);

        let channel = opener.open(NodeType::DomainServer, None, events_tx);
        assert_eq!(channel.ready_state(), LinkState::Connecting);

        // Echo peer.
        tokio::spawn(async move {
            let mut peer = accept_rx.recv().await.unwrap();
            while let Some(payload) = peer.incoming_rx.recv().await {
                let _ = peer.outgoing_tx.send(payload).await;
            }
        });

        assert!(matches!(next_event(&mut events_rx).await, LinkEvent::Open));
        assert_eq!(channel.ready_state(), LinkState::Open);

        assert!(channel.send(Bytes::from_static(b"echo:Hello")));
        match next_event(&mut events_rx).await {
            LinkEvent::Message(payload) => assert_eq!(&payload[..], b"echo:Hello"),
            other => panic!("expected echo, got {:?}", other),
        }

        channel.close();
        assert_eq!(channel.ready_state(), LinkState::Closing);
        assert!(matches!(next_event(&mut events_rx).await, LinkEvent::Closed));
        assert_eq!(channel.ready_state(), LinkState::Closed);
    }

    #[tokio::test]
    async fn refused_network_produces_error_then_closed() {
        let (network, _accept_rx) = MemoryNetwork::new();
        network.set_refusing(true);
        let opener = MemoryOpener::new(network);
        let (events_tx, mut events_rx) = mpsc::channel(16);

        let channel = opener.open(NodeType::DomainServer, None, events_tx);
        assert!(matches!(next_event(&mut events_rx).await, LinkEvent::Error(_)));
        assert!(matches!(next_event(&mut events_rx).await, LinkEvent::Closed));
        assert_eq!(channel.ready_state(), LinkState::Closed);
        assert!(!channel.send(Bytes::from_static(b"nope")));
    }

    #[tokio::test]
    async fn send_after_close_returns_false_with_an_error_event() {
        let (network, mut accept_rx) = MemoryNetwork::new();
        let opener = MemoryOpener::new(network);
        let (events_tx, mut events_rx) = mpsc::channel(16);

        let channel = opener.open(NodeType::AudioMixer, None, events_tx);
        // Hold the server half so the channel stays up until we close it.
        let _peer = accept_rx.recv().await.unwrap();

        assert!(matches!(next_event(&mut events_rx).await, LinkEvent::Open));
        channel.close();
        assert!(matches!(next_event(&mut events_rx).await, LinkEvent::Closed));

        assert!(!channel.send(Bytes::from_static(b"late")));
        assert!(matches!(next_event(&mut events_rx).await, LinkEvent::Error(_)));
    }
}
