//! WebRTC data channels, negotiated over the signaling WebSocket.
//!
//! Each remote node gets its own peer connection carrying one unordered,
//! unreliable data channel, which gives the packet layer UDP-like
//! semantics. The opener returns a handle immediately; a task drives the
//! offer/answer/ICE exchange and bridges traffic once the channel opens.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use webrtc::api::{APIBuilder, API};
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use veles_protocol::signaling::SignalingMessage;
use veles_protocol::NodeType;

use super::signaling::SignalingChannel;
use super::{channel_pair, ChannelEvent, ChannelShell, DataChannel, DataChannelOpener, LinkEvent, LinkState};

/// Opens WebRTC data channels through a shared signaling channel.
pub struct WebRtcOpener {
    api: Arc<API>,
    ice_servers: Vec<String>,
    next_channel_id: AtomicU32,
}

impl WebRtcOpener {
    pub fn new() -> Self {
        Self::with_ice_servers(vec!["stun:stun1.l.google.com:19302".into()])
    }

    pub fn with_ice_servers(ice_servers: Vec<String>) -> Self {
        Self {
            api: Arc::new(APIBuilder::new().build()),
            ice_servers,
            next_channel_id: AtomicU32::new(1),
        }
    }
}

impl Default for WebRtcOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl DataChannelOpener for WebRtcOpener {
    fn open(
        &self,
        node_type: NodeType,
        signaling: Option<&SignalingChannel>,
        events_tx: mpsc::Sender<ChannelEvent>,
    ) -> DataChannel {
        let (channel, shell) = channel_pair(node_type, events_tx);

        match signaling {
            Some(signaling) => {
                let channel_id = self.next_channel_id.fetch_add(1, Ordering::Relaxed);
                tokio::spawn(negotiate(
                    self.api.clone(),
                    self.ice_servers.clone(),
                    signaling.clone(),
                    channel_id,
                    shell,
                ));
            }
            None => {
                fail(&shell, "no signaling channel available for negotiation");
            }
        }

        channel
    }
}

/// Whether an inbound signaling message belongs to this negotiation. The
/// channel ID goes out with the offer and the server mirrors it on every
/// reply; a message without the matching ID is a stray from an earlier
/// channel to the same node type and must not touch this peer connection.
fn is_for_channel(message: &SignalingMessage, channel_id: u32) -> bool {
    message.channel_id == Some(channel_id)
}

fn fail(shell: &ChannelShell, reason: &str) {
    error!(node_type = %shell.node_type, reason, "Data channel failed");
    let _ = shell.state_tx.send(LinkState::Closed);
    let _ = shell.events_tx.try_send(ChannelEvent {
        node_type: shell.node_type,
        event: LinkEvent::Error(reason.into()),
    });
    let _ = shell.events_tx.try_send(ChannelEvent {
        node_type: shell.node_type,
        event: LinkEvent::Closed,
    });
}

async fn negotiate(
    api: Arc<API>,
    ice_servers: Vec<String>,
    signaling: SignalingChannel,
    channel_id: u32,
    mut shell: ChannelShell,
) {
    let node_type = shell.node_type;

    // Negotiation can only start once the signaling WebSocket is up.
    let mut signaling_state = signaling.subscribe_state();
    loop {
        let state = *signaling_state.borrow();
        match state {
            LinkState::Open => break,
            LinkState::Closed => {
                fail(&shell, "signaling channel closed before negotiation");
                return;
            }
            _ => {
                if signaling_state.changed().await.is_err() {
                    fail(&shell, "signaling channel went away before negotiation");
                    return;
                }
            }
        }
    }

    let mut route_rx = signaling.register_route(node_type.as_u8());

    let config = RTCConfiguration {
        ice_servers: vec![RTCIceServer {
            urls: ice_servers,
            ..Default::default()
        }],
        ..Default::default()
    };

    let peer_connection = match api.new_peer_connection(config).await {
        Ok(pc) => Arc::new(pc),
        Err(e) => {
            fail(&shell, &format!("failed to create peer connection: {e}"));
            return;
        }
    };

    let init = RTCDataChannelInit {
        ordered: Some(false),
        max_retransmits: Some(0),
        ..Default::default()
    };
    let data_channel = match peer_connection
        .create_data_channel("veles-packets", Some(init))
        .await
    {
        Ok(dc) => dc,
        Err(e) => {
            fail(&shell, &format!("failed to create data channel: {e}"));
            let _ = peer_connection.close().await;
            return;
        }
    };

    let state_tx = shell.state_tx.clone();
    let events_tx = shell.events_tx.clone();
    data_channel.on_open(Box::new(move || {
        let state_tx = state_tx.clone();
        let events_tx = events_tx.clone();
        Box::pin(async move {
            let _ = state_tx.send(LinkState::Open);
            let _ = events_tx
                .send(ChannelEvent {
                    node_type,
                    event: LinkEvent::Open,
                })
                .await;
        })
    }));

    let events_tx = shell.events_tx.clone();
    data_channel.on_message(Box::new(move |message: DataChannelMessage| {
        let events_tx = events_tx.clone();
        Box::pin(async move {
            let _ = events_tx
                .send(ChannelEvent {
                    node_type,
                    event: LinkEvent::Message(message.data),
                })
                .await;
        })
    }));

    let state_tx = shell.state_tx.clone();
    let events_tx = shell.events_tx.clone();
    data_channel.on_close(Box::new(move || {
        let state_tx = state_tx.clone();
        let events_tx = events_tx.clone();
        Box::pin(async move {
            let _ = state_tx.send(LinkState::Closed);
            let _ = events_tx
                .send(ChannelEvent {
                    node_type,
                    event: LinkEvent::Closed,
                })
                .await;
        })
    }));

    // Trickle our ICE candidates to the server as they are gathered.
    let candidate_signaling = signaling.clone();
    peer_connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        let signaling = candidate_signaling.clone();
        Box::pin(async move {
            let Some(candidate) = candidate else { return };
            match candidate.to_json().map(serde_json::to_value) {
                Ok(Ok(json)) => {
                    signaling.send(SignalingMessage::ice_candidate(
                        node_type.as_u8(),
                        channel_id,
                        json,
                    ));
                }
                other => warn!(?other, "Failed to encode ICE candidate"),
            }
        })
    }));

    let offer = match peer_connection.create_offer(None).await {
        Ok(offer) => offer,
        Err(e) => {
            fail(&shell, &format!("failed to create offer: {e}"));
            let _ = peer_connection.close().await;
            return;
        }
    };
    let sdp = offer.sdp.clone();
    if let Err(e) = peer_connection.set_local_description(offer).await {
        fail(&shell, &format!("failed to set local description: {e}"));
        let _ = peer_connection.close().await;
        return;
    }
    if !signaling.send(SignalingMessage::offer(node_type.as_u8(), channel_id, sdp)) {
        fail(&shell, "signaling channel rejected the offer");
        let _ = peer_connection.close().await;
        return;
    }
    debug!(node_type = %node_type, channel_id, "Sent data channel offer");

    let mut state_watch = shell.state_tx.subscribe();
    let mut signaling_gone = false;
    loop {
        tokio::select! {
            Some(message) = route_rx.recv() => {
                if !is_for_channel(&message, channel_id) {
                    debug!(
                        channel_id,
                        received = ?message.channel_id,
                        "Dropping signaling message correlated to another channel"
                    );
                } else if let Some(description) = message.description {
                    match RTCSessionDescription::answer(description.sdp) {
                        Ok(answer) => {
                            if let Err(e) = peer_connection.set_remote_description(answer).await {
                                warn!(error = %e, "Failed to apply remote description");
                            }
                        }
                        Err(e) => warn!(error = %e, "Malformed SDP answer"),
                    }
                } else if let Some(candidate) = message.candidate {
                    match serde_json::from_value::<RTCIceCandidateInit>(candidate) {
                        Ok(init) => {
                            if let Err(e) = peer_connection.add_ice_candidate(init).await {
                                warn!(error = %e, "Failed to add ICE candidate");
                            }
                        }
                        Err(e) => warn!(error = %e, "Malformed ICE candidate"),
                    }
                }
            }

            Some(payload) = shell.outgoing_rx.recv() => {
                if let Err(e) = data_channel.send(&payload).await {
                    warn!(error = %e, "Data channel send failed");
                }
            }

            _ = shell.close_rx.recv() => {
                info!(node_type = %node_type, "Closing data channel");
                let _ = data_channel.close().await;
                let _ = peer_connection.close().await;
                let _ = shell.state_tx.send(LinkState::Closed);
                let _ = shell.events_tx.send(ChannelEvent {
                    node_type,
                    event: LinkEvent::Closed,
                }).await;
                break;
            }

            changed = signaling_state.changed(), if !signaling_gone => {
                let closed = changed.is_err()
                    || *signaling_state.borrow() == LinkState::Closed;
                if closed {
                    // An established data channel outlives its signaling
                    // WebSocket; only a channel still negotiating dies
                    // with it.
                    signaling_gone = true;
                    if *shell.state_tx.borrow() == LinkState::Connecting {
                        let _ = peer_connection.close().await;
                        fail(&shell, "signaling channel closed during negotiation");
                        break;
                    }
                }
            }

            changed = state_watch.changed() => {
                if changed.is_err() || *state_watch.borrow() == LinkState::Closed {
                    let _ = peer_connection.close().await;
                    break;
                }
            }
        }
    }

    signaling.unregister_route(node_type.as_u8());
}

#[cfg(test)]
mod tests {
    use super::*;
    use veles_protocol::signaling::SessionDescription;

    #[test]
    fn messages_are_correlated_by_channel_id() {
        let answer = SignalingMessage {
            from: Some(b'D'),
            channel_id: Some(7),
            description: Some(SessionDescription {
                sdp_type: "answer".into(),
                sdp: "v=0".into(),
            }),
            ..Default::default()
        };
        assert!(is_for_channel(&answer, 7));
        // A reply mirrored for an earlier channel to the same node type.
        assert!(!is_for_channel(&answer, 8));
    }

    #[test]
    fn uncorrelated_messages_are_rejected() {
        let message = SignalingMessage {
            from: Some(b'D'),
            ..Default::default()
        };
        assert!(!is_for_channel(&message, 7));
    }
}
