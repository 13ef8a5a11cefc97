//! The signaling channel: JSON control messages over one WebSocket.
//!
//! A single WebSocket carries SDP/ICE negotiation for every data channel of
//! a domain session. Inbound messages are routed to per-node-type
//! subscribers by their `from` byte; the channel task owns the socket and
//! runs until the server closes it, an error occurs, or `close` is called.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use veles_protocol::signaling::SignalingMessage;

use super::LinkState;

type Router = Arc<Mutex<HashMap<u8, mpsc::Sender<SignalingMessage>>>>;

/// Handle to the signaling WebSocket task. Clones share one connection.
#[derive(Clone)]
pub struct SignalingChannel {
    state_rx: watch::Receiver<LinkState>,
    outgoing_tx: mpsc::Sender<SignalingMessage>,
    router: Router,
    close_tx: mpsc::Sender<()>,
}

impl SignalingChannel {
    /// Starts connecting to `url`. Returns immediately; the state moves to
    /// `Open` once the WebSocket handshake completes, or to `Closed` on
    /// failure.
    pub fn open(url: &str) -> Self {
        let (state_tx, state_rx) = watch::channel(LinkState::Connecting);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(64);
        let (close_tx, close_rx) = mpsc::channel(1);
        let router: Router = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(run(
            url.to_owned(),
            state_tx,
            outgoing_rx,
            close_rx,
            router.clone(),
        ));

        Self {
            state_rx,
            outgoing_tx,
            router,
            close_tx,
        }
    }

    pub fn state(&self) -> LinkState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LinkState> {
        self.state_rx.clone()
    }

    /// Queues a message for the WebSocket. Returns false when the channel
    /// is closed or the queue is full.
    pub fn send(&self, message: SignalingMessage) -> bool {
        if self.state() == LinkState::Closed {
            return false;
        }
        self.outgoing_tx.try_send(message).is_ok()
    }

    /// Subscribes to inbound messages whose `from` byte equals
    /// `node_type_byte`. A later registration for the same byte replaces
    /// the earlier one.
    pub fn register_route(&self, node_type_byte: u8) -> mpsc::Receiver<SignalingMessage> {
        let (tx, rx) = mpsc::channel(16);
        if let Ok(mut router) = self.router.lock() {
            router.insert(node_type_byte, tx);
        }
        rx
    }

    pub fn unregister_route(&self, node_type_byte: u8) {
        if let Ok(mut router) = self.router.lock() {
            router.remove(&node_type_byte);
        }
    }

    /// Starts closing the WebSocket. Idempotent.
    pub fn close(&self) {
        let _ = self.close_tx.try_send(());
    }
}

async fn run(
    url: String,
    state_tx: watch::Sender<LinkState>,
    mut outgoing_rx: mpsc::Receiver<SignalingMessage>,
    mut close_rx: mpsc::Receiver<()>,
    router: Router,
) {
    info!(url = %url, "Opening signaling channel");

    let connect = tokio::select! {
        result = connect_async(&url) => result,
        _ = close_rx.recv() => {
            let _ = state_tx.send(LinkState::Closed);
            return;
        }
    };

    let ws_stream = match connect {
        Ok((stream, _)) => stream,
        Err(e) => {
            error!(url = %url, error = %e, "Signaling connection failed");
            let _ = state_tx.send(LinkState::Closed);
            return;
        }
    };

    info!(url = %url, "Signaling channel open");
    let _ = state_tx.send(LinkState::Open);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            inbound = ws_receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<SignalingMessage>(&text) {
                            Ok(message) => route(&router, message),
                            Err(e) => warn!(error = %e, "Dropping unparseable signaling message"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Signaling channel closed by server");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary frames and pings are not part of the
                        // signaling protocol.
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Signaling channel error");
                        break;
                    }
                }
            }

            Some(message) = outgoing_rx.recv() => {
                match serde_json::to_string(&message) {
                    Ok(json) => {
                        if let Err(e) = ws_sender.send(Message::Text(json)).await {
                            error!(error = %e, "Failed to send signaling message");
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to encode signaling message"),
                }
            }

            _ = close_rx.recv() => {
                let _ = state_tx.send(LinkState::Closing);
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    let _ = state_tx.send(LinkState::Closed);
}

fn route(router: &Router, message: SignalingMessage) {
    let Some(from) = message.from else {
        debug!("Signaling message without a sender byte");
        return;
    };
    let Ok(router) = router.lock() else {
        return;
    };
    match router.get(&from) {
        Some(tx) => {
            if tx.try_send(message).is_err() {
                warn!(from, "Signaling subscriber queue is full or gone");
            }
        }
        None => debug!(from, "No subscriber for signaling sender"),
    }
}
