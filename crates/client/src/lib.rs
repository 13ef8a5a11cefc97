//! # Veles Client
//!
//! Client networking core for a real-time virtual world: WebRTC data
//! channels negotiated over a WebSocket signaling channel, the domain
//! join/check-in protocol, the node roster, and entity edits.
//!
//! The public surface mirrors how a world client is put together: one
//! [`DomainServer`] per context runs the session, and the assignment-client
//! handles ([`AvatarMixer`], [`AudioMixer`], [`EntityServer`],
//! [`MessagesMixer`]) observe the nodes the domain assigns. A process may
//! hold several independent contexts, each with its own socket and roster.
//!
//! ## Example
//!
//! ```no_run
//! use veles_client::{ClientConfig, DomainServer, EntityServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let domain_server = DomainServer::new(ClientConfig::default());
//!     let entity_server = EntityServer::new(domain_server.context_id());
//!
//!     domain_server.connect("ws://127.0.0.1:40102").await;
//!     entity_server.on_entity_data(|records| {
//!         println!("received {} entities", records.len());
//!     });
//! }
//! ```

pub mod config;
pub mod domain_handler;
pub mod node;
pub mod node_list;
pub mod packet_receiver;
pub mod socket;
pub mod transport;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tokio::sync::{broadcast, watch};
use tracing::warn;
use uuid::Uuid;
use veles_protocol::entity_edit::EntityEditMessage;
use veles_protocol::{EntityProperties, NodeType};

use node_list::{Command, NodeList, NodeListHandle};
use transport::webrtc::WebRtcOpener;
use transport::DataChannelOpener;

pub use config::ClientConfig;
pub use domain_handler::DomainState;
pub use node_list::{AssignmentClientState, SessionEvent};

static CONTEXTS: OnceLock<Mutex<HashMap<u32, NodeListHandle>>> = OnceLock::new();
static NEXT_CONTEXT_ID: AtomicU32 = AtomicU32::new(1);

fn contexts() -> &'static Mutex<HashMap<u32, NodeListHandle>> {
    CONTEXTS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn context_handle(context_id: u32) -> Option<NodeListHandle> {
    contexts().lock().ok()?.get(&context_id).cloned()
}

/// The domain session of one client context.
///
/// Creating a `DomainServer` spawns the context's node-list task and
/// registers the context so assignment-client handles can attach to it by
/// ID. Dropping it deregisters the context and winds the session down.
pub struct DomainServer {
    context_id: u32,
    handle: NodeListHandle,
}

impl DomainServer {
    /// A context backed by real WebRTC data channels. Must be called from
    /// within a tokio runtime.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_opener(config, Arc::new(WebRtcOpener::new()))
    }

    /// A context backed by a caller-supplied channel opener; this is how
    /// tests run sessions over in-memory channels.
    pub fn with_opener(config: ClientConfig, opener: Arc<dyn DataChannelOpener>) -> Self {
        let handle = NodeList::spawn(config, opener);
        let context_id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut map) = contexts().lock() {
            map.insert(context_id, handle.clone());
        }
        Self { context_id, handle }
    }

    /// The ID assignment-client handles attach with.
    pub fn context_id(&self) -> u32 {
        self.context_id
    }

    /// Starts a session toward `url` (empty string: the configured default
    /// signaling URL). Returns immediately; watch `state` for progress.
    pub async fn connect(&self, url: &str) {
        if self
            .handle
            .command_tx
            .send(Command::Connect(url.to_owned()))
            .await
            .is_err()
        {
            warn!("Domain session task is gone");
        }
    }

    /// Ends the session: best-effort disconnect packet, roster cleared,
    /// all channels closed.
    pub async fn disconnect(&self) {
        let _ = self.handle.command_tx.send(Command::Disconnect).await;
    }

    pub fn state(&self) -> DomainState {
        *self.handle.domain_state.borrow()
    }

    /// Current-state subscription; intermediate states may be coalesced.
    pub fn subscribe_state(&self) -> watch::Receiver<DomainState> {
        self.handle.domain_state.clone()
    }

    /// Every session event in order, including each state transition.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.handle.events.subscribe()
    }

    /// Invokes `callback` on every domain state change.
    pub fn on_state_changed(&self, callback: impl Fn(DomainState) + Send + 'static) {
        let mut state_rx = self.handle.domain_state.clone();
        tokio::spawn(async move {
            while state_rx.changed().await.is_ok() {
                let state = *state_rx.borrow();
                callback(state);
            }
        });
    }
}

impl Drop for DomainServer {
    fn drop(&mut self) {
        if let Ok(mut map) = contexts().lock() {
            map.remove(&self.context_id);
        }
    }
}

/// Shared behavior of the per-node-type handles.
struct AssignmentClient {
    node_type: NodeType,
    handle: Option<NodeListHandle>,
}

impl AssignmentClient {
    fn new(context_id: u32, node_type: NodeType) -> Self {
        let handle = context_handle(context_id);
        if handle.is_none() {
            warn!(context_id, "No such client context");
        }
        Self { node_type, handle }
    }

    fn state(&self) -> AssignmentClientState {
        self.handle
            .as_ref()
            .and_then(|handle| handle.node_states.get(&self.node_type))
            .map(|state_rx| *state_rx.borrow())
            .unwrap_or_default()
    }

    fn subscribe_state(&self) -> Option<watch::Receiver<AssignmentClientState>> {
        Some(
            self.handle
                .as_ref()?
                .node_states
                .get(&self.node_type)?
                .clone(),
        )
    }

    fn on_state_changed(&self, callback: impl Fn(AssignmentClientState) + Send + 'static) {
        let Some(mut state_rx) = self.subscribe_state() else {
            return;
        };
        tokio::spawn(async move {
            while state_rx.changed().await.is_ok() {
                let state = *state_rx.borrow();
                callback(state);
            }
        });
    }
}

macro_rules! assignment_client_handle {
    ($(#[$doc:meta])* $name:ident, $node_type:expr) => {
        $(#[$doc])*
        pub struct $name {
            inner: AssignmentClient,
        }

        impl $name {
            /// Attaches to the context created by a [`DomainServer`].
            pub fn new(context_id: u32) -> Self {
                Self {
                    inner: AssignmentClient::new(context_id, $node_type),
                }
            }

            pub fn state(&self) -> AssignmentClientState {
                self.inner.state()
            }

            /// Current-state subscription; `None` if the context is gone.
            pub fn subscribe_state(&self) -> Option<watch::Receiver<AssignmentClientState>> {
                self.inner.subscribe_state()
            }

            /// Invokes `callback` on every state change of this mixer.
            pub fn on_state_changed(
                &self,
                callback: impl Fn(AssignmentClientState) + Send + 'static,
            ) {
                self.inner.on_state_changed(callback)
            }
        }
    };
}

assignment_client_handle!(
    /// Handle to the avatar mixer assigned by the domain.
    AvatarMixer,
    NodeType::AvatarMixer
);
assignment_client_handle!(
    /// Handle to the audio mixer assigned by the domain.
    AudioMixer,
    NodeType::AudioMixer
);
assignment_client_handle!(
    /// Handle to the messages mixer assigned by the domain.
    MessagesMixer,
    NodeType::MessagesMixer
);
assignment_client_handle!(
    /// Handle to the entity server assigned by the domain. Besides state
    /// tracking it sends entity edits and surfaces entity data.
    EntityServer,
    NodeType::EntityServer
);

impl EntityServer {
    /// Sends an edit for `entity_id` carrying the supplied properties.
    /// Dropped with a warning when the entity server is not connected or
    /// the edit cannot fit a packet.
    pub async fn edit_entity(&self, entity_id: Uuid, properties: EntityProperties) {
        let Some(handle) = self.inner.handle.as_ref() else {
            return;
        };
        let _ = handle
            .command_tx
            .send(Command::EditEntity {
                entity_id,
                properties: Box::new(properties),
            })
            .await;
    }

    /// Invokes `callback` for every batch of entity records the server
    /// sends.
    pub fn on_entity_data(&self, callback: impl Fn(Vec<EntityEditMessage>) + Send + 'static) {
        let Some(handle) = self.inner.handle.as_ref() else {
            return;
        };
        let mut events_rx = handle.events.subscribe();
        tokio::spawn(async move {
            loop {
                match events_rx.recv().await {
                    Ok(SessionEvent::EntityData(records)) => callback(records),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Entity data listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}
