//! Domain connection state.
//!
//! State transitions:
//! ```text
//! DISCONNECTED → CONNECTING → CONNECTED ⇄ CONNECTING (transport loss)
//!      ↑             ↓  ↓          ↓
//!      │          ERROR  REFUSED ←─┘ (denial)
//!      └────────────┴──────┴──── disconnect()
//! REFUSED → CONNECTED is allowed: the server may change policy and send a
//! DomainList spontaneously.
//! ```

use tracing::warn;
use uuid::Uuid;

/// Externally observable domain connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DomainState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Refused,
    Error,
}

impl DomainState {
    pub fn can_transition_to(&self, next: DomainState) -> bool {
        use DomainState::*;
        match (self, next) {
            (Disconnected, Connecting) => true,
            (Connecting, Connected | Refused | Error | Disconnected) => true,
            (Connected, Connecting | Refused | Disconnected) => true,
            (Refused, Connected | Disconnected) => true,
            (Error, Connecting | Disconnected) => true,
            (a, b) if *a == b => true,
            _ => false,
        }
    }
}

/// The domain server's slot: it is not part of the node roster.
#[derive(Debug, Default)]
pub struct DomainHandler {
    url: Option<String>,
    state: DomainState,
    connected: bool,
    domain_uuid: Uuid,
    local_id: u16,
    session_uuid: Uuid,
    refusal_reason: Option<String>,
}

impl DomainHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn state(&self) -> DomainState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn session_uuid(&self) -> Uuid {
        self.session_uuid
    }

    pub fn local_id(&self) -> u16 {
        self.local_id
    }

    pub fn refusal_reason(&self) -> Option<&str> {
        self.refusal_reason.as_deref()
    }

    /// Moves to a new state, logging and refusing invalid transitions.
    /// Returns true when the state actually changed.
    pub fn set_state(&mut self, next: DomainState) -> bool {
        if self.state == next {
            return false;
        }
        if !self.state.can_transition_to(next) {
            warn!(from = ?self.state, to = ?next, "Ignoring invalid domain state transition");
            return false;
        }
        self.state = next;
        true
    }

    /// Starts a session toward `url`.
    pub fn start_connecting(&mut self, url: String) {
        self.url = Some(url);
        self.refusal_reason = None;
        self.set_state(DomainState::Connecting);
    }

    /// Records the identifiers a DomainList assigned us.
    pub fn set_session(&mut self, domain_uuid: Uuid, session_uuid: Uuid, local_id: u16) {
        self.domain_uuid = domain_uuid;
        self.session_uuid = session_uuid;
        self.local_id = local_id;
        self.connected = true;
        self.refusal_reason = None;
    }

    pub fn set_refused(&mut self, reason: String) {
        self.refusal_reason = Some(reason);
        self.connected = false;
        self.set_state(DomainState::Refused);
    }

    /// Connection lost but the session is still wanted; the check-in loop
    /// will redial.
    pub fn set_interrupted(&mut self) {
        self.connected = false;
        self.session_uuid = Uuid::nil();
        self.local_id = 0;
        self.set_state(DomainState::Connecting);
    }

    /// Full reset back to DISCONNECTED.
    pub fn reset(&mut self) {
        self.url = None;
        self.connected = false;
        self.domain_uuid = Uuid::nil();
        self.session_uuid = Uuid::nil();
        self.local_id = 0;
        self.refusal_reason = None;
        self.set_state(DomainState::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_session_cycle() {
        let mut handler = DomainHandler::new();
        assert_eq!(handler.state(), DomainState::Disconnected);

        handler.start_connecting("ws://127.0.0.1:40102".into());
        assert_eq!(handler.state(), DomainState::Connecting);

        handler.set_session(Uuid::new_v4(), Uuid::new_v4(), 7);
        assert!(handler.set_state(DomainState::Connected));
        assert!(handler.is_connected());

        handler.reset();
        assert_eq!(handler.state(), DomainState::Disconnected);
        assert!(!handler.is_connected());
        assert_eq!(handler.session_uuid(), Uuid::nil());
    }

    #[test]
    fn refused_can_recover_on_spontaneous_list() {
        let mut handler = DomainHandler::new();
        handler.start_connecting("ws://127.0.0.1:40102".into());
        handler.set_refused("Domain is at capacity".into());
        assert_eq!(handler.state(), DomainState::Refused);
        assert_eq!(handler.refusal_reason(), Some("Domain is at capacity"));

        handler.set_session(Uuid::new_v4(), Uuid::new_v4(), 3);
        assert!(handler.set_state(DomainState::Connected));
    }

    #[test]
    fn invalid_transitions_are_ignored() {
        let mut handler = DomainHandler::new();
        assert!(!handler.set_state(DomainState::Connected));
        assert_eq!(handler.state(), DomainState::Disconnected);
    }
}
