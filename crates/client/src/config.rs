//! Client configuration.

use std::time::Duration;

/// Tunables for a client context.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Signaling endpoint used when `connect` is called with an empty URL.
    pub signaling_url: String,

    /// Upper bound for one outgoing packet, derived from the data-channel
    /// MTU.
    pub max_packet_size: usize,

    /// Cadence of the domain check-in tick.
    pub check_in_period: Duration,

    /// How long a node may stay quiet before it is killed.
    pub silent_node_timeout: Duration,

    /// Minimum pause between tearing connections down and redialing the
    /// same host, so the previous peer connections can finish closing.
    pub reconnect_min_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://127.0.0.1:40102".into(),
            max_packet_size: 1492,
            check_in_period: Duration::from_millis(1000),
            silent_node_timeout: Duration::from_millis(2000),
            reconnect_min_delay: Duration::from_millis(500),
        }
    }
}
