//! # Veles
//!
//! Client SDK core for a real-time virtual world. The client connects over
//! WebRTC data channels to a domain server and its assignment clients,
//! speaks a packetized datagram protocol atop those channels, and encodes
//! entity properties with a flag-driven variable-length layout.
//!
//! ## Components
//!
//! - `veles-protocol`: packet framing, property flags, entity
//!   serialization, signaling and domain payloads
//! - `veles-client`: signaling and data-channel transports, the socket,
//!   the node list and the public SDK surface
//!
//! ## Example
//!
//! See `crates/client/examples/` for a connecting client.

pub use veles_client as client;
pub use veles_protocol as protocol;
