//! # Veles Protocol
//!
//! Wire formats for the Veles virtual-world client:
//! - `Packet`: datagram framing with per-type versions and control bits
//! - `PropertyFlags`: the variable-length bit set naming an edit's fields
//! - Typed entity serializers with partial-fit semantics
//! - Entity edit encoding/decoding driven by a property bag
//! - Domain join/roster payloads and the WebRTC signaling JSON
//!
//! This crate is pure data: it performs no I/O and holds no connection
//! state. The transport and roster logic live in `veles-client`.
//!
//! ## Example
//!
//! ```
//! use veles_protocol::entity::{Color, EntityProperties, EntityType};
//! use veles_protocol::entity_edit::encode_entity_edit;
//! use veles_protocol::entity_data::AppendState;
//! use uuid::Uuid;
//!
//! let mut props = EntityProperties::new(EntityType::Box);
//! props.color = Some(Color::new(240, 37, 148));
//!
//! let mut buffer = [0u8; 1200];
//! let result = encode_entity_edit(&mut buffer, Uuid::new_v4(), 0, &props);
//! assert_eq!(result.append_state, AppendState::Completed);
//! ```

pub mod coded_int;
pub mod domain;
pub mod entity;
pub mod entity_data;
pub mod entity_edit;
pub mod error;
pub mod node_type;
pub mod packet;
pub mod packet_type;
pub mod properties;
pub mod property_flags;
pub mod signaling;

pub use entity::{Color, EntityProperties, EntityType, TypedProperties};
pub use entity_data::{AppendState, EntityDataReader, EntityDataWriter, PacketContext};
pub use entity_edit::{
    decode_entity_edit, decode_entity_stream, encode_entity_edit, encode_entity_stream,
    EntityEditMessage, EntityEditResult,
};
pub use error::{EntityDataError, PacketError};
pub use node_type::NodeType;
pub use packet::{Packet, PacketFlags, BASE_HEADER_SIZE, SEQUENCE_MASK};
pub use packet_type::PacketType;
pub use properties::EntityPropertyId;
pub use property_flags::PropertyFlags;
pub use signaling::{SessionDescription, SignalingMessage};
