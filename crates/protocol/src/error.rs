use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PacketError {
    #[error("Buffer too short: need {need} bytes, have {have}")]
    BufferTooShort { need: usize, have: usize },

    #[error("Unknown packet type: {0}")]
    UnknownPacketType(u8),

    #[error("Version mismatch for {packet_type}: expected {expected}, got {actual}")]
    VersionMismatch {
        packet_type: &'static str,
        expected: u8,
        actual: u8,
    },

    #[error("Malformed packet: {0}")]
    Malformed(String),
}

/// Result type for packet header and control-payload codecs
pub type PacketResult<T> = std::result::Result<T, PacketError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntityDataError {
    #[error("Truncated entity data: need {need} bytes at offset {offset}, have {have}")]
    Truncated {
        need: usize,
        offset: usize,
        have: usize,
    },

    #[error("Unknown entity type: {0}")]
    UnknownEntityType(u64),

    #[error("Property {0} is not decodable for this entity type")]
    UnknownProperty(u16),

    #[error("Invalid field value: {0}")]
    InvalidValue(String),
}

/// Result type for entity-stream decoding
pub type EntityDataResult<T> = std::result::Result<T, EntityDataError>;
